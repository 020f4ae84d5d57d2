//! Monitor configuration.
//!
//! [`MonitorConfig`] is built once at startup and passed by reference to
//! everything that needs it. Values come from, in increasing precedence:
//! built-in defaults, an optional JSON file ([`ConfigFile`]), then CLI/env.
//!
//! ```json
//! {
//!   "stop_id": 2783,
//!   "refresh_interval_secs": 180,
//!   "timezone": "America/Toronto",
//!   "bindings": [{ "route_id": "7", "slot": 0 }, { "route_id": "12", "slot": 1 }],
//!   "display_devices": ["/sys/bus/spi/devices/spi0.0/message"]
//! }
//! ```

use anyhow::{Context, Result, bail};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::arrivals::StopId;

pub const DEFAULT_FEED_URL: &str =
    "https://webapps.regionofwaterloo.ca/api/grt-routes/api/tripupdates";
pub const DEFAULT_STOP_ID: &str = "2783";
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Toronto;
/// Upper bound for every configured interval.
pub const MAX_INTERVAL: Duration = Duration::from_secs(86_400);

/// Binds a monitored route to a numbered physical display slot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DisplayBinding {
    pub route_id: String,
    pub slot: usize,
}

impl FromStr for DisplayBinding {
    type Err = String;

    /// Parses `ROUTE:SLOT`, e.g. `7:0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (route, slot) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("expected ROUTE:SLOT, got `{s}`"))?;
        let route = route.trim();
        if route.is_empty() {
            return Err(format!("empty route in binding `{s}`"));
        }
        let slot = slot
            .trim()
            .parse()
            .map_err(|_| format!("invalid slot number in binding `{s}`"))?;
        Ok(DisplayBinding {
            route_id: route.to_string(),
            slot,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DisplayConfig {
    /// Off switch; when false the no-op display is used regardless of devices.
    pub enabled: bool,
    /// Device attribute paths, indexed by slot number.
    pub devices: Vec<PathBuf>,
    pub write_timeout: Duration,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            devices: Vec::new(),
            write_timeout: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub stop_id: StopId,
    /// HTTP(S) URL, or a local path to a `.pb` file.
    pub feed_url: String,
    pub refresh_interval: Duration,
    /// Delay before re-fetching after an empty or failed fetch.
    pub retry_interval: Duration,
    pub tick_interval: Duration,
    pub request_timeout: Duration,
    pub timezone: Tz,
    /// Number of arrivals shown on the console line.
    pub top_k: usize,
    pub bindings: Vec<DisplayBinding>,
    pub display: DisplayConfig,
    /// Skip certificate verification for legacy feed endpoints.
    pub insecure_tls: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            stop_id: StopId::from(DEFAULT_STOP_ID),
            feed_url: DEFAULT_FEED_URL.to_string(),
            refresh_interval: Duration::from_secs(180),
            retry_interval: Duration::from_secs(30),
            tick_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
            timezone: DEFAULT_TIMEZONE,
            top_k: 2,
            bindings: Vec::new(),
            display: DisplayConfig::default(),
            insecure_tls: false,
        }
    }
}

impl MonitorConfig {
    pub fn with_stop(mut self, stop_id: impl Into<StopId>) -> Self {
        self.stop_id = stop_id.into();
        self
    }

    pub fn with_feed_url(mut self, url: impl Into<String>) -> Self {
        self.feed_url = url.into();
        self
    }

    pub fn with_binding(mut self, route_id: impl Into<String>, slot: usize) -> Self {
        self.bindings.push(DisplayBinding {
            route_id: route_id.into(),
            slot,
        });
        self
    }

    pub fn with_display_device(mut self, path: impl Into<PathBuf>) -> Self {
        self.display.devices.push(path.into());
        self
    }

    /// Route ids with a display slot, in binding order.
    pub fn monitored_routes(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.route_id.as_str())
    }

    /// Applies every field set in `file` on top of `self`.
    pub fn merge_file(mut self, file: ConfigFile) -> Result<Self> {
        if let Some(stop_id) = file.stop_id {
            self.stop_id = stop_id;
        }
        if let Some(url) = file.feed_url {
            self.feed_url = url;
        }
        if let Some(secs) = file.refresh_interval_secs {
            self.refresh_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = file.retry_interval_secs {
            self.retry_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = file.tick_interval_ms {
            self.tick_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(tz) = file.timezone {
            self.timezone = parse_timezone(&tz)?;
        }
        if let Some(k) = file.top_k {
            self.top_k = k;
        }
        if let Some(bindings) = file.bindings {
            self.bindings = bindings;
        }
        if let Some(devices) = file.display_devices {
            self.display.devices = devices;
        }
        if let Some(enabled) = file.display_enabled {
            self.display.enabled = enabled;
        }
        if let Some(ms) = file.display_write_timeout_ms {
            self.display.write_timeout = Duration::from_millis(ms);
        }
        if let Some(insecure) = file.insecure_tls {
            self.insecure_tls = insecure;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stop_id.as_str().is_empty() {
            bail!("stop id must not be empty");
        }
        for (name, value) in [
            ("refresh interval", self.refresh_interval),
            ("retry interval", self.retry_interval),
            ("tick interval", self.tick_interval),
            ("request timeout", self.request_timeout),
        ] {
            if value.is_zero() {
                bail!("{name} must be greater than zero");
            }
            if value > MAX_INTERVAL {
                bail!("{name} ({value:?}) must not exceed {MAX_INTERVAL:?}");
            }
        }
        if self.retry_interval > self.refresh_interval {
            bail!(
                "retry interval ({:?}) must not exceed refresh interval ({:?})",
                self.retry_interval,
                self.refresh_interval
            );
        }
        if self.top_k == 0 {
            bail!("top-k must be at least 1");
        }
        let mut taken = HashSet::new();
        for binding in &self.bindings {
            if !taken.insert(binding.slot) {
                bail!(
                    "display slot {} is bound more than once (route {})",
                    binding.slot,
                    binding.route_id
                );
            }
        }
        if self.display.enabled {
            for binding in &self.bindings {
                if binding.slot >= self.display.devices.len() {
                    bail!(
                        "route {} is bound to slot {} but only {} display device(s) are configured",
                        binding.route_id,
                        binding.slot,
                        self.display.devices.len()
                    );
                }
            }
        }
        Ok(())
    }
}

/// On-disk configuration. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub stop_id: Option<StopId>,
    pub feed_url: Option<String>,
    pub refresh_interval_secs: Option<u64>,
    pub retry_interval_secs: Option<u64>,
    pub tick_interval_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub timezone: Option<String>,
    pub top_k: Option<usize>,
    pub bindings: Option<Vec<DisplayBinding>>,
    pub display_devices: Option<Vec<PathBuf>>,
    pub display_enabled: Option<bool>,
    pub display_write_timeout_ms: Option<u64>,
    pub insecure_tls: Option<bool>,
}

impl ConfigFile {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path}"))?;
        serde_json::from_str(&content).with_context(|| format!("parsing config file {path}"))
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("unknown timezone `{name}`: {e}"))
}
