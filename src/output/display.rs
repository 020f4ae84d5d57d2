//! Physical 4-digit displays, one per bound route.
//!
//! The capability is chosen once, at construction: [`SlotDisplays`] when the
//! hardware is there, [`NoDisplay`] when it is not. Callers never branch on
//! availability.

use async_trait::async_trait;
use chrono_tz::Tz;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::arrivals::ArrivalRecord;
use crate::config::MonitorConfig;
use crate::error::DisplayError;
use crate::select::DisplaySelection;

/// Shown on a slot whose route has no upcoming arrival.
pub const PLACEHOLDER: &str = "----";

/// A single 4-character segment display.
///
/// `show` is a blocking call; [`SlotDisplays`] runs it off the async runtime
/// under a timeout.
pub trait SegmentDisplay: Send + Sync {
    fn show(&self, glyphs: &str) -> Result<(), DisplayError>;
}

/// Display driven through a Linux line-display attribute (`.../message`).
#[derive(Debug, Clone)]
pub struct LineDisplay {
    path: PathBuf,
}

impl LineDisplay {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SegmentDisplay for LineDisplay {
    fn show(&self, glyphs: &str) -> Result<(), DisplayError> {
        // Never create: the attribute must already exist.
        let mut device = OpenOptions::new().write(true).open(&self.path)?;
        device.write_all(glyphs.as_bytes())?;
        Ok(())
    }
}

/// Local arrival time as `HHMM` (24-hour), or the placeholder.
pub fn glyphs_for(arrival: Option<&ArrivalRecord>, tz: Tz) -> String {
    match arrival {
        Some(a) => a.scheduled.with_timezone(&tz).format("%H%M").to_string(),
        None => PLACEHOLDER.to_string(),
    }
}

/// Physical output capability.
#[async_trait]
pub trait PhysicalOutput: Send {
    /// Writes every slot. Failures are logged, never returned.
    async fn render(&mut self, selection: &DisplaySelection, tz: Tz);

    fn is_active(&self) -> bool;
}

/// Used when no display hardware is present or displays are switched off.
#[derive(Debug, Default)]
pub struct NoDisplay;

#[async_trait]
impl PhysicalOutput for NoDisplay {
    async fn render(&mut self, _selection: &DisplaySelection, _tz: Tz) {}

    fn is_active(&self) -> bool {
        false
    }
}

struct Slot {
    route_id: String,
    number: usize,
    device: Arc<dyn SegmentDisplay>,
    failing: bool,
    /// A write that outlived its timeout and is still running.
    pending: Option<JoinHandle<Result<(), DisplayError>>>,
}

impl Slot {
    /// Runs `show` on the blocking pool, bounded by `limit`.
    ///
    /// At most one write per device is in flight. While a timed-out write is
    /// still running, new writes are refused instead of queued.
    async fn write(&mut self, glyphs: String, limit: Duration) -> Result<(), DisplayError> {
        if self.pending.as_ref().is_some_and(|task| !task.is_finished()) {
            return Err(DisplayError::Busy);
        }
        self.pending = None;

        let device = Arc::clone(&self.device);
        let mut task = tokio::task::spawn_blocking(move || device.show(&glyphs));
        match tokio::time::timeout(limit, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(DisplayError::Join(join.to_string())),
            Err(_) => {
                self.pending = Some(task);
                Err(DisplayError::Timeout(limit))
            }
        }
    }
}

/// Hardware-backed displays, one per route binding.
///
/// A failed write is logged when a slot starts failing and again when it
/// recovers; the slot is retried on every tick in between.
pub struct SlotDisplays {
    slots: Vec<Slot>,
    write_timeout: Duration,
}

impl SlotDisplays {
    /// `slots` pairs each bound route with its slot number and display.
    pub fn new(
        slots: impl IntoIterator<Item = BoundDevice>,
        write_timeout: Duration,
    ) -> Self {
        let slots = slots
            .into_iter()
            .map(|(route_id, number, device)| Slot {
                route_id,
                number,
                device,
                failing: false,
                pending: None,
            })
            .collect();
        Self {
            slots,
            write_timeout,
        }
    }
}

#[async_trait]
impl PhysicalOutput for SlotDisplays {
    async fn render(&mut self, selection: &DisplaySelection, tz: Tz) {
        let limit = self.write_timeout;
        for slot in &mut self.slots {
            let glyphs = glyphs_for(selection.for_route(&slot.route_id), tz);
            match slot.write(glyphs, limit).await {
                Ok(()) if slot.failing => {
                    slot.failing = false;
                    info!(slot = slot.number, route_id = %slot.route_id, "Display recovered");
                }
                Ok(()) => {}
                Err(e) if !slot.failing => {
                    slot.failing = true;
                    warn!(slot = slot.number, route_id = %slot.route_id, error = %e, "Display write failed");
                }
                Err(_) => {}
            }
        }
    }

    fn is_active(&self) -> bool {
        true
    }
}

/// Route, slot number and device of one binding.
pub type BoundDevice = (String, usize, Arc<dyn SegmentDisplay>);

/// Devices for every binding, or `None` when any bound slot has no device.
fn bound_devices(config: &MonitorConfig) -> Option<Vec<BoundDevice>> {
    let mut slots: Vec<BoundDevice> = Vec::new();
    for binding in &config.bindings {
        let Some(path) = config.display.devices.get(binding.slot) else {
            warn!(slot = binding.slot, route_id = %binding.route_id, "No device for display slot, displays disabled");
            return None;
        };
        if !path.exists() {
            warn!(slot = binding.slot, path = %path.display(), "Display device not found, displays disabled");
            return None;
        }
        let device: Arc<dyn SegmentDisplay> = Arc::new(LineDisplay::new(path));
        slots.push((binding.route_id.clone(), binding.slot, device));
    }
    Some(slots)
}

/// Chooses the display capability for `config`.
///
/// Hardware is used only when displays are enabled, at least one route is
/// bound, and every bound slot's device path exists.
pub fn probe(config: &MonitorConfig) -> Box<dyn PhysicalOutput> {
    if !config.display.enabled || config.bindings.is_empty() {
        info!("Physical displays disabled");
        return Box::new(NoDisplay);
    }

    match bound_devices(config) {
        Some(slots) => {
            info!(slots = slots.len(), "Physical displays active");
            Box::new(SlotDisplays::new(slots, config.display.write_timeout))
        }
        None => Box::new(NoDisplay),
    }
}
