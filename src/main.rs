//! CLI entry point for the bus arrival monitor.
//!
//! `watch` runs the continuous countdown (console plus optional displays);
//! `once` fetches the feed a single time and prints the next arrivals.

use anyhow::{Context, Result};
use bus_arrivals::{
    clock::SystemClock,
    config::{ConfigFile, DisplayBinding, MonitorConfig, parse_timezone},
    extract::extract,
    fetch::feed_source,
    monitor::Monitor,
    output::{NO_ARRIVALS, Presenter},
    parser::decode_feed,
    select::select,
};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bus_arrivals")]
#[command(about = "Countdown to the next buses at a GTFS-Realtime stop", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Continuously show the next arrivals until interrupted
    Watch {
        #[command(flatten)]
        args: MonitorArgs,
    },
    /// Fetch once, print the next arrivals and exit
    Once {
        #[command(flatten)]
        args: MonitorArgs,
    },
}

#[derive(Args)]
struct MonitorArgs {
    /// JSON config file; flags override its values
    #[arg(short, long, env = "BUS_CONFIG")]
    config: Option<String>,

    /// Stop to monitor
    #[arg(short, long, env = "BUS_STOP_ID")]
    stop: Option<String>,

    /// Trip-update feed URL, or a path to a local .pb file
    #[arg(short, long, env = "BUS_FEED_URL")]
    feed_url: Option<String>,

    /// Seconds between regular feed refreshes
    #[arg(long, env = "BUS_REFRESH_SECS")]
    refresh_secs: Option<u64>,

    /// Seconds before retrying after an empty or failed fetch
    #[arg(long, env = "BUS_RETRY_SECS")]
    retry_secs: Option<u64>,

    /// Milliseconds between console/display updates
    #[arg(long, env = "BUS_TICK_MS")]
    tick_ms: Option<u64>,

    /// Feed request timeout in seconds
    #[arg(long, env = "BUS_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// IANA timezone used for displayed times (e.g. "America/Toronto")
    #[arg(long, env = "BUS_TIMEZONE")]
    timezone: Option<String>,

    /// Number of arrivals listed on the console
    #[arg(short = 'k', long, env = "BUS_TOP_K")]
    top_k: Option<usize>,

    /// Bind a route to a display slot, as ROUTE:SLOT (repeatable)
    #[arg(short, long = "bind", value_name = "ROUTE:SLOT")]
    bindings: Vec<DisplayBinding>,

    /// Display device attribute path; the Nth flag is slot N (repeatable)
    #[arg(long = "display-device", value_name = "PATH")]
    display_devices: Vec<PathBuf>,

    /// Never drive the physical displays
    #[arg(long, default_value_t = false)]
    no_display: bool,

    /// Skip TLS certificate verification for the feed endpoint
    #[arg(long, env = "BUS_INSECURE_TLS", default_value_t = false)]
    insecure_tls: bool,
}

impl MonitorArgs {
    /// Defaults, then the config file, then flags/env.
    fn into_config(self) -> Result<MonitorConfig> {
        let mut config = MonitorConfig::default();
        if let Some(path) = &self.config {
            config = config.merge_file(ConfigFile::load(path)?)?;
        }

        if let Some(stop) = self.stop {
            config.stop_id = stop.into();
        }
        if let Some(url) = self.feed_url {
            config.feed_url = url;
        }
        if let Some(secs) = self.refresh_secs {
            config.refresh_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.retry_secs {
            config.retry_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = self.tick_ms {
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(tz) = self.timezone {
            config.timezone = parse_timezone(&tz)?;
        }
        if let Some(k) = self.top_k {
            config.top_k = k;
        }
        if !self.bindings.is_empty() {
            config.bindings = self.bindings;
        }
        if !self.display_devices.is_empty() {
            config.display.devices = self.display_devices;
        }
        if self.no_display {
            config.display.enabled = false;
        }
        if self.insecure_tls {
            config.insecure_tls = true;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bus_arrivals.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bus_arrivals.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { args } => watch(args.into_config()?).await?,
        Commands::Once { args } => once(&args.into_config()?).await?,
    }

    Ok(())
}

/// Runs the monitor until Ctrl+C.
async fn watch(config: MonitorConfig) -> Result<()> {
    let source = feed_source(&config)?;
    let presenter = Presenter::from_config(&config);
    let monitor = Monitor::new(config, source, presenter, SystemClock);

    monitor
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Could not listen for Ctrl+C, running until killed");
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Bus arrival monitor stopped");
    Ok(())
}

/// Single fetch, printed as a numbered list.
#[tracing::instrument(skip(config), fields(stop_id = %config.stop_id))]
async fn once(config: &MonitorConfig) -> Result<()> {
    let source = feed_source(config)?;
    info!(source = source.describe(), "Fetching arrivals");

    let bytes = source.fetch().await?;
    let updates = decode_feed(&bytes)?;
    let records = extract(&updates, &config.stop_id);
    let arrivals = select(&records, Utc::now(), config.top_k);

    if arrivals.is_empty() {
        println!("{} at stop {}.", NO_ARRIVALS, config.stop_id);
        return Ok(());
    }

    println!(
        "\nNext {} arrivals for stop {}:",
        arrivals.len(),
        config.stop_id
    );
    println!("{}", "-".repeat(60));
    for (i, arrival) in arrivals.iter().enumerate() {
        let local = arrival.scheduled.with_timezone(&config.timezone);
        println!(
            "{}. Route {}: {}",
            i + 1,
            arrival.route_id,
            local.format("%I:%M %p")
        );
    }
    println!("{}", "-".repeat(60));

    Ok(())
}
