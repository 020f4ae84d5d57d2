//! Real-time arrival monitor for a single transit stop.
//!
//! Fetches a GTFS-Realtime trip-update feed on a slow cadence, keeps the
//! arrivals for the configured stop, and renders a per-second countdown to
//! the console and to optional 4-digit displays.

pub mod arrivals;
pub mod clock;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod mock;
pub mod monitor;
pub mod output;
pub mod parser;
pub mod scheduler;
pub mod select;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
