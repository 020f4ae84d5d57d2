//! Narrows decoded trip updates down to arrivals at the monitored stop.

use chrono::{DateTime, Utc};

use crate::arrivals::{ArrivalRecord, StopId};
use crate::parser::{RawStopTime, RawTripUpdate};

/// Collects one [`ArrivalRecord`] per stop-time entry at `stop_id`.
///
/// The instant is the explicit arrival time if present, else the departure
/// time; entries with neither are dropped. Cancelled trips and skipped stops
/// produce nothing. Output is in feed order, not sorted.
pub fn extract(updates: &[RawTripUpdate], stop_id: &StopId) -> Vec<ArrivalRecord> {
    updates
        .iter()
        .filter(|u| !u.canceled)
        .flat_map(|u| {
            u.stop_times
                .iter()
                .filter(move |st| st.stop_id.as_ref() == Some(stop_id) && !st.skipped)
                .filter_map(move |st| {
                    let scheduled = resolve_instant(st)?;
                    Some(ArrivalRecord::new(scheduled, &u.route_id, &u.trip_id))
                })
        })
        .collect()
}

fn resolve_instant(stop_time: &RawStopTime) -> Option<DateTime<Utc>> {
    let secs = stop_time.arrival.or(stop_time.departure)?;
    DateTime::from_timestamp(secs, 0)
}
