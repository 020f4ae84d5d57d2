//! Protobuf decoder for GTFS Realtime trip-update feeds.
//!
//! [`decode_feed`] is the boundary between wire bytes and the monitor: it
//! yields plain [`RawTripUpdate`] records and knows nothing about which stop
//! is being watched.

use prost::Message;
use tracing::debug;

use crate::arrivals::StopId;
use crate::error::MonitorError;
use crate::gtfs_rt::trip_descriptor::ScheduleRelationship as TripRelationship;
use crate::gtfs_rt::trip_update::stop_time_update::ScheduleRelationship as StopRelationship;
use crate::gtfs_rt::trip_update::{StopTimeEvent, StopTimeUpdate};
use crate::gtfs_rt::{FeedMessage, TripUpdate};

/// One vehicle's trip update, reduced to the fields the monitor reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTripUpdate {
    pub route_id: String,
    pub trip_id: String,
    /// Trip was cancelled by the agency; none of its stop times will be served.
    pub canceled: bool,
    pub stop_times: Vec<RawStopTime>,
}

/// A per-stop timing entry. `arrival`/`departure` are unix seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawStopTime {
    pub stop_id: Option<StopId>,
    pub arrival: Option<i64>,
    pub departure: Option<i64>,
    /// Vehicle will pass this stop without serving it.
    pub skipped: bool,
}

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// # Errors
///
/// Returns [`MonitorError::Decode`] if the bytes are not valid protobuf for a
/// `FeedMessage`. Nothing is returned on failure.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage, MonitorError> {
    Ok(FeedMessage::decode(bytes)?)
}

/// Decodes raw feed bytes into trip-update records.
pub fn decode_feed(bytes: &[u8]) -> Result<Vec<RawTripUpdate>, MonitorError> {
    let feed = parse_feed(bytes)?;

    debug!(
        bytes = bytes.len(),
        entities = feed.entity.len(),
        header_timestamp = feed.header.timestamp,
        "Feed decoded"
    );

    Ok(feed
        .entity
        .into_iter()
        .filter(|e| !e.is_deleted())
        .filter_map(|e| e.trip_update)
        .map(RawTripUpdate::from)
        .collect())
}

impl From<TripUpdate> for RawTripUpdate {
    fn from(update: TripUpdate) -> Self {
        let canceled = matches!(
            update.trip.schedule_relationship(),
            TripRelationship::Canceled | TripRelationship::Deleted
        );
        RawTripUpdate {
            route_id: update.trip.route_id().to_string(),
            trip_id: update.trip.trip_id().to_string(),
            canceled,
            stop_times: update
                .stop_time_update
                .into_iter()
                .map(RawStopTime::from)
                .collect(),
        }
    }
}

impl From<StopTimeUpdate> for RawStopTime {
    fn from(stu: StopTimeUpdate) -> Self {
        RawStopTime {
            skipped: stu.schedule_relationship() == StopRelationship::Skipped,
            stop_id: stu.stop_id.map(StopId::from),
            arrival: event_time(stu.arrival.as_ref()),
            departure: event_time(stu.departure.as_ref()),
        }
    }
}

// An event carrying only a delay has no absolute instant.
fn event_time(event: Option<&StopTimeEvent>) -> Option<i64> {
    event.and_then(|e| e.time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::{FeedEntity, FeedHeader, TripDescriptor};

    fn create_header() -> FeedHeader {
        FeedHeader {
            gtfs_realtime_version: "2.0".to_string(),
            timestamp: Some(1234567890),
            incrementality: None,
            feed_version: None,
        }
    }

    fn trip_entity(id: &str, route: &str, stop_times: Vec<StopTimeUpdate>) -> FeedEntity {
        FeedEntity {
            id: id.to_string(),
            trip_update: Some(TripUpdate {
                trip: TripDescriptor {
                    trip_id: Some(format!("trip-{id}")),
                    route_id: Some(route.to_string()),
                    ..Default::default()
                },
                stop_time_update: stop_times,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_empty_bytes_returns_default_feed() {
        // Empty input is a valid, empty FeedMessage
        let feed = parse_feed(&[]).unwrap();
        assert_eq!(feed.header.gtfs_realtime_version, "");
        assert!(feed.entity.is_empty());
        assert!(decode_feed(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_parse_invalid_bytes() {
        let invalid_bytes = vec![0xFF, 0xFE, 0x00, 0x01];
        let result = decode_feed(&invalid_bytes);
        assert!(matches!(result, Err(MonitorError::Decode(_))));
    }

    #[test]
    fn test_decode_trip_updates() {
        let feed = FeedMessage {
            header: create_header(),
            entity: vec![trip_entity(
                "1",
                "7",
                vec![StopTimeUpdate {
                    stop_id: Some("2783".to_string()),
                    arrival: Some(StopTimeEvent {
                        time: Some(1_700_000_100),
                        ..Default::default()
                    }),
                    departure: Some(StopTimeEvent {
                        delay: Some(30),
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
            )],
        };

        let updates = decode_feed(&feed.encode_to_vec()).unwrap();

        assert_eq!(updates.len(), 1);
        let update = &updates[0];
        assert_eq!(update.route_id, "7");
        assert_eq!(update.trip_id, "trip-1");
        assert!(!update.canceled);
        assert_eq!(update.stop_times[0].stop_id, Some(StopId::from("2783")));
        assert_eq!(update.stop_times[0].arrival, Some(1_700_000_100));
        // delay-only event carries no instant
        assert_eq!(update.stop_times[0].departure, None);
    }

    #[test]
    fn test_decode_skips_deleted_and_non_trip_entities() {
        let mut deleted = trip_entity("1", "7", vec![]);
        deleted.is_deleted = Some(true);
        let bare = FeedEntity {
            id: "2".to_string(),
            ..Default::default()
        };

        let feed = FeedMessage {
            header: create_header(),
            entity: vec![deleted, bare, trip_entity("3", "12", vec![])],
        };

        let updates = decode_feed(&feed.encode_to_vec()).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].route_id, "12");
    }

    #[test]
    fn test_decode_flags_cancellations_and_skips() {
        let mut entity = trip_entity(
            "1",
            "7",
            vec![StopTimeUpdate {
                stop_id: Some("2783".to_string()),
                schedule_relationship: Some(StopRelationship::Skipped as i32),
                ..Default::default()
            }],
        );
        if let Some(tu) = entity.trip_update.as_mut() {
            tu.trip.schedule_relationship = Some(TripRelationship::Canceled as i32);
        }

        let feed = FeedMessage {
            header: create_header(),
            entity: vec![entity],
        };

        let updates = decode_feed(&feed.encode_to_vec()).unwrap();
        assert!(updates[0].canceled);
        assert!(updates[0].stop_times[0].skipped);
    }

    #[test]
    fn test_decode_treats_deleted_trips_as_cancelled() {
        let mut entity = trip_entity("1", "7", vec![]);
        if let Some(tu) = entity.trip_update.as_mut() {
            tu.trip.schedule_relationship = Some(TripRelationship::Deleted as i32);
        }
        let feed = FeedMessage {
            header: create_header(),
            entity: vec![entity, trip_entity("2", "12", vec![])],
        };

        let updates = decode_feed(&feed.encode_to_vec()).unwrap();
        assert!(updates[0].canceled);
        assert!(!updates[1].canceled);
    }
}
