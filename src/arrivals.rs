//! Core data model: stop identifiers, arrival records and the cached arrival set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a physical stop, held in its canonical textual form.
///
/// Feeds and configuration files disagree on whether stop ids are numbers or
/// strings; both collapse to the same trimmed text so `2783` and `"2783"`
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "StopIdRepr", into = "String")]
pub struct StopId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum StopIdRepr {
    Number(u64),
    Text(String),
}

impl From<StopIdRepr> for StopId {
    fn from(repr: StopIdRepr) -> Self {
        match repr {
            StopIdRepr::Number(n) => StopId::from(n),
            StopIdRepr::Text(s) => StopId::from(s.as_str()),
        }
    }
}

impl StopId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StopId {
    fn from(raw: &str) -> Self {
        StopId(raw.trim().to_string())
    }
}

impl From<String> for StopId {
    fn from(raw: String) -> Self {
        StopId::from(raw.as_str())
    }
}

impl From<u64> for StopId {
    fn from(raw: u64) -> Self {
        StopId(raw.to_string())
    }
}

impl From<StopId> for String {
    fn from(id: StopId) -> Self {
        id.0
    }
}

impl std::str::FromStr for StopId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(StopId::from(s))
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One resolved arrival of a trip at the monitored stop.
///
/// Field order matters: the derived ordering sorts by instant, then route,
/// then trip.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArrivalRecord {
    pub scheduled: DateTime<Utc>,
    pub route_id: String,
    pub trip_id: String,
}

impl ArrivalRecord {
    pub fn new(
        scheduled: DateTime<Utc>,
        route_id: impl Into<String>,
        trip_id: impl Into<String>,
    ) -> Self {
        Self {
            scheduled,
            route_id: route_id.into(),
            trip_id: trip_id.into(),
        }
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.scheduled > now
    }
}

/// Arrivals from the last successful fetch, sorted ascending.
///
/// Replaced wholesale on every successful fetch; never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArrivalSet {
    records: Vec<ArrivalRecord>,
}

impl ArrivalSet {
    pub fn new(mut records: Vec<ArrivalRecord>) -> Self {
        records.sort();
        Self { records }
    }

    pub fn records(&self) -> &[ArrivalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records still ahead of `now`.
    pub fn upcoming_count(&self, now: DateTime<Utc>) -> usize {
        self.records.iter().filter(|r| r.is_upcoming(now)).count()
    }

    /// True when the set is empty or every record is at or before `now`.
    pub fn all_expired(&self, now: DateTime<Utc>) -> bool {
        // Sorted, so the last record is the latest one.
        self.records.last().is_none_or(|r| !r.is_upcoming(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_stop_id_numeric_and_text_compare_equal() {
        assert_eq!(StopId::from(2783u64), StopId::from("2783"));
        assert_eq!(StopId::from(" 2783 "), StopId::from("2783"));
        assert_ne!(StopId::from("2783"), StopId::from("2784"));
    }

    #[test]
    fn test_stop_id_deserializes_from_number_or_string() {
        let a: StopId = serde_json::from_str("2783").unwrap();
        let b: StopId = serde_json::from_str("\"2783\"").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "2783");
    }

    #[test]
    fn test_arrival_set_sorted_on_construction() {
        let set = ArrivalSet::new(vec![
            ArrivalRecord::new(at(300), "7", "t2"),
            ArrivalRecord::new(at(120), "12", "t1"),
            ArrivalRecord::new(at(120), "7", "t0"),
        ]);

        let routes: Vec<_> = set.records().iter().map(|r| r.route_id.as_str()).collect();
        assert_eq!(routes, vec!["12", "7", "7"]);
        assert_eq!(set.records()[2].scheduled, at(300));
    }

    #[test]
    fn test_all_expired() {
        let set = ArrivalSet::new(vec![
            ArrivalRecord::new(at(60), "7", "a"),
            ArrivalRecord::new(at(120), "7", "b"),
        ]);

        assert!(!set.all_expired(at(0)));
        assert_eq!(set.upcoming_count(at(90)), 1);
        assert!(set.all_expired(at(120)));
        assert!(ArrivalSet::default().all_expired(at(0)));
    }

    #[test]
    fn test_is_upcoming_is_strict() {
        let r = ArrivalRecord::new(at(0), "7", "a");
        assert!(!r.is_upcoming(at(0)));
        assert!(r.is_upcoming(at(0) - TimeDelta::seconds(1)));
    }
}
