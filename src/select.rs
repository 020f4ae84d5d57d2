//! Ranking of cached arrivals against a reference instant.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::arrivals::ArrivalRecord;

/// Returns up to `k` records strictly after `now`, soonest first.
///
/// Ties on the instant are broken by route id, then trip id. The input slice
/// is not required to be sorted and is never modified.
pub fn select(records: &[ArrivalRecord], now: DateTime<Utc>, k: usize) -> Vec<ArrivalRecord> {
    let mut upcoming: Vec<ArrivalRecord> = records
        .iter()
        .filter(|r| r.is_upcoming(now))
        .cloned()
        .collect();
    upcoming.sort();
    upcoming.truncate(k);
    upcoming
}

/// Soonest record for `route_id` strictly after `now`, regardless of how the
/// route ranks overall.
pub fn select_for_route(
    records: &[ArrivalRecord],
    now: DateTime<Utc>,
    route_id: &str,
) -> Option<ArrivalRecord> {
    records
        .iter()
        .filter(|r| r.route_id == route_id && r.is_upcoming(now))
        .min()
        .cloned()
}

/// What gets shown on one tick. Recomputed every tick, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplaySelection {
    pub overall: Vec<ArrivalRecord>,
    pub per_route: BTreeMap<String, Option<ArrivalRecord>>,
}

impl DisplaySelection {
    pub fn compute<'a>(
        records: &[ArrivalRecord],
        now: DateTime<Utc>,
        k: usize,
        routes: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let per_route = routes
            .into_iter()
            .map(|route| (route.to_string(), select_for_route(records, now, route)))
            .collect();

        DisplaySelection {
            overall: select(records, now, k),
            per_route,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.overall.is_empty()
    }

    pub fn for_route(&self, route_id: &str) -> Option<&ArrivalRecord> {
        self.per_route.get(route_id).and_then(Option::as_ref)
    }
}
