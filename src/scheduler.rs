//! Refresh state machine.
//!
//! Decides, on each UI tick, whether the cached [`ArrivalSet`] is good enough
//! to render or whether the feed must be fetched again. Three phases:
//!
//! | Phase | Meaning | Tick behaviour |
//! |-------|---------|----------------|
//! | [`Phase::Cold`] | nothing fetched yet | fetch now |
//! | [`Phase::Warm`] | cache has upcoming arrivals | render; fetch on the regular cadence |
//! | [`Phase::Stale`] | last fetch gave nothing usable, or cache expired | fetch now, then at most once per retry interval |
//!
//! The scheduler never reads a clock. Callers pass the monotonic and wall
//! instants in, which keeps every transition testable without sleeping.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

use crate::arrivals::{ArrivalRecord, ArrivalSet};
use crate::error::MonitorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Cold,
    Warm,
    Stale,
}

/// Why a fetch is being made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReason {
    Initial,
    Regular,
    /// Every cached arrival has passed.
    Expired,
    /// Retrying after an empty or failed fetch.
    Retry,
}

impl FetchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchReason::Initial => "initial",
            FetchReason::Regular => "regular",
            FetchReason::Expired => "expired",
            FetchReason::Retry => "retry",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Fetch(FetchReason),
    Render,
}

/// Result of feeding a fetch attempt back into the scheduler.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Cache replaced.
    Refreshed { total: usize, upcoming: usize },
    /// Feed was fine but had no upcoming arrivals at the stop.
    Empty,
    Failed(MonitorError),
}

#[derive(Debug)]
pub struct SchedulerState {
    refresh_interval: Duration,
    retry_interval: Duration,
    phase: Phase,
    arrivals: ArrivalSet,
    last_refresh: Option<Instant>,
    /// Earliest instant a fetch may be made while stale. `None` means now.
    retry_at: Option<Instant>,
}

impl SchedulerState {
    pub fn new(refresh_interval: Duration, retry_interval: Duration) -> Self {
        Self {
            refresh_interval,
            retry_interval,
            phase: Phase::Cold,
            arrivals: ArrivalSet::default(),
            last_refresh: None,
            retry_at: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn arrivals(&self) -> &ArrivalSet {
        &self.arrivals
    }

    /// Monotonic instant at which the next fetch becomes due.
    pub fn next_fetch_at(&self) -> Option<Instant> {
        match self.phase {
            Phase::Cold => None,
            Phase::Warm => self.last_refresh.map(|t| deadline(t, self.refresh_interval)),
            Phase::Stale => self.retry_at,
        }
    }

    /// Decides what this tick should do.
    ///
    /// A warm cache whose arrivals have all passed drops to stale here and
    /// asks for an immediate fetch, ahead of the regular cadence.
    pub fn poll(&mut self, mono: Instant, now: DateTime<Utc>) -> TickAction {
        match self.phase {
            Phase::Cold => TickAction::Fetch(FetchReason::Initial),
            Phase::Warm => {
                if self.arrivals.all_expired(now) {
                    self.phase = Phase::Stale;
                    self.retry_at = None;
                    return TickAction::Fetch(FetchReason::Expired);
                }
                match self.last_refresh {
                    Some(last) if mono < deadline(last, self.refresh_interval) => {
                        TickAction::Render
                    }
                    _ => TickAction::Fetch(FetchReason::Regular),
                }
            }
            Phase::Stale => match self.retry_at {
                Some(at) if mono < at => TickAction::Render,
                _ => TickAction::Fetch(FetchReason::Retry),
            },
        }
    }

    /// Applies the result of a fetch made at `mono`.
    ///
    /// On an empty or failed fetch the cached set is kept so any remaining
    /// upcoming arrivals stay on screen.
    pub fn record_fetch(
        &mut self,
        result: Result<Vec<ArrivalRecord>, MonitorError>,
        mono: Instant,
        now: DateTime<Utc>,
    ) -> FetchOutcome {
        match result {
            Ok(records) => {
                let fresh = ArrivalSet::new(records);
                let upcoming = fresh.upcoming_count(now);
                if upcoming == 0 {
                    self.mark_stale(mono);
                    return FetchOutcome::Empty;
                }
                let total = fresh.len();
                self.arrivals = fresh;
                self.phase = Phase::Warm;
                self.last_refresh = Some(mono);
                self.retry_at = None;
                FetchOutcome::Refreshed { total, upcoming }
            }
            Err(e) => {
                self.mark_stale(mono);
                FetchOutcome::Failed(e)
            }
        }
    }

    fn mark_stale(&mut self, mono: Instant) {
        self.phase = Phase::Stale;
        self.retry_at = Some(deadline(mono, self.retry_interval));
    }
}

/// Furthest ahead a fetch is ever scheduled.
const FAR_FUTURE: Duration = Duration::from_secs(365 * 86_400);

/// `from + after`, with `after` capped at [`FAR_FUTURE`] so the sum cannot overflow.
fn deadline(from: Instant, after: Duration) -> Instant {
    from.checked_add(after.min(FAR_FUTURE)).unwrap_or(from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    const REFRESH: Duration = Duration::from_secs(180);
    const RETRY: Duration = Duration::from_secs(30);

    fn wall0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    struct Harness {
        sched: SchedulerState,
        mono0: Instant,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                sched: SchedulerState::new(REFRESH, RETRY),
                mono0: Instant::now(),
            }
        }

        fn poll(&mut self, secs: u64) -> TickAction {
            let (mono, wall) = self.at(secs);
            self.sched.poll(mono, wall)
        }

        fn fetch(&mut self, secs: u64, records: Vec<ArrivalRecord>) -> FetchOutcome {
            let (mono, wall) = self.at(secs);
            self.sched.record_fetch(Ok(records), mono, wall)
        }

        fn fail(&mut self, secs: u64) -> FetchOutcome {
            let (mono, wall) = self.at(secs);
            self.sched
                .record_fetch(Err(MonitorError::HttpStatus { status: 502 }), mono, wall)
        }

        fn at(&self, secs: u64) -> (Instant, DateTime<Utc>) {
            (
                self.mono0 + Duration::from_secs(secs),
                wall0() + TimeDelta::seconds(secs as i64),
            )
        }
    }

    fn rec(offset_secs: i64, route: &str) -> ArrivalRecord {
        ArrivalRecord::new(wall0() + TimeDelta::seconds(offset_secs), route, "trip")
    }

    #[test]
    fn test_huge_intervals_saturate_instead_of_overflowing() {
        let mono0 = Instant::now();
        let mut sched = SchedulerState::new(Duration::MAX, Duration::MAX);
        sched.poll(mono0, wall0());

        let outcome = sched.record_fetch(Ok(vec![]), mono0, wall0());
        assert!(matches!(outcome, FetchOutcome::Empty));
        assert_eq!(sched.next_fetch_at(), Some(mono0 + FAR_FUTURE));
        assert_eq!(
            sched.poll(mono0 + Duration::from_secs(3600), wall0()),
            TickAction::Render
        );

        sched.record_fetch(Ok(vec![rec(600, "7")]), mono0, wall0());
        assert_eq!(sched.phase(), Phase::Warm);
        assert_eq!(sched.next_fetch_at(), Some(mono0 + FAR_FUTURE));
        assert_eq!(sched.poll(mono0, wall0()), TickAction::Render);
    }

    #[test]
    fn test_cold_fetches_immediately() {
        let mut h = Harness::new();
        assert_eq!(h.sched.phase(), Phase::Cold);
        assert_eq!(h.poll(0), TickAction::Fetch(FetchReason::Initial));
    }

    #[test]
    fn test_successful_fetch_goes_warm_and_renders_until_cadence() {
        let mut h = Harness::new();
        h.poll(0);
        let outcome = h.fetch(0, vec![rec(600, "7"), rec(900, "12")]);

        assert!(matches!(outcome, FetchOutcome::Refreshed { total: 2, upcoming: 2 }));
        assert_eq!(h.sched.phase(), Phase::Warm);
        assert_eq!(h.poll(1), TickAction::Render);
        assert_eq!(h.poll(179), TickAction::Render);
        assert_eq!(h.poll(180), TickAction::Fetch(FetchReason::Regular));
    }

    #[test]
    fn test_empty_fetch_goes_stale_with_short_retry() {
        let mut h = Harness::new();
        h.poll(0);
        let outcome = h.fetch(0, vec![]);

        assert!(matches!(outcome, FetchOutcome::Empty));
        assert_eq!(h.sched.phase(), Phase::Stale);
        assert_eq!(
            h.sched.next_fetch_at(),
            Some(h.mono0 + RETRY),
            "retry uses the short interval, not the regular cadence"
        );
        assert_eq!(h.poll(29), TickAction::Render);
        assert_eq!(h.poll(30), TickAction::Fetch(FetchReason::Retry));
    }

    #[test]
    fn test_fetch_of_only_past_records_counts_as_empty() {
        let mut h = Harness::new();
        h.poll(0);
        let outcome = h.fetch(0, vec![rec(-60, "7"), rec(0, "7")]);

        assert!(matches!(outcome, FetchOutcome::Empty));
        assert_eq!(h.sched.phase(), Phase::Stale);
    }

    #[test]
    fn test_all_expired_forces_immediate_fetch() {
        let mut h = Harness::new();
        h.poll(0);
        h.fetch(0, vec![rec(20, "7"), rec(40, "12")]);

        assert_eq!(h.poll(30), TickAction::Render);
        // both records now behind us, well before the regular cadence
        assert_eq!(h.poll(41), TickAction::Fetch(FetchReason::Expired));
        assert_eq!(h.sched.phase(), Phase::Stale);
    }

    #[test]
    fn test_partially_expired_set_does_not_force_fetch() {
        let mut h = Harness::new();
        h.poll(0);
        h.fetch(0, vec![rec(20, "7"), rec(400, "12")]);

        assert_eq!(h.poll(60), TickAction::Render);
        assert_eq!(h.sched.phase(), Phase::Warm);
    }

    #[test]
    fn test_failure_keeps_cached_set() {
        let mut h = Harness::new();
        h.poll(0);
        h.fetch(0, vec![rec(600, "7")]);
        h.poll(180);
        let outcome = h.fail(180);

        assert!(matches!(outcome, FetchOutcome::Failed(_)));
        assert_eq!(h.sched.phase(), Phase::Stale);
        assert_eq!(h.sched.arrivals().len(), 1);
        assert_eq!(h.poll(200), TickAction::Render);
        assert_eq!(h.poll(210), TickAction::Fetch(FetchReason::Retry));
    }

    #[test]
    fn test_empty_fetch_does_not_clear_cache() {
        let mut h = Harness::new();
        h.poll(0);
        h.fetch(0, vec![rec(600, "7")]);
        h.fetch(180, vec![]);

        assert_eq!(h.sched.arrivals().records(), &[rec(600, "7")]);
    }

    #[test]
    fn test_recovery_from_stale_resets_regular_cadence() {
        let mut h = Harness::new();
        h.poll(0);
        h.fail(0);
        assert_eq!(h.poll(30), TickAction::Fetch(FetchReason::Retry));
        h.fetch(30, vec![rec(1000, "7")]);

        assert_eq!(h.sched.phase(), Phase::Warm);
        assert_eq!(h.poll(209), TickAction::Render);
        assert_eq!(h.poll(210), TickAction::Fetch(FetchReason::Regular));
    }

    #[test]
    fn test_repeated_empty_fetches_stay_on_retry_cadence() {
        let mut h = Harness::new();
        h.poll(0);
        h.fetch(0, vec![]);
        assert_eq!(h.poll(30), TickAction::Fetch(FetchReason::Retry));
        h.fetch(30, vec![]);

        assert_eq!(h.poll(59), TickAction::Render);
        assert_eq!(h.poll(60), TickAction::Fetch(FetchReason::Retry));
    }
}
