//! The monitoring loop.
//!
//! One task alternates between the scheduler's fetch decisions and rendering.
//! A fetch (bytes, decode, extract) completes before the tick renders, so the
//! render never sees a half-replaced arrival set.

use std::future::Future;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::arrivals::ArrivalRecord;
use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::extract::extract;
use crate::fetch::FeedSource;
use crate::output::Presenter;
use crate::parser::decode_feed;
use crate::scheduler::{FetchOutcome, FetchReason, SchedulerState, TickAction};
use crate::select::DisplaySelection;

pub struct Monitor<C> {
    config: MonitorConfig,
    scheduler: SchedulerState,
    source: Box<dyn FeedSource>,
    presenter: Presenter,
    clock: C,
}

impl<C: Clock> Monitor<C> {
    pub fn new(
        config: MonitorConfig,
        source: Box<dyn FeedSource>,
        presenter: Presenter,
        clock: C,
    ) -> Self {
        let scheduler = SchedulerState::new(config.refresh_interval, config.retry_interval);
        Self {
            config,
            scheduler,
            source,
            presenter,
            clock,
        }
    }

    pub fn scheduler(&self) -> &SchedulerState {
        &self.scheduler
    }

    /// One UI tick: fetch if the scheduler asks for it, then render.
    pub async fn tick(&mut self) -> DisplaySelection {
        let action = self
            .scheduler
            .poll(self.clock.monotonic(), self.clock.wall());
        if let TickAction::Fetch(reason) = action {
            self.refresh(reason).await;
        }

        let now = self.clock.wall();
        let selection = DisplaySelection::compute(
            self.scheduler.arrivals().records(),
            now,
            self.config.top_k,
            self.config.monitored_routes(),
        );
        self.presenter.render(&selection, now).await;
        selection
    }

    /// Ticks every `tick_interval` until `shutdown` resolves.
    ///
    /// A fetch still in flight when `shutdown` fires is dropped, not retried.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        info!(
            stop_id = %self.config.stop_id,
            source = self.source.describe(),
            refresh_secs = self.config.refresh_interval.as_secs(),
            retry_secs = self.config.retry_interval.as_secs(),
            displays = self.presenter.displays_active(),
            "Monitor started"
        );

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = async {
                    ticker.tick().await;
                    self.tick().await;
                } => {}
            }
        }

        self.presenter.finish();
        info!("Monitor stopped");
    }

    async fn refresh(&mut self, reason: FetchReason) {
        info!(stop_id = %self.config.stop_id, reason = reason.as_str(), "Fetching arrivals");

        let result = self.fetch_arrivals().await;
        let outcome = self
            .scheduler
            .record_fetch(result, self.clock.monotonic(), self.clock.wall());

        match outcome {
            FetchOutcome::Refreshed { total, upcoming } => {
                info!(total, upcoming, "Arrivals refreshed");
            }
            FetchOutcome::Empty => {
                info!(
                    retry_secs = self.config.retry_interval.as_secs(),
                    "No upcoming arrivals in feed"
                );
            }
            FetchOutcome::Failed(e) => {
                warn!(
                    kind = e.kind(),
                    error = %e,
                    retry_secs = self.config.retry_interval.as_secs(),
                    "Feed fetch failed"
                );
            }
        }
    }

    async fn fetch_arrivals(&self) -> Result<Vec<ArrivalRecord>, MonitorError> {
        let bytes = self.source.fetch().await?;
        let updates = decode_feed(&bytes)?;
        let records = extract(&updates, &self.config.stop_id);
        debug!(
            trip_updates = updates.len(),
            matched = records.len(),
            "Extracted arrivals for stop"
        );
        Ok(records)
    }
}
