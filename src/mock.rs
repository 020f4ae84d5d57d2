//! Test doubles for running the monitor without a network or hardware.
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockFeed`] | [`FeedSource`] | Queued fetch results, counts fetches |
//! | [`MockDisplay`] | [`SegmentDisplay`] | Records writes, injectable failures and delay |
//! | [`SharedBuffer`] | [`std::io::Write`] | Captures console output |

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{DisplayError, MonitorError};
use crate::fetch::FeedSource;
use crate::output::SegmentDisplay;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Feed source returning queued results in order.
///
/// Once the queue is drained every fetch returns an empty (but valid) feed.
#[derive(Clone, Default)]
pub struct MockFeed {
    queue: Arc<Mutex<VecDeque<Result<Vec<u8>, MonitorError>>>>,
    fetches: Arc<AtomicUsize>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&self, bytes: Vec<u8>) {
        lock(&self.queue).push_back(Ok(bytes));
    }

    pub fn push_error(&self, err: MonitorError) {
        lock(&self.queue).push_back(Err(err));
    }

    /// Number of fetches made so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for MockFeed {
    async fn fetch(&self) -> Result<Vec<u8>, MonitorError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        lock(&self.queue).pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn describe(&self) -> &str {
        "mock"
    }
}

#[derive(Default)]
struct DisplayState {
    writes: Vec<String>,
    attempts: usize,
    fail_remaining: usize,
}

/// Segment display that records what it was asked to show.
#[derive(Clone, Default)]
pub struct MockDisplay {
    state: Arc<Mutex<DisplayState>>,
    delay: Option<Duration>,
}

impl MockDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write block for `delay` before succeeding.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fails the next `n` writes.
    pub fn fail_next(&self, n: usize) {
        lock(&self.state).fail_remaining = n;
    }

    /// A handle sharing this display's recorded state.
    pub fn shared(&self) -> Arc<dyn SegmentDisplay> {
        Arc::new(self.clone())
    }

    pub fn last(&self) -> Option<String> {
        lock(&self.state).writes.last().cloned()
    }

    pub fn writes(&self) -> Vec<String> {
        lock(&self.state).writes.clone()
    }

    pub fn attempts(&self) -> usize {
        lock(&self.state).attempts
    }
}

impl SegmentDisplay for MockDisplay {
    fn show(&self, glyphs: &str) -> Result<(), DisplayError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let mut state = lock(&self.state);
        state.attempts += 1;
        if state.fail_remaining > 0 {
            state.fail_remaining -= 1;
            return Err(DisplayError::Io(io::Error::other("bus contention")));
        }
        state.writes.push(glyphs.to_string());
        Ok(())
    }
}

/// In-memory writer whose clones share one buffer.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&lock(&self.0)).into_owned()
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.0).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
