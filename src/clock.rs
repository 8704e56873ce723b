use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::model::{now, Timestamp};

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<std::sync::RwLock<Timestamp>>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Arc::new(std::sync::RwLock::new(start)),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut current = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current = *current + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        match self.current.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Drives the passive progress loop.
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick. Returns the simulated playback time that passed.
    async fn tick(&mut self) -> Duration;
}

#[derive(Debug)]
pub struct IntervalTicker {
    interval: tokio::time::Interval,
}

impl IntervalTicker {
    /// Starts one period from now, so the first tick does not fire immediately.
    pub fn new(period: Duration) -> Self {
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> Duration {
        self.interval.tick().await;
        self.interval.period()
    }
}

/// A ticker fed by hand through a [TickSender].
///
/// Once every sender is dropped the ticker never fires again.
#[derive(Debug)]
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<Duration>,
}

#[derive(Debug, Clone)]
pub struct TickSender {
    tx: mpsc::UnboundedSender<Duration>,
}

impl ManualTicker {
    pub fn new() -> (Self, TickSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, TickSender { tx })
    }
}

impl TickSender {
    pub fn tick(&self, elapsed: Duration) -> bool {
        self.tx.send(elapsed).is_ok()
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> Duration {
        match self.rx.recv().await {
            Some(elapsed) => elapsed,
            None => std::future::pending::<Duration>().await,
        }
    }
}
