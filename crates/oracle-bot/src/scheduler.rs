//! Periodic single-flight driver.
//!
//! Ticks on a fixed interval. At most one cycle runs at a time: a tick that
//! fires while a cycle is in flight is dropped, never queued. On shutdown the
//! in-flight cycle gets a grace period, then it is abandoned.

use std::time::Duration;

use oracle_telemetry::Metrics;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::cycle::CycleDriver;

/// What the scheduler did before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub ticks_dropped: u64,
    /// An in-flight cycle was dropped at shutdown.
    pub abandoned: bool,
}

pub struct Scheduler {
    interval: Duration,
    shutdown_grace: Duration,
}

impl Scheduler {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms.max(1)),
            shutdown_grace: Duration::from_millis(config.shutdown_grace_ms),
        }
    }

    /// Drive cycles until `shutdown` is cancelled.
    ///
    /// The first cycle starts immediately. When this returns no cycle is
    /// running and none can touch the driver's state any more.
    pub async fn run(&self, driver: &mut CycleDriver, shutdown: CancellationToken) -> SchedulerReport {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut report = SchedulerReport::default();

        info!(
            interval_ms = self.interval.as_millis() as u64,
            grace_ms = self.shutdown_grace.as_millis() as u64,
            "Scheduler started"
        );

        'ticks: loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break 'ticks,
                _ = ticker.tick() => {}
            }

            report.cycles_started += 1;
            let cycle = driver.execute();
            tokio::pin!(cycle);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        match timeout(self.shutdown_grace, &mut cycle).await {
                            Ok(_) => report.cycles_completed += 1,
                            Err(_) => {
                                report.abandoned = true;
                                warn!(
                                    grace_ms = self.shutdown_grace.as_millis() as u64,
                                    "In-flight cycle abandoned at shutdown"
                                );
                            }
                        }
                        break 'ticks;
                    }
                    _ = &mut cycle => {
                        report.cycles_completed += 1;
                        break;
                    }
                    _ = ticker.tick() => {
                        report.ticks_dropped += 1;
                        Metrics::tick_dropped();
                        debug!("Tick dropped, cycle still in flight");
                    }
                }
            }
        }

        info!(
            cycles_started = report.cycles_started,
            cycles_completed = report.cycles_completed,
            ticks_dropped = report.ticks_dropped,
            abandoned = report.abandoned,
            "Scheduler stopped"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use oracle_core::{BoxFuture, Clock, PipelineParams, PriceSample, SystemClock};
    use oracle_feed::{FeedResult, PriceSource};

    use super::*;

    /// Fresh sample after a fixed delay; tracks overlapping fetches.
    struct SlowSource {
        delay: Duration,
        active: AtomicUsize,
        max_active: AtomicUsize,
        fetches: AtomicUsize,
    }

    impl SlowSource {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    impl PriceSource for SlowSource {
        fn fetch_latest(&self) -> BoxFuture<'_, FeedResult<PriceSample>> {
            Box::pin(async move {
                let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_active.fetch_max(now_active, Ordering::SeqCst);
                self.fetches.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok(PriceSample::new("feed", 4200.0, SystemClock.now_ms()))
            })
        }

        fn feed_id(&self) -> &str {
            "feed"
        }
    }

    fn driver(source: Arc<SlowSource>) -> CycleDriver {
        CycleDriver::new(source, None, PipelineParams::default(), Arc::new(SystemClock))
    }

    fn scheduler(interval_ms: u64, shutdown_grace_ms: u64) -> Scheduler {
        Scheduler::new(&SchedulerConfig {
            interval_ms,
            shutdown_grace_ms,
        })
    }

    #[tokio::test]
    async fn test_overlapping_ticks_are_dropped() {
        let source = Arc::new(SlowSource::new(Duration::from_millis(120)));
        let mut driver = driver(source.clone());
        let shutdown = CancellationToken::new();

        let canceller = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(450)).await;
            canceller.cancel();
        });

        let report = scheduler(50, 1_000).run(&mut driver, shutdown).await;

        assert!(report.ticks_dropped >= 1, "{report:?}");
        assert!(report.cycles_completed >= 2, "{report:?}");
        assert_eq!(report.cycles_started, report.cycles_completed);
        assert!(!report.abandoned);
        assert_eq!(source.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(
            driver.state().total_cycles,
            source.fetches.load(Ordering::SeqCst) as u64
        );
    }

    #[tokio::test]
    async fn test_in_flight_cycle_finishes_within_grace() {
        let source = Arc::new(SlowSource::new(Duration::from_millis(100)));
        let mut driver = driver(source);
        let reader = driver.reader();
        let shutdown = CancellationToken::new();

        let canceller = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let report = scheduler(10_000, 2_000).run(&mut driver, shutdown).await;

        assert_eq!(report.cycles_started, 1);
        assert_eq!(report.cycles_completed, 1);
        assert!(!report.abandoned);
        assert_eq!(reader.snapshot().total_cycles, 1);
        assert_eq!(reader.snapshot().last_index_value, Some(105.0));
    }

    #[tokio::test]
    async fn test_cycle_abandoned_after_grace() {
        let source = Arc::new(SlowSource::new(Duration::from_secs(30)));
        let mut driver = driver(source);
        let reader = driver.reader();
        let shutdown = CancellationToken::new();

        let canceller = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let report = timeout(
            Duration::from_secs(5),
            scheduler(10_000, 50).run(&mut driver, shutdown),
        )
        .await
        .expect("scheduler must stop after the grace period");

        assert_eq!(report.cycles_started, 1);
        assert_eq!(report.cycles_completed, 0);
        assert!(report.abandoned);
        assert_eq!(reader.snapshot().total_cycles, 0);
        assert_eq!(driver.state(), &reader.snapshot());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let source = Arc::new(SlowSource::new(Duration::from_millis(1)));
        let mut driver = driver(source.clone());
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let report = scheduler(100, 100).run(&mut driver, shutdown).await;

        assert_eq!(report, SchedulerReport::default());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }
}
