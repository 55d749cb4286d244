//! Cancellable periodic publishing.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::stats::PublisherStats;
use super::{publish_guarded, Publisher};
use crate::error::{PublishError, PublisherError};

struct RunningTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Drives a [`Publisher`] on a fixed interval.
///
/// The first publish happens one interval after [`start`](Self::start).
/// Ticks missed because a publish ran long are delayed, never bunched.
pub struct ScheduledPublisher {
    publisher: Arc<dyn Publisher>,
    interval: Duration,
    stats: Arc<PublisherStats>,
    task: Mutex<Option<RunningTask>>,
}

impl ScheduledPublisher {
    pub fn new(publisher: Arc<dyn Publisher>, interval: Duration, stats: Arc<PublisherStats>) -> Self {
        Self {
            publisher,
            interval,
            stats,
            task: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        self.publisher.name()
    }

    pub fn publisher(&self) -> &Arc<dyn Publisher> {
        &self.publisher
    }

    pub fn stats(&self) -> &Arc<PublisherStats> {
        &self.stats
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Start the periodic task. Fails if it is already running.
    pub async fn start(&self) -> Result<(), PublisherError> {
        let mut task = self.task.lock().await;

        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return Err(PublisherError::AlreadyRunning(self.name().to_string()));
        }

        let first_tick = self.first_tick(Instant::now()).ok_or_else(|| {
            PublisherError::InvalidInterval(self.name().to_string())
        })?;

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run(
            self.publisher.clone(),
            self.stats.clone(),
            first_tick,
            self.interval,
            shutdown_rx,
        ));

        *task = Some(RunningTask { shutdown, handle });
        self.stats.set_running(true);
        info!(
            publisher = %self.name(),
            interval_secs = self.interval.as_secs(),
            "Publisher started"
        );
        Ok(())
    }

    /// Deadline of the first publish, if the timer can represent the
    /// schedule from `now`.
    fn first_tick(&self, now: Instant) -> Option<Instant> {
        if self.interval.is_zero() {
            return None;
        }
        let first = now.checked_add(self.interval)?;
        // The ticker computes the following deadline the same way.
        first.checked_add(self.interval)?;
        Some(first)
    }

    /// Stop the periodic task, waiting for an in-flight publish to finish.
    ///
    /// Stopping a stopped publisher does nothing.
    pub async fn stop(&self) -> Result<(), PublisherError> {
        let mut task = self.task.lock().await;

        let Some(running) = task.take() else {
            return Ok(());
        };

        // The task may already have exited; a closed channel is fine.
        let _ = running.shutdown.send(());
        if let Err(e) = running.handle.await {
            error!(publisher = %self.name(), "Publisher task ended abnormally: {}", e);
        }

        self.stats.set_running(false);
        info!(publisher = %self.name(), "Publisher stopped");
        Ok(())
    }

    /// Publish once, outside the schedule, recording the outcome.
    pub async fn publish_now(&self) -> Result<(), PublishError> {
        publish_once(self.publisher.as_ref(), &self.stats).await
    }
}

async fn run(
    publisher: Arc<dyn Publisher>,
    stats: Arc<PublisherStats>,
    first_tick: Instant,
    period: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                // Errors are recorded in stats and retried on the next tick.
                let _ = publish_once(publisher.as_ref(), &stats).await;
            }
        }
    }

    debug!(publisher = %publisher.name(), "Publisher loop exited");
}

async fn publish_once(publisher: &dyn Publisher, stats: &PublisherStats) -> Result<(), PublishError> {
    let result = publish_guarded(publisher).await;

    match &result {
        Ok(()) => {
            stats.record_success(Utc::now());
            debug!(publisher = %publisher.name(), "Publish succeeded");
        }
        Err(e @ PublishError::Panicked(_)) => {
            stats.record_failure(e);
            error!(publisher = %publisher.name(), "Publish panicked: {}", e);
        }
        Err(e) => {
            stats.record_failure(e);
            warn!(publisher = %publisher.name(), "Publish failed: {}", e);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        delay: Duration,
        panic_on_first: bool,
    }

    impl Counting {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                panic_on_first: false,
            }
        }
    }

    #[async_trait]
    impl Publisher for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn publish(&self) -> Result<(), PublishError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.panic_on_first && call == 0 {
                panic!("sensor exploded");
            }
            Ok(())
        }
    }

    fn scheduled(publisher: Arc<Counting>, secs: u64) -> ScheduledPublisher {
        ScheduledPublisher::new(
            publisher,
            Duration::from_secs(secs),
            Arc::new(PublisherStats::new("counting", "custom", secs)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_fails() {
        let scheduler = scheduled(Arc::new(Counting::new()), 60);

        scheduler.start().await.unwrap();
        let err = scheduler.start().await.unwrap_err();
        assert!(matches!(err, PublisherError::AlreadyRunning(ref name) if name == "counting"));
        assert!(err.to_string().contains("already running"));

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unschedulable_interval_is_rejected() {
        for interval in [Duration::MAX, Duration::ZERO] {
            let publisher = Arc::new(Counting::new());
            let scheduler = ScheduledPublisher::new(
                publisher.clone(),
                interval,
                Arc::new(PublisherStats::new("counting", "custom", interval.as_secs())),
            );

            let err = scheduler.start().await.unwrap_err();
            assert!(matches!(err, PublisherError::InvalidInterval(ref name) if name == "counting"));
            assert!(!scheduler.is_running().await);
            assert!(!scheduler.stats().snapshot().running);

            tokio::time::sleep(Duration::from_secs(60)).await;
            assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_twice_is_noop() {
        let scheduler = scheduled(Arc::new(Counting::new()), 60);

        assert!(scheduler.stop().await.is_ok());
        scheduler.start().await.unwrap();
        assert!(scheduler.is_running().await);
        assert!(scheduler.stop().await.is_ok());
        assert!(scheduler.stop().await.is_ok());
        assert!(!scheduler.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let scheduler = scheduled(Arc::new(Counting::new()), 60);

        scheduler.start().await.unwrap();
        scheduler.stop().await.unwrap();
        scheduler.start().await.unwrap();
        assert!(scheduler.stats().snapshot().running);
        scheduler.stop().await.unwrap();
        assert!(!scheduler.stats().snapshot().running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_every_interval() {
        let publisher = Arc::new(Counting::new());
        let scheduler = scheduled(publisher.clone(), 10);
        scheduler.start().await.unwrap();

        // Nothing fires at start.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 3);

        scheduler.stop().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.stats().successes(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_in_flight_publish() {
        let publisher = Arc::new(Counting {
            delay: Duration::from_secs(5),
            ..Counting::new()
        });
        let scheduler = scheduled(publisher.clone(), 10);
        scheduler.start().await.unwrap();

        // First tick at 10s; the publish is still sleeping at 12s.
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.stats().successes(), 0);

        scheduler.stop().await.unwrap();
        assert_eq!(scheduler.stats().successes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_does_not_stop_schedule() {
        let publisher = Arc::new(Counting {
            panic_on_first: true,
            ..Counting::new()
        });
        let scheduler = scheduled(publisher.clone(), 10);
        scheduler.start().await.unwrap();

        tokio::time::sleep(Duration::from_secs(25)).await;

        assert_eq!(publisher.calls.load(Ordering::SeqCst), 2);
        let status = scheduler.stats().snapshot();
        assert_eq!(status.failures, 1);
        assert_eq!(status.successes, 1);
        assert!(status.last_error.unwrap().contains("sensor exploded"));
        assert!(scheduler.is_running().await);

        scheduler.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_now_records_outcome() {
        let scheduler = scheduled(Arc::new(Counting::new()), 60);
        scheduler.publish_now().await.unwrap();
        assert_eq!(scheduler.stats().successes(), 1);
    }
}
