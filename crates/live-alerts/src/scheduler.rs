//! Periodic timers.
//!
//! Each timer runs its callback on its own task at a fixed period. The first
//! invocation happens one full period after scheduling, and a callback is
//! always awaited before the next tick is considered, so invocations of the
//! same timer never overlap.

use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::MIN_TICK_PERIOD;

/// Callback invoked on every timer tick.
pub type TimerCallback = Box<dyn FnMut() -> BoxFuture<'static, ()> + Send>;

/// Arms periodic timers.
pub trait Scheduler: Send + Sync {
    /// Invoke `callback` every `period` until the returned handle is cancelled.
    fn schedule(&self, name: &str, period: Duration, callback: TimerCallback) -> TimerHandle;
}

/// A handle to an armed timer.
#[derive(Debug)]
pub struct TimerHandle {
    /// Timer name for logging.
    pub name: String,
    /// Tick period.
    pub period: Duration,
    cancellation_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    pub fn new(name: impl Into<String>, period: Duration, token: CancellationToken) -> Self {
        Self {
            name: name.into(),
            period,
            cancellation_token: token,
            task: None,
        }
    }

    fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    /// Cancel this timer. A callback already running is allowed to finish.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Cancel and wait for the timer task to exit.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

/// [`Scheduler`] backed by tokio intervals.
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler {
    cancellation_token: CancellationToken,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every timer armed by this scheduler.
    pub fn cancel_all(&self) {
        self.cancellation_token.cancel();
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, name: &str, period: Duration, mut callback: TimerCallback) -> TimerHandle {
        let period = period.max(MIN_TICK_PERIOD);
        let token = self.cancellation_token.child_token();
        let handle = TimerHandle::new(name, period, token.clone());
        let name = name.to_string();

        let first_tick = Instant::now() + period;

        debug!(timer = %name, period_ms = period.as_millis() as u64, "Arming timer");
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(first_tick, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        trace!(timer = %name, "Timer tick");
                        callback().await;
                    }
                }
            }
            debug!(timer = %name, "Timer stopped");
        });

        handle.with_task(task)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;

    use super::*;

    fn counting(counter: &Arc<AtomicUsize>) -> TimerCallback {
        let counter = counter.clone();
        Box::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let scheduler = TokioScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let _timer = scheduler.schedule("test", Duration::from_secs(5), counting(&count));

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let scheduler = TokioScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let timer = scheduler.schedule("test", Duration::from_secs(1), counting(&count));

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        timer.cancel();
        assert!(timer.is_cancelled());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let scheduler = TokioScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let a = scheduler.schedule("a", Duration::from_secs(1), counting(&count));
        let b = scheduler.schedule("b", Duration::from_secs(1), counting(&count));

        scheduler.cancel_all();
        assert!(a.is_cancelled() && b.is_cancelled());
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_is_clamped() {
        let scheduler = TokioScheduler::new();
        let timer = scheduler.schedule("fast", Duration::ZERO, Box::new(|| async {}.boxed()));
        assert_eq!(timer.period, MIN_TICK_PERIOD);
        timer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_callback_does_not_overlap() {
        let scheduler = TokioScheduler::new();
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let (r, m) = (running.clone(), max_seen.clone());
        let _timer = scheduler.schedule(
            "slow",
            Duration::from_secs(1),
            Box::new(move || {
                let (r, m) = (r.clone(), m.clone());
                async move {
                    let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                    m.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    r.fetch_sub(1, Ordering::SeqCst);
                }
                .boxed()
            }),
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
