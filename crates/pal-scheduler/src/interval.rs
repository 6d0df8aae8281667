//! Fixed-interval timer: fires every N hours, first firing one full
//! interval after `start`.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::job::{Callback, ScheduleHandle, fire};

pub struct IntervalScheduler {
    name: String,
    period: Duration,
    handle: Option<ScheduleHandle>,
}

impl IntervalScheduler {
    pub fn new(name: impl Into<String>, interval_hours: u32) -> Self {
        Self::with_period(name, Duration::from_secs(u64::from(interval_hours) * 3600))
    }

    pub fn with_period(name: impl Into<String>, period: Duration) -> Self {
        Self {
            name: name.into(),
            period,
            handle: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Arm the timer, replacing any previous one.
    pub fn start(&mut self, callback: Callback) {
        self.stop();

        let name = self.name.clone();
        let period = self.period;
        self.handle = Some(ScheduleHandle::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tracing::info!("🔔 [{name}] interval elapsed");
                fire(&name, &callback).await;
            }
        }));
        tracing::info!("📅 [{}] armed every {:?}", self.name, self.period);
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
            tracing::debug!("[{}] interval timer stopped", self.name);
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(ScheduleHandle::is_active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::callback;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (Arc<AtomicUsize>, Callback) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let cb = callback(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        (hits, cb)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_firing_after_one_interval() {
        let (hits, cb) = counting();
        let mut scheduler = IntervalScheduler::new("reminder", 3);
        scheduler.start(cb);
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(3 * 3600 - 1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(6 * 3600)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_callback_keeps_schedule() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let cb = callback(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    panic!("first firing explodes");
                }
                Err(pal_core::PalError::Channel("still broken".into()))
            }
        });

        let mut scheduler = IntervalScheduler::new("reminder", 1);
        scheduler.start(cb);
        tokio::time::sleep(Duration::from_secs(3 * 3600 + 1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_timer() {
        let (hits, cb) = counting();
        let mut scheduler = IntervalScheduler::new("reminder", 1);
        scheduler.start(cb.clone());
        scheduler.start(cb);

        tokio::time::sleep(Duration::from_secs(3600 + 1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        scheduler.stop();
        assert!(!scheduler.is_running());
        tokio::time::sleep(Duration::from_secs(5 * 3600)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
