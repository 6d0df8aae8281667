//! Wall-clock source for the schedulers.

use chrono::{Local, NaiveDateTime};

/// Local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The machine's local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Wall clock anchored at a fixed instant that advances with tokio's clock.
///
/// Under `start_paused` tests it moves only when tokio time is advanced.
#[derive(Debug, Clone)]
pub struct TokioClock {
    base: NaiveDateTime,
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn starting_at(base: NaiveDateTime) -> Self {
        Self {
            base,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.base + elapsed
    }
}

/// Sleep until `at` on `clock`. Returns immediately for past instants.
pub async fn sleep_until(clock: &dyn Clock, at: NaiveDateTime) {
    let remaining = (at - clock.now()).to_std().unwrap_or_default();
    tokio::time::sleep(remaining).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let base = NaiveDate::from_ymd_opt(2026, 10, 17)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let clock = TokioClock::starting_at(base);
        assert_eq!(clock.now(), base);

        tokio::time::sleep(Duration::from_secs(90 * 60)).await;
        assert_eq!(clock.now(), base + chrono::Duration::minutes(90));

        let target = base + chrono::Duration::hours(3);
        sleep_until(&clock, target).await;
        assert_eq!(clock.now(), target);
    }
}
