//! Fixed-time daily timer: fires once per day at a local `HH:MM`.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Days, NaiveDateTime, NaiveTime};

use crate::clock::{Clock, sleep_until};
use crate::job::{Callback, ScheduleHandle, fire};

/// Next occurrence of `at` that is not before `after` (today or tomorrow).
pub fn next_occurrence(after: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = after.date().and_time(at);
    if today >= after { today } else { today + Days::new(1) }
}

pub struct DailyScheduler {
    name: String,
    at: NaiveTime,
    clock: Arc<dyn Clock>,
    next: Arc<Mutex<Option<NaiveDateTime>>>,
    handle: Option<ScheduleHandle>,
}

impl DailyScheduler {
    pub fn new(name: impl Into<String>, at: NaiveTime, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            at,
            clock,
            next: Arc::new(Mutex::new(None)),
            handle: None,
        }
    }

    pub fn start(&mut self, callback: Callback) {
        self.stop();

        let first = next_occurrence(self.clock.now(), self.at);
        self.set_next(Some(first));

        let name = self.name.clone();
        let clock = self.clock.clone();
        let next = self.next.clone();
        self.handle = Some(ScheduleHandle::spawn(async move {
            let mut target = first;
            loop {
                sleep_until(clock.as_ref(), target).await;
                tracing::info!("🔔 [{name}] daily check at {}", target.format("%H:%M"));
                fire(&name, &callback).await;

                // Whole days from the previous target, never from "now".
                let now = clock.now();
                target = target + Days::new(1);
                while target < now {
                    target = target + Days::new(1);
                }
                *next.lock().unwrap_or_else(PoisonError::into_inner) = Some(target);
                tracing::debug!("[{name}] next daily check {}", target.format("%Y-%m-%d %H:%M"));
            }
        }));
        tracing::info!(
            "📅 [{}] daily check armed for {}",
            self.name,
            first.format("%Y-%m-%d %H:%M")
        );
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
        self.set_next(None);
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(ScheduleHandle::is_active)
    }

    /// Planned instant of the next firing, if armed.
    pub fn next_fire(&self) -> Option<NaiveDateTime> {
        *self.next.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_next(&self, value: Option<NaiveDateTime>) {
        *self.next.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }
}
