//! Randomized daily timer: one random instant inside each window of the day.
//!
//! The day is split into windows starting at `0, h, 2h, … < 24`. Every
//! window gets its own slot task. A slot sleeps until its drawn instant,
//! fires, then draws a fresh instant in the same window of the next
//! calendar day. All slots of one scheduler share a fire lock so firings
//! never overlap.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::{Clock, sleep_until};
use crate::job::{Callback, ScheduleHandle, fire};

/// Start hours of each window for an `interval_hours`-wide split.
pub fn window_starts(interval_hours: u32) -> Vec<u32> {
    let step = interval_hours.clamp(1, 24) as usize;
    (0..24).step_by(step).collect()
}

/// Length of the window starting at `start_hour`, truncated at midnight.
pub fn window_minutes(start_hour: u32, interval_hours: u32) -> u32 {
    let end = (start_hour + interval_hours).min(24);
    end.saturating_sub(start_hour) * 60
}

fn random_instant(
    date: NaiveDate,
    start_hour: u32,
    interval_hours: u32,
    rng: &mut impl Rng,
) -> NaiveDateTime {
    let minutes = window_minutes(start_hour, interval_hours).max(1);
    let offset = rng.gen_range(0..minutes);
    date.and_time(NaiveTime::MIN)
        + chrono::Duration::hours(i64::from(start_hour))
        + chrono::Duration::minutes(i64::from(offset))
}

/// First instant for a window: today, or tomorrow if the draw is already past.
pub fn first_fire_time(
    now: NaiveDateTime,
    start_hour: u32,
    interval_hours: u32,
    rng: &mut impl Rng,
) -> NaiveDateTime {
    let at = random_instant(now.date(), start_hour, interval_hours, rng);
    if at < now { at + Days::new(1) } else { at }
}

/// Instant for the same window on the calendar day after `previous`.
pub fn next_day_fire_time(
    previous: NaiveDateTime,
    start_hour: u32,
    interval_hours: u32,
    rng: &mut impl Rng,
) -> NaiveDateTime {
    random_instant(previous.date() + Days::new(1), start_hour, interval_hours, rng)
}

struct Slot {
    next_fire: Arc<Mutex<NaiveDateTime>>,
    handle: ScheduleHandle,
}

pub struct RandomDailyScheduler {
    name: String,
    interval_hours: u32,
    clock: Arc<dyn Clock>,
    seed: Option<u64>,
    generation: u64,
    callback: Option<Callback>,
    fire_lock: Arc<tokio::sync::Mutex<()>>,
    slots: Vec<Slot>,
}

impl RandomDailyScheduler {
    pub fn new(name: impl Into<String>, interval_hours: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            interval_hours: interval_hours.clamp(1, 24),
            clock,
            seed: None,
            generation: 0,
            callback: None,
            fire_lock: Arc::new(tokio::sync::Mutex::new(())),
            slots: Vec::new(),
        }
    }

    /// Deterministic draws (tests).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn window_count(&self) -> usize {
        window_starts(self.interval_hours).len()
    }

    pub fn start(&mut self, callback: Callback) {
        self.callback = Some(callback);
        self.reschedule_all();
    }

    /// Cancel every slot and draw a fresh plan from the current time.
    pub fn reschedule_all(&mut self) {
        self.cancel_all();
        let Some(callback) = self.callback.clone() else {
            tracing::warn!("⚠️ [{}] reschedule requested before start", self.name);
            return;
        };

        self.generation += 1;
        let now = self.clock.now();
        for (index, start_hour) in window_starts(self.interval_hours).into_iter().enumerate() {
            let mut rng = self.rng_for(index as u64);
            let first = first_fire_time(now, start_hour, self.interval_hours, &mut rng);
            let next_fire = Arc::new(Mutex::new(first));

            let task = slot_loop(SlotContext {
                name: self.name.clone(),
                start_hour,
                interval_hours: self.interval_hours,
                clock: self.clock.clone(),
                fire_lock: self.fire_lock.clone(),
                callback: callback.clone(),
                next_fire: next_fire.clone(),
                rng,
            });
            self.slots.push(Slot {
                next_fire,
                handle: ScheduleHandle::spawn(task),
            });
            tracing::debug!(
                "[{}] window {start_hour:02}:00 next at {}",
                self.name,
                first.format("%Y-%m-%d %H:%M")
            );
        }
        tracing::info!(
            "📅 [{}] {} random check-ins armed ({}h windows)",
            self.name,
            self.slots.len(),
            self.interval_hours
        );
    }

    pub fn stop(&mut self) {
        self.cancel_all();
        tracing::debug!("[{}] random timers stopped", self.name);
    }

    /// Number of slots with a live timer task.
    pub fn armed_count(&self) -> usize {
        self.slots.iter().filter(|s| s.handle.is_active()).count()
    }

    /// Planned instants of every armed slot, earliest first.
    pub fn next_fire_times(&self) -> Vec<NaiveDateTime> {
        let mut times: Vec<NaiveDateTime> = self
            .slots
            .iter()
            .filter(|s| s.handle.is_active())
            .map(|s| *s.next_fire.lock().unwrap_or_else(PoisonError::into_inner))
            .collect();
        times.sort();
        times
    }

    fn cancel_all(&mut self) {
        for slot in self.slots.drain(..) {
            slot.handle.cancel();
        }
    }

    fn rng_for(&self, index: u64) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(
                seed.wrapping_add(self.generation.wrapping_mul(1_000))
                    .wrapping_add(index),
            ),
            None => StdRng::from_entropy(),
        }
    }
}

impl Drop for RandomDailyScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

struct SlotContext {
    name: String,
    start_hour: u32,
    interval_hours: u32,
    clock: Arc<dyn Clock>,
    fire_lock: Arc<tokio::sync::Mutex<()>>,
    callback: Callback,
    next_fire: Arc<Mutex<NaiveDateTime>>,
    rng: StdRng,
}

async fn slot_loop(mut ctx: SlotContext) {
    let mut at = *ctx.next_fire.lock().unwrap_or_else(PoisonError::into_inner);
    loop {
        sleep_until(ctx.clock.as_ref(), at).await;
        {
            let _guard = ctx.fire_lock.lock().await;
            tracing::info!(
                "🔔 [{}] random check-in ({:02}:00 window)",
                ctx.name,
                ctx.start_hour
            );
            fire(&ctx.name, &ctx.callback).await;
        }

        at = next_day_fire_time(at, ctx.start_hour, ctx.interval_hours, &mut ctx.rng);
        let now = ctx.clock.now();
        while at < now {
            at = next_day_fire_time(at, ctx.start_hour, ctx.interval_hours, &mut ctx.rng);
        }
        *ctx.next_fire.lock().unwrap_or_else(PoisonError::into_inner) = at;
        tracing::debug!(
            "[{}] window {:02}:00 re-armed for {}",
            ctx.name,
            ctx.start_hour,
            at.format("%Y-%m-%d %H:%M")
        );
    }
}
