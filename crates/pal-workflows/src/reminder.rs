//! Fixed-interval productivity reminders.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use pal_core::types::{ChannelId, Post};
use pal_scheduler::{IntervalScheduler, callback};
use tokio::sync::Mutex;

use crate::state::{REMINDER_KEY, ReminderState};
use crate::{RunOutcome, WorkflowContext};

const REMINDER_COLOR: u32 = 0x00ff00;

/// `morning` 5–12, `afternoon` 12–17, `evening` 17–21, `night` otherwise.
pub fn time_of_day(hour: u32) -> &'static str {
    match hour {
        5..=11 => "morning",
        12..=16 => "afternoon",
        17..=20 => "evening",
        _ => "night",
    }
}

pub fn is_weekend(at: NaiveDateTime) -> bool {
    matches!(at.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The reminder post for reminder number `count` at local time `now`.
pub fn build_reminder(now: NaiveDateTime, count: u64) -> Post {
    let tod = time_of_day(now.hour());
    let mut post = Post::new(
        format!("Productivity Reminder ({tod})"),
        format!("Here's your {tod} reminder to stay on track!"),
    )
    .color(REMINDER_COLOR)
    .timestamp(now)
    .field("🧩 DSA Questions", "Complete 14 DSA questions");
    if is_weekend(now) {
        post = post.field("💻 OS Concepts (Weekend Special)", "Study 2 OS concepts");
    }
    post.field("🚀 Personal Projects", "Work on your personal projects")
        .field("💼 Office Projects", "Make progress on office assignments")
        .footer(format!("Reminder #{count}"))
}

pub struct ReminderWorkflow {
    ctx: WorkflowContext,
    channel_id: ChannelId,
    state: Mutex<ReminderState>,
    scheduler: StdMutex<IntervalScheduler>,
}

impl ReminderWorkflow {
    pub fn new(ctx: WorkflowContext, channel_id: ChannelId, interval_hours: u32) -> Arc<Self> {
        let state: ReminderState = ctx.store.load(REMINDER_KEY);
        tracing::info!(
            "[reminder] loaded state: {} reminders sent so far",
            state.reminder_count
        );
        Arc::new(Self {
            ctx,
            channel_id,
            state: Mutex::new(state),
            scheduler: StdMutex::new(IntervalScheduler::new("reminder", interval_hours)),
        })
    }

    /// Start the interval timer. The timer holds only a weak reference.
    pub fn arm(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let cb = callback(move || {
            let weak = weak.clone();
            async move {
                if let Some(this) = weak.upgrade() {
                    this.send_reminder().await;
                }
                Ok(())
            }
        });
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .start(cb);
    }

    pub fn disarm(&self) {
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop();
    }

    pub fn is_armed(&self) -> bool {
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_running()
    }

    pub async fn snapshot(&self) -> ReminderState {
        self.state.lock().await.clone()
    }

    /// Post one reminder. The count only advances when the post went out.
    pub async fn send_reminder(&self) -> RunOutcome {
        let mut state = self.state.lock().await;
        let now = self.ctx.clock.now();
        let count = state.reminder_count + 1;

        match self
            .ctx
            .gateway
            .post(self.channel_id, build_reminder(now, count))
            .await
        {
            Ok(_) => {
                state.reminder_count = count;
                state.last_remind_time = Some(now);
                tracing::info!("🔔 [reminder] #{count} sent to channel {}", self.channel_id);
                if let Err(e) = self.ctx.store.save(REMINDER_KEY, &*state) {
                    tracing::warn!("⚠️ [reminder] failed to save state: {e}");
                }
                RunOutcome::Delivered
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ [reminder] skipping cycle, channel {}: {e}",
                    self.channel_id
                );
                RunOutcome::Skipped
            }
        }
    }
}
