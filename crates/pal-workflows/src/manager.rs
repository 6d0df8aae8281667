//! Randomized status check-ins answered by an AI "manager".

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::NaiveDateTime;
use pal_core::types::{ChannelId, Post};
use pal_scheduler::{RandomDailyScheduler, callback};
use tokio::sync::Mutex;

use crate::collector::{ConversationCollector, Exchange};
use crate::state::{ConversationRecord, MANAGER_KEY, ManagerState, trim_oldest};
use crate::{RunOutcome, WorkflowContext};

pub const FEEDBACK_FALLBACK: &str = "I'm having trouble connecting to my AI services. Let's check in again later, but in the meantime, remember to take breaks when needed and stay focused on your priorities.";
pub const NO_REPLY_NOTICE: &str = "No status update received. I'll check in again later!";

pub fn status_prompt(now: NaiveDateTime) -> Post {
    Post::new(
        "📊 Status Check",
        "Let me know what you're currently working on.",
    )
    .color(0x3498db)
    .timestamp(now)
    .field(
        "Instructions",
        "Please share what you're working on, any challenges you're facing, and how you're feeling about your progress.",
    )
    .footer("Reply to this message with your status update")
}

pub fn feedback_post(feedback: &str, now: NaiveDateTime) -> Post {
    Post::new("💬 Manager Feedback", feedback)
        .color(0x9b59b6)
        .timestamp(now)
        .footer("Respond to stay motivated and accountable")
}

pub fn coach_prompt(status: &str) -> String {
    format!(
        "Act as a supportive team leader and personal productivity coach.\n\
         The user has shared their current status: \"{status}\"\n\n\
         Respond in 3-5 sentences with:\n\
         1. Specific acknowledgment of their work\n\
         2. Motivational encouragement that's genuine (not generic)\n\
         3. One practical suggestion or question to help them improve or move forward\n\
         4. Speak as a supportive leader (not a micromanaging boss)\n\n\
         Keep your tone positive but authentic."
    )
}

pub struct ManagerWorkflow {
    ctx: WorkflowContext,
    channel_id: ChannelId,
    max_conversations: usize,
    state: Mutex<ManagerState>,
    scheduler: StdMutex<RandomDailyScheduler>,
}

impl ManagerWorkflow {
    pub fn new(
        ctx: WorkflowContext,
        channel_id: ChannelId,
        interval_hours: u32,
        max_conversations: usize,
    ) -> Arc<Self> {
        let state: ManagerState = ctx.store.load(MANAGER_KEY);
        tracing::info!(
            "[manager] loaded state: {} past conversations",
            state.conversations.len()
        );
        let scheduler = RandomDailyScheduler::new("manager", interval_hours, ctx.clock.clone());
        Self::with_scheduler(ctx, channel_id, max_conversations, state, scheduler)
    }

    /// Same as [`ManagerWorkflow::new`] with a deterministic check-in plan.
    pub fn with_seed(
        ctx: WorkflowContext,
        channel_id: ChannelId,
        interval_hours: u32,
        max_conversations: usize,
        seed: u64,
    ) -> Arc<Self> {
        let state: ManagerState = ctx.store.load(MANAGER_KEY);
        let scheduler = RandomDailyScheduler::new("manager", interval_hours, ctx.clock.clone())
            .with_seed(seed);
        Self::with_scheduler(ctx, channel_id, max_conversations, state, scheduler)
    }

    fn with_scheduler(
        ctx: WorkflowContext,
        channel_id: ChannelId,
        max_conversations: usize,
        state: ManagerState,
        scheduler: RandomDailyScheduler,
    ) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            channel_id,
            max_conversations,
            state: Mutex::new(state),
            scheduler: StdMutex::new(scheduler),
        })
    }

    fn scheduler(&self) -> std::sync::MutexGuard<'_, RandomDailyScheduler> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm one random check-in per window.
    pub fn arm(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let cb = callback(move || {
            let weak = weak.clone();
            async move {
                if let Some(this) = weak.upgrade() {
                    this.check_status().await;
                }
                Ok(())
            }
        });
        self.scheduler().start(cb);
    }

    /// Throw away today's plan and draw a new one from now.
    pub fn reschedule(&self) {
        self.scheduler().reschedule_all();
    }

    pub fn disarm(&self) {
        self.scheduler().stop();
    }

    pub fn armed_checks(&self) -> usize {
        self.scheduler().armed_count()
    }

    pub fn planned_checks(&self) -> Vec<NaiveDateTime> {
        self.scheduler().next_fire_times()
    }

    pub async fn snapshot(&self) -> ManagerState {
        self.state.lock().await.clone()
    }

    /// Ask for a status update, wait for the reply and answer with feedback.
    pub async fn check_status(&self) -> RunOutcome {
        let mut state = self.state.lock().await;
        let now = self.ctx.clock.now();
        let gateway = self.ctx.gateway.as_ref();

        let mut collector = ConversationCollector::new(gateway, self.ctx.reply_timeout);
        let exchange = match collector.single(self.channel_id, status_prompt(now)).await {
            Ok(exchange) => exchange,
            Err(e) => {
                tracing::warn!(
                    "⚠️ [manager] skipping status check, channel {}: {e}",
                    self.channel_id
                );
                return RunOutcome::Skipped;
            }
        };
        state.last_check_time = Some(now);

        let reply = match exchange {
            Exchange::Answered(reply) => reply,
            Exchange::TimedOut => {
                if let Err(e) = gateway.post(self.channel_id, Post::text(NO_REPLY_NOTICE)).await {
                    tracing::warn!("⚠️ [manager] timeout notice failed, channel {}: {e}", self.channel_id);
                }
                return RunOutcome::TimedOut(0);
            }
        };

        let feedback = match self.ctx.responder.generate(&coach_prompt(&reply.content)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("⚠️ [manager] responder failed, using fallback: {e}");
                FEEDBACK_FALLBACK.to_string()
            }
        };

        state.conversations.push(ConversationRecord {
            timestamp: now,
            user_id: reply.author_id.clone(),
            user_status: reply.content.clone(),
            bot_response: feedback.clone(),
        });
        let dropped = trim_oldest(&mut state.conversations, self.max_conversations);
        if dropped > 0 {
            tracing::debug!("[manager] dropped {dropped} old conversations");
        }

        if let Err(e) = gateway.post(self.channel_id, feedback_post(&feedback, now)).await {
            tracing::warn!("⚠️ [manager] feedback post failed, channel {}: {e}", self.channel_id);
        }
        if let Err(e) = self.ctx.store.save(MANAGER_KEY, &*state) {
            tracing::warn!("⚠️ [manager] failed to save state: {e}");
        }
        tracing::info!("💬 [manager] status from {} recorded", reply.author_name);
        RunOutcome::Collected(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use pal_channels::ScriptedReply;
    use pal_core::traits::Responder;

    #[tokio::test(start_paused = true)]
    async fn test_reply_gets_feedback_and_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway();
        let responder = StaticResponder::new("Nice progress on the parser!");
        let ctx = context(gateway.clone(), responder.clone(), dir.path(), at(17, 10, 0));
        gateway.script_replies(
            STATUS_CHANNEL,
            vec![ScriptedReply::reply("Fixing the tokenizer").after(minutes(12))],
        );

        let workflow = ManagerWorkflow::new(ctx.clone(), STATUS_CHANNEL, 3, 0);
        assert_eq!(workflow.check_status().await, RunOutcome::Collected(1));

        let posts = gateway.posts_in(STATUS_CHANNEL);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title.as_deref(), Some("📊 Status Check"));
        assert_eq!(posts[1].title.as_deref(), Some("💬 Manager Feedback"));
        assert_eq!(posts[1].body, "Nice progress on the parser!");
        assert!(responder.prompts()[0].contains("\"Fixing the tokenizer\""));

        let saved: ManagerState = ctx.store.load(MANAGER_KEY);
        assert_eq!(saved.conversations.len(), 1);
        assert_eq!(saved.conversations[0].user_status, "Fixing the tokenizer");
        assert_eq!(saved.conversations[0].timestamp, at(17, 10, 0));
        assert_eq!(saved.last_check_time, Some(at(17, 10, 0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway();
        let ctx = context(gateway.clone(), StaticResponder::new("-"), dir.path(), at(17, 10, 0));
        gateway.script_replies(STATUS_CHANNEL, vec![ScriptedReply::unrelated("lunch?")]);

        let workflow = ManagerWorkflow::new(ctx.clone(), STATUS_CHANNEL, 3, 0);
        assert_eq!(workflow.check_status().await, RunOutcome::TimedOut(0));

        let posts = gateway.posts_in(STATUS_CHANNEL);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].body, NO_REPLY_NOTICE);
        assert!(workflow.snapshot().await.conversations.is_empty());
        assert!(!ctx.store.path_for(MANAGER_KEY).exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_responder_failure_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway();
        let responder: Arc<dyn Responder> = Arc::new(FailingResponder);
        let ctx = context(gateway.clone(), responder, dir.path(), at(17, 10, 0));
        gateway.script_replies(STATUS_CHANNEL, vec![ScriptedReply::reply("Stuck on CI")]);

        let workflow = ManagerWorkflow::new(ctx, STATUS_CHANNEL, 3, 0);
        assert_eq!(workflow.check_status().await, RunOutcome::Collected(1));

        let posts = gateway.posts_in(STATUS_CHANNEL);
        assert_eq!(posts[1].body, FEEDBACK_FALLBACK);
        assert_eq!(workflow.snapshot().await.conversations[0].bot_response, FEEDBACK_FALLBACK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_cap_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway();
        let ctx = context(gateway.clone(), StaticResponder::new("ok"), dir.path(), at(17, 10, 0));
        let workflow = ManagerWorkflow::new(ctx, STATUS_CHANNEL, 3, 2);
        for status in ["one", "two", "three"] {
            gateway.script_replies(STATUS_CHANNEL, vec![ScriptedReply::reply(status)]);
            workflow.check_status().await;
        }
        let statuses: Vec<String> = workflow
            .snapshot()
            .await
            .conversations
            .into_iter()
            .map(|c| c.user_status)
            .collect();
        assert_eq!(statuses, vec!["two", "three"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_keeps_one_check_per_window() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(gateway(), StaticResponder::new("-"), dir.path(), at(17, 0, 0));

        let workflow = ManagerWorkflow::with_seed(ctx, STATUS_CHANNEL, 3, 0, 11);
        workflow.arm();
        workflow.reschedule();
        workflow.reschedule();
        assert_eq!(workflow.armed_checks(), 8);
        assert_eq!(workflow.planned_checks().len(), 8);

        workflow.disarm();
        assert_eq!(workflow.armed_checks(), 0);
    }
}
