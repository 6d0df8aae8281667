//! Daily job-application interview: collect a list of applications, ask the
//! responder for an analysis and keep one record per application.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use pal_core::types::{ChannelId, Post};
use pal_scheduler::{DailyScheduler, callback};
use tokio::sync::Mutex;

use crate::collector::ConversationCollector;
use crate::state::{ApplicationRecord, JOB_TRACKER_KEY, JobTrackerState, trim_oldest};
use crate::{RunOutcome, WorkflowContext};

pub const ANALYSIS_FALLBACK: &str = "Great job applying to these positions! Keep tracking your applications and following up when appropriate. Remember that job searching is a numbers game - persistence is key to finding the right opportunity.";

pub fn tracker_prompt(now: NaiveDateTime, date: NaiveDate) -> Post {
    Post::new(
        "💼 Job Application Tracker",
        "Please list all jobs you applied to today.",
    )
    .color(0xe74c3c)
    .timestamp(now)
    .field(
        "Instructions",
        "Reply to this message with each job application on a new line. When you're done, reply with 'done' in a separate message.",
    )
    .field("Format", "Company Name - Position")
    .footer(format!("Date: {}", date.format("%Y-%m-%d")))
}

pub fn closing_notice(timeout_minutes: u64) -> Post {
    Post::text(format!(
        "No response received for {timeout_minutes} minutes. Closing job application tracking for today."
    ))
}

pub fn no_applications_post(now: NaiveDateTime) -> Post {
    Post::new(
        "📝 No Applications Today",
        "No applications recorded today. Remember, consistent application is key to finding opportunities!",
    )
    .color(0xf39c12)
    .timestamp(now)
}

pub fn analysis_post(analysis: &str, jobs: &[String], now: NaiveDateTime) -> Post {
    let mut post = Post::new(format!("📊 Application Analysis ({} jobs)", jobs.len()), analysis)
        .color(0x2ecc71)
        .timestamp(now);
    for (i, job) in jobs.iter().enumerate() {
        post = post.field(format!("Job {}", i + 1), job.as_str());
    }
    post.footer("Keep up the great work on your job search!")
}

pub fn analysis_prompt(jobs: &[String]) -> String {
    format!(
        "As a job search coach, analyze these job applications from today:\n\
         {}\n\n\
         Provide:\n\
         1. A brief analysis of the job types/industries they're targeting\n\
         2. One practical suggestion to improve their application success rate\n\
         3. Positive encouragement about their job search process\n\n\
         Keep it concise (3-4 sentences) and genuinely helpful.",
        jobs.join("\n")
    )
}

pub struct JobTrackerWorkflow {
    ctx: WorkflowContext,
    channel_id: ChannelId,
    max_applications: usize,
    state: Mutex<JobTrackerState>,
    scheduler: StdMutex<DailyScheduler>,
}

impl JobTrackerWorkflow {
    pub fn new(
        ctx: WorkflowContext,
        channel_id: ChannelId,
        check_time: NaiveTime,
        max_applications: usize,
    ) -> Arc<Self> {
        let state: JobTrackerState = ctx.store.load(JOB_TRACKER_KEY);
        tracing::info!(
            "[jobs] loaded state: {} applications tracked",
            state.applications.len()
        );
        let scheduler = DailyScheduler::new("jobs", check_time, ctx.clock.clone());
        Arc::new(Self {
            ctx,
            channel_id,
            max_applications,
            state: Mutex::new(state),
            scheduler: StdMutex::new(scheduler),
        })
    }

    fn scheduler(&self) -> std::sync::MutexGuard<'_, DailyScheduler> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn arm(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let cb = callback(move || {
            let weak = weak.clone();
            async move {
                if let Some(this) = weak.upgrade() {
                    this.check_applications().await;
                }
                Ok(())
            }
        });
        self.scheduler().start(cb);
    }

    pub fn disarm(&self) {
        self.scheduler().stop();
    }

    pub fn next_check(&self) -> Option<NaiveDateTime> {
        self.scheduler().next_fire()
    }

    pub async fn snapshot(&self) -> JobTrackerState {
        self.state.lock().await.clone()
    }

    /// Run the interview. State is saved whenever the prompt went out,
    /// whatever the outcome.
    pub async fn check_applications(&self) -> RunOutcome {
        let mut state = self.state.lock().await;
        let now = self.ctx.clock.now();
        let today = now.date();
        let gateway = self.ctx.gateway.as_ref();

        let mut collector = ConversationCollector::new(gateway, self.ctx.reply_timeout);
        let collected = match collector
            .list(self.channel_id, tracker_prompt(now, today))
            .await
        {
            Ok(collected) => collected,
            Err(e) => {
                tracing::warn!(
                    "⚠️ [jobs] skipping application check, channel {}: {e}",
                    self.channel_id
                );
                return RunOutcome::Skipped;
            }
        };
        state.last_check_date = Some(today);

        if collected.timed_out {
            let minutes = self.ctx.reply_timeout.as_secs() / 60;
            if let Err(e) = gateway.post(self.channel_id, closing_notice(minutes)).await {
                tracing::warn!("⚠️ [jobs] closing notice failed, channel {}: {e}", self.channel_id);
            }
        }

        let jobs = collected.items;
        let summary = if jobs.is_empty() {
            no_applications_post(now)
        } else {
            state
                .applications
                .extend(jobs.iter().map(|job| ApplicationRecord::applied(job.as_str(), today)));
            let dropped = trim_oldest(&mut state.applications, self.max_applications);
            if dropped > 0 {
                tracing::debug!("[jobs] dropped {dropped} old applications");
            }

            let analysis = match self.ctx.responder.generate(&analysis_prompt(&jobs)).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("⚠️ [jobs] responder failed, using fallback: {e}");
                    ANALYSIS_FALLBACK.to_string()
                }
            };
            analysis_post(&analysis, &jobs, now)
        };
        if let Err(e) = gateway.post(self.channel_id, summary).await {
            tracing::warn!("⚠️ [jobs] summary post failed, channel {}: {e}", self.channel_id);
        }

        if let Err(e) = self.ctx.store.save(JOB_TRACKER_KEY, &*state) {
            tracing::warn!("⚠️ [jobs] failed to save state: {e}");
        }
        tracing::info!("💼 [jobs] {} applications recorded for {today}", jobs.len());

        if collected.timed_out {
            RunOutcome::TimedOut(jobs.len())
        } else {
            RunOutcome::Collected(jobs.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ApplicationStatus;
    use crate::test_support::*;
    use pal_channels::ScriptedReply;
    use pal_core::traits::Responder;
    use std::time::Duration;

    fn eight_pm() -> NaiveTime {
        NaiveTime::from_hms_opt(20, 0, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_jobs_then_done() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway();
        let responder = StaticResponder::new("Solid mix of backend roles.");
        let ctx = context(gateway.clone(), responder.clone(), dir.path(), at(17, 20, 0));
        gateway.script_replies(
            JOB_CHANNEL,
            vec![
                ScriptedReply::reply("Acme - Backend Engineer"),
                ScriptedReply::reply("Globex - SRE").after(minutes(3)),
                ScriptedReply::reply("done").after(minutes(1)),
            ],
        );

        let workflow = JobTrackerWorkflow::new(ctx.clone(), JOB_CHANNEL, eight_pm(), 0);
        assert_eq!(workflow.check_applications().await, RunOutcome::Collected(2));

        let posts = gateway.posts_in(JOB_CHANNEL);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].footer.as_deref(), Some("Date: 2026-10-17"));
        assert_eq!(posts[1].title.as_deref(), Some("📊 Application Analysis (2 jobs)"));
        assert_eq!(posts[1].field_value("Job 2"), Some("Globex - SRE"));
        assert!(responder.prompts()[0].contains("Acme - Backend Engineer\nGlobex - SRE"));
        assert_eq!(gateway.reactions().len(), 2);

        let saved: JobTrackerState = ctx.store.load(JOB_TRACKER_KEY);
        assert_eq!(saved.applications.len(), 2);
        assert_eq!(saved.applications[0].company, "Acme - Backend Engineer");
        assert_eq!(saved.applications[0].date, "2026-10-17");
        assert_eq!(saved.applications[0].status, ApplicationStatus::Applied);
        assert_eq!(saved.last_check_date, Some(at(17, 0, 0).date()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_only_reports_no_applications() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway();
        let responder = StaticResponder::new("-");
        let ctx = context(gateway.clone(), responder.clone(), dir.path(), at(17, 20, 0));
        gateway.script_replies(JOB_CHANNEL, vec![ScriptedReply::reply("Done")]);

        let workflow = JobTrackerWorkflow::new(ctx.clone(), JOB_CHANNEL, eight_pm(), 0);
        assert_eq!(workflow.check_applications().await, RunOutcome::Collected(0));

        let posts = gateway.posts_in(JOB_CHANNEL);
        assert_eq!(posts[1].title.as_deref(), Some("📝 No Applications Today"));
        assert!(responder.prompts().is_empty());

        // Still persisted: the check itself happened.
        let saved: JobTrackerState = ctx.store.load(JOB_TRACKER_KEY);
        assert!(saved.applications.is_empty());
        assert!(saved.last_check_date.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_partial_batch() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway();
        let responder: Arc<dyn Responder> = Arc::new(FailingResponder);
        let ctx = context(gateway.clone(), responder, dir.path(), at(17, 20, 0));
        gateway.script_replies(JOB_CHANNEL, vec![ScriptedReply::reply("A")]);

        let workflow = JobTrackerWorkflow::new(ctx, JOB_CHANNEL, eight_pm(), 0);
        assert_eq!(workflow.check_applications().await, RunOutcome::TimedOut(1));

        let posts = gateway.posts_in(JOB_CHANNEL);
        assert_eq!(posts.len(), 3);
        assert!(posts[1].body.starts_with("No response received for 30 minutes."));
        assert_eq!(posts[2].body, ANALYSIS_FALLBACK);
        assert_eq!(posts[2].field_value("Job 1"), Some("A"));
        assert_eq!(workflow.snapshot().await.applications.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrelated_messages_do_not_count() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway();
        let ctx = context(gateway.clone(), StaticResponder::new("ok"), dir.path(), at(17, 20, 0));
        gateway.script_replies(
            JOB_CHANNEL,
            vec![
                ScriptedReply::unrelated("Initech - QA"),
                ScriptedReply::unrelated("done"),
                ScriptedReply::reply("Hooli - PM").after(minutes(2)),
                ScriptedReply::reply("end").after(minutes(2)),
            ],
        );

        let workflow = JobTrackerWorkflow::new(ctx, JOB_CHANNEL, eight_pm(), 0);
        assert_eq!(workflow.check_applications().await, RunOutcome::Collected(1));
        let companies: Vec<String> = workflow
            .snapshot()
            .await
            .applications
            .into_iter()
            .map(|a| a.company)
            .collect();
        assert_eq!(companies, vec!["Hooli - PM"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_runs_are_serialised() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway();
        let ctx = context(gateway.clone(), StaticResponder::new("ok"), dir.path(), at(17, 20, 0));
        gateway.script_replies(
            JOB_CHANNEL,
            vec![
                ScriptedReply::reply("First Co - Dev").after(minutes(5)),
                ScriptedReply::reply("done").after(minutes(5)),
            ],
        );
        gateway.script_replies(
            JOB_CHANNEL,
            vec![ScriptedReply::from_bot("ignored")],
        );
        gateway.script_replies(
            JOB_CHANNEL,
            vec![
                ScriptedReply::reply("Second Co - Dev").after(minutes(5)),
                ScriptedReply::reply("done").after(minutes(5)),
            ],
        );

        let workflow = JobTrackerWorkflow::new(ctx.clone(), JOB_CHANNEL, eight_pm(), 0);
        let (a, b) = tokio::join!(workflow.check_applications(), workflow.check_applications());
        assert_eq!(a, RunOutcome::Collected(1));
        assert_eq!(b, RunOutcome::Collected(1));

        // prompt, analysis, prompt, analysis: never two prompts in a row.
        let titles: Vec<String> = gateway
            .posts_in(JOB_CHANNEL)
            .into_iter()
            .filter_map(|p| p.title)
            .collect();
        assert_eq!(titles.len(), 4);
        assert!(titles[0].starts_with("💼"));
        assert!(titles[1].starts_with("📊"));
        assert!(titles[2].starts_with("💼"));
        assert!(titles[3].starts_with("📊"));

        let saved: JobTrackerState = ctx.store.load(JOB_TRACKER_KEY);
        assert_eq!(saved.applications.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_check_runs_at_configured_time() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway();
        let ctx = context(gateway.clone(), StaticResponder::new("ok"), dir.path(), at(17, 19, 0));
        gateway.script_replies(JOB_CHANNEL, vec![ScriptedReply::reply("done")]);

        let workflow = JobTrackerWorkflow::new(ctx, JOB_CHANNEL, eight_pm(), 0);
        workflow.arm();
        assert_eq!(workflow.next_check(), Some(at(17, 20, 0)));

        tokio::time::sleep(Duration::from_secs(59 * 60)).await;
        assert!(gateway.posts_in(JOB_CHANNEL).is_empty());

        tokio::time::sleep(Duration::from_secs(2 * 60)).await;
        assert_eq!(gateway.posts_in(JOB_CHANNEL).len(), 2);
        assert_eq!(workflow.next_check(), Some(at(18, 20, 0)));
        workflow.disarm();
    }
}
