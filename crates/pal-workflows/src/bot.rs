//! The bot: owns the three workflows, routes chat commands and exposes the
//! manual trigger surface used by the CLI.

use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};

use pal_core::config::PalConfig;
use pal_core::error::Result;
use pal_core::traits::{ChannelGateway, Responder};
use pal_core::types::{ChannelId, IncomingMessage, Post};
use pal_scheduler::{Clock, StateStore};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::commands::{BotCommand, help_post, welcome_post};
use crate::diagnostics::{DiagnosticsReport, run_diagnostics};
use crate::{JobTrackerWorkflow, ManagerWorkflow, ReminderWorkflow, RunOutcome, WorkflowContext};

pub struct Bot {
    config: PalConfig,
    ctx: WorkflowContext,
    reminder: Arc<ReminderWorkflow>,
    manager: Arc<ManagerWorkflow>,
    jobs: Arc<JobTrackerWorkflow>,
    listener: StdMutex<Option<JoinHandle<()>>>,
}

impl Bot {
    /// Build all workflows and load their state. Nothing is armed yet.
    pub fn new(
        config: PalConfig,
        gateway: Arc<dyn ChannelGateway>,
        responder: Arc<dyn Responder>,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Self>> {
        let check_time = config.schedule.job_check_time()?;
        let ctx = WorkflowContext {
            gateway,
            responder,
            store: StateStore::new(config.data_dir.clone()),
            clock,
            reply_timeout: config.schedule.reply_timeout(),
        };

        let reminder = ReminderWorkflow::new(
            ctx.clone(),
            config.channels.reminder,
            config.schedule.reminder_interval_hours,
        );
        let manager = ManagerWorkflow::new(
            ctx.clone(),
            config.channels.status,
            config.schedule.status_interval_hours(),
            config.retention.max_conversations,
        );
        let jobs = JobTrackerWorkflow::new(
            ctx.clone(),
            config.channels.jobs,
            check_time,
            config.retention.max_applications,
        );

        Ok(Arc::new(Self {
            config,
            ctx,
            reminder,
            manager,
            jobs,
            listener: StdMutex::new(None),
        }))
    }

    pub fn config(&self) -> &PalConfig {
        &self.config
    }

    pub fn reminder(&self) -> &Arc<ReminderWorkflow> {
        &self.reminder
    }

    pub fn manager(&self) -> &Arc<ManagerWorkflow> {
        &self.manager
    }

    pub fn job_tracker(&self) -> &Arc<JobTrackerWorkflow> {
        &self.jobs
    }

    /// Channel check, welcome messages, timers and the command listener.
    pub async fn start(self: &Arc<Self>) {
        if !self.check_channels().await {
            tracing::warn!(
                "⚠️ Some channels are inaccessible. The bot keeps running, but some features may not work."
            );
        }

        let mut welcomed = 0;
        let labelled = self.config.channels.labelled();
        for (label, channel_id) in &labelled {
            if self.send_welcome(*channel_id).await {
                tracing::info!("👋 Welcome message sent to {label} channel");
                welcomed += 1;
            }
        }
        tracing::info!(
            "Welcome messages sent to {welcomed} out of {} channels",
            labelled.len()
        );

        self.reminder.arm();
        self.manager.arm();
        self.jobs.arm();
        self.spawn_listener();
        tracing::info!("✅ All workflows armed");
    }

    /// `true` when every configured channel is reachable.
    pub async fn check_channels(&self) -> bool {
        let mut all_ok = true;
        for (label, channel_id) in self.config.channels.labelled() {
            if !self.ctx.gateway.is_reachable(channel_id).await {
                tracing::warn!("⚠️ Cannot access {label} channel {channel_id}");
                all_ok = false;
            }
        }
        if all_ok {
            tracing::info!("All channels verified and accessible");
        }
        all_ok
    }

    pub async fn send_welcome(&self, channel_id: ChannelId) -> bool {
        let post = welcome_post(self.ctx.clock.now());
        match self.ctx.gateway.post(channel_id, post).await {
            Ok(_) => true,
            Err(e) if e.is_skip() => {
                tracing::info!("Could not send welcome message to channel {channel_id}: {e}");
                false
            }
            Err(e) => {
                tracing::warn!("⚠️ Error sending welcome message to channel {channel_id}: {e}");
                false
            }
        }
    }

    pub async fn trigger_reminder(&self) -> RunOutcome {
        self.reminder.send_reminder().await
    }

    pub async fn trigger_status_check(&self) -> RunOutcome {
        self.manager.check_status().await
    }

    pub async fn trigger_job_tracker(&self) -> RunOutcome {
        self.jobs.check_applications().await
    }

    pub async fn diagnose(&self) -> DiagnosticsReport {
        run_diagnostics(self.ctx.gateway.as_ref(), &self.config, &self.ctx.store).await
    }

    /// Run `command` on behalf of `message` and answer in its channel.
    pub async fn handle_command(&self, command: BotCommand, message: &IncomingMessage) -> Result<()> {
        let channel_id = message.channel_id;
        tracing::info!(
            "💬 !{} from {} in channel {channel_id}",
            command.name(),
            message.author_name
        );

        match command {
            BotCommand::Remind => {
                self.trigger_reminder().await;
            }
            BotCommand::Status => {
                self.trigger_status_check().await;
            }
            BotCommand::Jobs => {
                self.trigger_job_tracker().await;
            }
            BotCommand::Welcome => {
                self.send_welcome(channel_id).await;
            }
            BotCommand::Help => {
                self.ctx.gateway.post(channel_id, help_post()).await?;
            }
            BotCommand::Diagnose => {
                let report = self.diagnose().await;
                let post = report.to_post(self.ctx.clock.now());
                self.ctx.gateway.post(channel_id, post).await?;
            }
        }

        if let Some(ack) = command.ack() {
            self.ctx.gateway.post(channel_id, Post::text(ack)).await?;
        }
        Ok(())
    }

    /// Listen for commands. Each command runs in its own task, so a long
    /// conversation never blocks the listener.
    pub fn spawn_listener(self: &Arc<Self>) {
        let mut inbox = self.ctx.gateway.subscribe_all();
        let weak: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            loop {
                let message = match inbox.recv().await {
                    Ok(message) => message,
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!("⚠️ Command listener skipped {n} messages");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if message.author_is_bot {
                    continue;
                }
                let Some(command) = BotCommand::parse(&message.content) else {
                    continue;
                };
                let Some(bot) = weak.upgrade() else {
                    break;
                };
                tokio::spawn(async move {
                    if let Err(e) = bot.handle_command(command, &message).await {
                        tracing::warn!(
                            "⚠️ !{} in channel {} failed: {e}",
                            command.name(),
                            message.channel_id
                        );
                    }
                });
            }
            tracing::info!("Command listener stopped");
        });

        let previous = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Disarm every timer and stop listening for commands.
    pub fn shutdown(&self) {
        self.reminder.disarm();
        self.manager.disarm();
        self.jobs.disarm();
        if let Some(listener) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            listener.abort();
        }
        tracing::info!("🛑 ProductivityPal stopped");
    }
}
