//! # ProductivityPal Workflows
//!
//! The three recurring workflows and the bot that wires them together.
//!
//! ```text
//! Bot
//!   ├── ReminderWorkflow     IntervalScheduler     → post reminder, bump count
//!   ├── ManagerWorkflow      RandomDailyScheduler  → status prompt → reply → AI feedback
//!   ├── JobTrackerWorkflow   DailyScheduler        → list prompt → replies… "done" → AI analysis
//!   └── command listener     !remind !status !jobs !diagnose !help !welcome
//! ```
//!
//! Every workflow holds its state behind an async mutex for the whole
//! action, so a manual trigger and a scheduled firing of the same workflow
//! run one after the other.

pub mod bot;
pub mod collector;
pub mod commands;
pub mod diagnostics;
pub mod job_tracker;
pub mod manager;
pub mod reminder;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;
use std::time::Duration;

use pal_core::traits::{ChannelGateway, Responder};
use pal_scheduler::{Clock, StateStore};

pub use bot::Bot;
pub use collector::{CollectionPhase, ConversationCollector};
pub use diagnostics::DiagnosticsReport;
pub use job_tracker::JobTrackerWorkflow;
pub use manager::ManagerWorkflow;
pub use reminder::ReminderWorkflow;

/// Shared services handed to every workflow.
#[derive(Clone)]
pub struct WorkflowContext {
    pub gateway: Arc<dyn ChannelGateway>,
    pub responder: Arc<dyn Responder>,
    pub store: StateStore,
    pub clock: Arc<dyn Clock>,
    /// How long to wait for each reply.
    pub reply_timeout: Duration,
}

/// Result of one workflow action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A post went out and no reply was expected.
    Delivered,
    /// The conversation finished normally with this many records.
    Collected(usize),
    /// The conversation timed out after this many records.
    TimedOut(usize),
    /// The channel was unavailable; nothing happened.
    Skipped,
}
