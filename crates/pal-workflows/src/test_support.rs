//! Shared fixtures for workflow tests.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use pal_channels::MemoryGateway;
use pal_core::error::{PalError, Result};
use pal_core::traits::Responder;
use pal_scheduler::{StateStore, TokioClock};

use crate::WorkflowContext;

pub const REMINDER_CHANNEL: u64 = 10;
pub const STATUS_CHANNEL: u64 = 20;
pub const JOB_CHANNEL: u64 = 30;
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// 2026-10-17 is a Saturday.
pub fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

/// Answers every prompt with a fixed text and remembers the prompts.
pub struct StaticResponder {
    reply: String,
    pub prompts: Mutex<Vec<String>>,
}

impl StaticResponder {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Responder for StaticResponder {
    fn name(&self) -> &str {
        "static"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

/// Always fails like an upstream outage.
pub struct FailingResponder;

#[async_trait]
impl Responder for FailingResponder {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(PalError::Service("quota exceeded".into()))
    }
}

pub fn gateway() -> Arc<MemoryGateway> {
    Arc::new(MemoryGateway::new([REMINDER_CHANNEL, STATUS_CHANNEL, JOB_CHANNEL]))
}

pub fn context(
    gateway: Arc<MemoryGateway>,
    responder: Arc<dyn Responder>,
    dir: &Path,
    now: NaiveDateTime,
) -> WorkflowContext {
    WorkflowContext {
        gateway,
        responder,
        store: StateStore::new(dir),
        clock: Arc::new(TokioClock::starting_at(now)),
        reply_timeout: REPLY_TIMEOUT,
    }
}
