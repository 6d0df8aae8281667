//! Timer handles and the callback type shared by all schedulers.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use pal_core::Result;
use tokio::task::JoinHandle;

/// Work performed on each firing.
pub type Callback = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Wrap an async closure as a [`Callback`].
pub fn callback<F, Fut>(f: F) -> Callback
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// A cancellable in-memory timer task. Dropping the handle cancels it.
#[derive(Debug)]
pub struct ScheduleHandle {
    task: JoinHandle<()>,
}

impl ScheduleHandle {
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            task: tokio::spawn(future),
        }
    }

    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Run one firing of `callback` on its own task and wait for it.
///
/// The callback is detached from the timer task, so cancelling the timer
/// lets an in-flight firing finish. Errors and panics are logged only.
pub(crate) async fn fire(name: &str, callback: &Callback) {
    match tokio::spawn(callback()).await {
        Ok(Ok(())) => tracing::debug!("[{name}] firing finished"),
        Ok(Err(e)) => tracing::warn!("⚠️ [{name}] firing failed: {e}"),
        Err(e) if e.is_panic() => tracing::error!("❌ [{name}] firing panicked"),
        Err(_) => tracing::debug!("[{name}] firing cancelled"),
    }
}
