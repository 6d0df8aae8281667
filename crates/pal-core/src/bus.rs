//! Reply bus: fan-out of inbound messages with correlation-id subscriptions.
//!
//! Gateways publish every inbound message here. A workflow waiting on an
//! answer to one of its posts holds a [`ReplySubscription`] that only yields
//! human replies referencing that post. The bus also keeps a short ring of
//! recent messages so a reply that lands between `post` returning and the
//! subscription being created is not lost.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::error::{PalError, Result};
use crate::types::{IncomingMessage, MessageHandle};

const RECENT_CAPACITY: usize = 256;
const BROADCAST_CAPACITY: usize = 256;

/// Shared inbound message bus. Cheap to clone.
#[derive(Clone)]
pub struct ReplyBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    tx: broadcast::Sender<IncomingMessage>,
    recent: Mutex<VecDeque<IncomingMessage>>,
}

impl ReplyBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(BusInner {
                tx,
                recent: Mutex::new(VecDeque::with_capacity(RECENT_CAPACITY)),
            }),
        }
    }

    /// Publish an inbound message to every subscriber.
    pub fn publish(&self, message: IncomingMessage) {
        // Held across the send so subscribe_replies sees each message exactly once.
        let mut recent = self
            .inner
            .recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        recent.push_back(message.clone());
        if recent.len() > RECENT_CAPACITY {
            recent.pop_front();
        }
        // No receivers is fine: nobody is waiting right now.
        let _ = self.inner.tx.send(message);
    }

    /// Subscribe to human replies that reference `handle`.
    pub fn subscribe_replies(&self, handle: &MessageHandle) -> ReplySubscription {
        let recent = self
            .inner
            .recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let rx = self.inner.tx.subscribe();
        let backlog = recent
            .iter()
            .filter(|m| m.answers(handle))
            .cloned()
            .collect();
        drop(recent);

        ReplySubscription {
            handle: handle.clone(),
            rx,
            backlog,
        }
    }

    /// Raw stream of every inbound message (command listener).
    pub fn subscribe_all(&self) -> broadcast::Receiver<IncomingMessage> {
        self.inner.tx.subscribe()
    }
}

impl Default for ReplyBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Replies to one specific message, in arrival order.
pub struct ReplySubscription {
    handle: MessageHandle,
    rx: broadcast::Receiver<IncomingMessage>,
    backlog: VecDeque<IncomingMessage>,
}

impl ReplySubscription {
    /// The message this subscription correlates with.
    pub fn handle(&self) -> &MessageHandle {
        &self.handle
    }

    /// Wait for the next correlated reply, at most `timeout`.
    ///
    /// Uncorrelated traffic does not extend the deadline.
    pub async fn next(&mut self, timeout: Duration) -> Result<IncomingMessage> {
        if let Some(message) = self.backlog.pop_front() {
            return Ok(message);
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Err(_) => return Err(PalError::TimedOut(timeout)),
                Ok(Ok(message)) if message.answers(&self.handle) => return Ok(message),
                Ok(Ok(_)) => continue,
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    tracing::warn!(
                        "⚠️ Reply subscription for message {} lagged, {skipped} messages dropped",
                        self.handle.message_id
                    );
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    return Err(PalError::Channel("reply bus closed".into()));
                }
            }
        }
    }
}
