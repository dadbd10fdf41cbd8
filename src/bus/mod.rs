// src/bus/mod.rs
//! In-process message bus coordinating the orchestrator and specialist agents.
//!
//! Two independent tables back the bus:
//! - topic -> subscribed handlers (fan-out on publish)
//! - reply topic -> one-shot waiter (request/reply)
//!
//! Bus policy:
//! - A publish first looks for a reply waiter on the target topic. If one is
//!   registered the message is handed to it and never broadcast.
//! - Otherwise every handler of the topic runs on its own task and `publish`
//!   returns once all of them have finished. A failing or panicking handler
//!   is logged and does not affect its siblings.
//! - A waiter is removed exactly once: by the publish that fills it, by its
//!   own timeout, or when it is dropped. A publish removes and fills the
//!   waiter under one lock, so a waiter that finds itself unregistered always
//!   has the message in its channel.
//!
//! Subscriptions are registered while the process is wired up and rarely
//! afterwards. Readers of the subscriber table (`has_subscribers`, the
//! handler lookup in `publish`) hold its read lock only to clone or inspect
//! the handler list, never across an await, so they do not wait on
//! in-flight handlers.

mod message;

pub use message::Message;

use futures::future::{BoxFuture, join_all};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::BusError;

/// A topic subscriber. Returned errors are logged by the bus.
pub type Handler = Arc<dyn Fn(Message) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Outcome of a single [`MessageBus::publish`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Consumed by the reply waiter registered on the target topic
    Reply,
    /// Fanned out to `handlers` subscribers, of which `failed` returned an error or panicked
    Broadcast { handlers: usize, failed: usize },
    /// Nobody was listening
    Dropped,
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<Message>,
    cancel: CancellationToken,
}

type WaiterTable = Arc<Mutex<HashMap<String, Waiter>>>;

/// Topic-addressed publish/subscribe plus one-shot reply futures.
#[derive(Default)]
pub struct MessageBus {
    subscribers: RwLock<HashMap<String, Vec<Handler>>>,
    waiters: WaiterTable,
    next_waiter_id: AtomicU64,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`. Several handlers per topic are allowed;
    /// all of them run on every publish.
    pub fn subscribe<F, Fut>(&self, topic: impl Into<String>, handler: F)
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let topic = topic.into();
        let handler: Handler =
            Arc::new(move |message| -> BoxFuture<'static, anyhow::Result<()>> {
                Box::pin(handler(message))
            });
        let count = {
            let mut subscribers = self.subscribers.write();
            let handlers = subscribers.entry(topic.clone()).or_default();
            handlers.push(handler);
            handlers.len()
        };
        debug!("Subscribed handler #{} to topic '{}'", count, topic);
    }

    /// Synchronous check used to fail fast when no agent listens. Never
    /// waits on handlers running for an in-flight publish.
    pub fn has_subscribers(&self, topic: &str) -> bool {
        self.subscribers
            .read()
            .get(topic)
            .is_some_and(|handlers| !handlers.is_empty())
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers.read().get(topic).map_or(0, Vec::len)
    }

    /// Number of reply waiters currently registered.
    pub fn pending_replies(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Deliver `message`. Reply delivery takes precedence over broadcast.
    ///
    /// Completes only after every handler spawned for this call has finished.
    pub async fn publish(&self, message: Message) -> Result<Delivery, BusError> {
        if message.target_topic.is_empty() {
            return Err(BusError::EmptyTopic);
        }

        debug!(
            "Routing '{}' from '{}' -> '{}'",
            message.task_description, message.sender, message.target_topic
        );

        {
            let mut waiters = self.waiters.lock();
            if let Some(waiter) = waiters.remove(&message.target_topic) {
                let topic = message.target_topic.clone();
                let sent = waiter.tx.send(message);
                drop(waiters);
                return match sent {
                    Ok(()) => Ok(Delivery::Reply),
                    Err(_) => {
                        debug!("Reply waiter on '{}' went away before delivery", topic);
                        Ok(Delivery::Dropped)
                    }
                };
            }
        }

        let handlers = self
            .subscribers
            .read()
            .get(&message.target_topic)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!("No subscribers for topic '{}'", message.target_topic);
            return Ok(Delivery::Dropped);
        }

        let tasks = handlers.iter().map(|handler| {
            let handler = Arc::clone(handler);
            let message = message.clone();
            tokio::spawn(async move { handler(message).await })
        });

        let mut failed = 0;
        for (index, outcome) in join_all(tasks).await.into_iter().enumerate() {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failed += 1;
                    warn!(
                        "Handler #{} on '{}' failed: {:#}",
                        index, message.target_topic, e
                    );
                }
                Err(join_err) => {
                    failed += 1;
                    error!(
                        "Handler #{} on '{}' aborted: {}",
                        index, message.target_topic, join_err
                    );
                }
            }
        }

        Ok(Delivery::Broadcast {
            handlers: handlers.len(),
            failed,
        })
    }

    /// Register a one-shot waiter for `topic` without waiting yet.
    ///
    /// Register before publishing the request: publish is backpressured, so
    /// the answer may arrive before `publish` returns.
    pub fn expect_reply(&self, topic: impl Into<String>) -> Result<PendingReply, BusError> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(BusError::EmptyTopic);
        }

        let (tx, rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut waiters = self.waiters.lock();
            if waiters.contains_key(&topic) {
                return Err(BusError::ReplyAlreadyAwaited { topic });
            }
            waiters.insert(
                topic.clone(),
                Waiter {
                    id,
                    tx,
                    cancel: cancel.clone(),
                },
            );
        }

        Ok(PendingReply {
            id,
            topic,
            rx,
            cancel,
            waiters: Arc::clone(&self.waiters),
            registered_at: Instant::now(),
            settled: false,
        })
    }

    /// Wait for one message on `topic`, failing with [`BusError::Timeout`]
    /// when none arrives within `timeout`.
    pub async fn wait_for_reply(&self, topic: &str, timeout: Duration) -> Result<Message, BusError> {
        self.expect_reply(topic)?.wait(timeout).await
    }

    /// Cancellation signal of the request whose answer is expected on
    /// `reply_topic`. Cancelled when the requester stops waiting.
    ///
    /// Returns a token that never fires when nobody awaits the topic.
    pub fn reply_cancellation(&self, reply_topic: &str) -> CancellationToken {
        self.waiters
            .lock()
            .get(reply_topic)
            .map(|waiter| waiter.cancel.clone())
            .unwrap_or_else(CancellationToken::new)
    }
}

/// A registered reply waiter. Dropping it unregisters the waiter and
/// cancels the associated request.
pub struct PendingReply {
    id: u64,
    topic: String,
    rx: oneshot::Receiver<Message>,
    cancel: CancellationToken,
    waiters: WaiterTable,
    registered_at: Instant,
    settled: bool,
}

impl PendingReply {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Token cancelled when this waiter times out or is dropped unanswered.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn wait(self, timeout: Duration) -> Result<Message, BusError> {
        let deadline = self.registered_at + timeout;
        self.wait_until(deadline).await
    }

    pub async fn wait_until(mut self, deadline: Instant) -> Result<Message, BusError> {
        match tokio::time::timeout_at(deadline, &mut self.rx).await {
            Ok(Ok(message)) => {
                self.settled = true;
                Ok(message)
            }
            Ok(Err(_)) => Err(self.expire(deadline)),
            Err(_) => {
                if self.unregister() {
                    return Err(self.expire(deadline));
                }
                // A publish filled the waiter between the deadline and now.
                match self.rx.try_recv() {
                    Ok(message) => {
                        self.settled = true;
                        Ok(message)
                    }
                    Err(_) => Err(self.expire(deadline)),
                }
            }
        }
    }

    fn expire(&mut self, deadline: Instant) -> BusError {
        self.settled = true;
        self.cancel.cancel();
        BusError::Timeout {
            topic: self.topic.clone(),
            after: deadline.saturating_duration_since(self.registered_at),
        }
    }

    /// Remove our own registration. Returns false when it was already gone.
    fn unregister(&self) -> bool {
        let mut waiters = self.waiters.lock();
        match waiters.get(&self.topic) {
            Some(waiter) if waiter.id == self.id => {
                waiters.remove(&self.topic);
                true
            }
            _ => false,
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if !self.settled {
            self.unregister();
            self.cancel.cancel();
        }
    }
}
