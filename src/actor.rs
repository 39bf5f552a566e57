//! A minimal single-task actor loop.
//!
//! The Balancer's entire state (registry, outstanding probes, flow memory)
//! is owned by exactly one task and mutated only from within [`Actor::handle`]
//! or [`Actor::on_start`] — never shared across tasks — realizing the
//! single-threaded cooperative model: at most one `handle` call is ever in
//! flight, so no locks are needed anywhere in [`crate::balancer`].

use tokio::sync::mpsc;

/// Marker trait for an actor's inbox message type.
pub trait Message: Send + 'static {}

/// An actor owning private state, processing one message at a time.
#[async_trait::async_trait]
pub trait Actor: Send + 'static {
    type Message: Message;

    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Called once before the message loop starts.
    async fn on_start(&mut self, handle: &ActorHandle<Self::Message>) {
        let _ = handle;
    }

    /// Handle one message. Returning `false` stops the actor.
    async fn handle(&mut self, msg: Self::Message, handle: &ActorHandle<Self::Message>) -> bool;
}

/// A cloneable mailbox handle for sending messages into a running actor.
#[derive(Debug)]
pub struct ActorHandle<M: Message> {
    tx: mpsc::UnboundedSender<M>,
}

impl<M: Message> Clone for ActorHandle<M> {
    fn clone(&self) -> Self {
        ActorHandle { tx: self.tx.clone() }
    }
}

impl<M: Message> ActorHandle<M> {
    pub fn send(&self, msg: M) -> Result<(), M> {
        self.tx.send(msg).map_err(|e| e.0)
    }
}

/// Spawn-free actor loop: runs on the current task until the mailbox closes
/// or `handle` asks to stop. Returns the handle the caller should have
/// cloned before calling this (it's also handed to `on_start`/`handle`).
pub async fn run_actor_loop<A: Actor>(mut actor: A, mut rx: mpsc::UnboundedReceiver<A::Message>, handle: ActorHandle<A::Message>) {
    actor.on_start(&handle).await;
    tracing::debug!(actor = actor.name(), "actor started");
    while let Some(msg) = rx.recv().await {
        if !actor.handle(msg, &handle).await {
            break;
        }
    }
    tracing::debug!(actor = actor.name(), "actor stopped");
}

/// Build a connected `(ActorHandle, Receiver)` pair for a new actor.
pub fn mailbox<M: Message>() -> (ActorHandle<M>, mpsc::UnboundedReceiver<M>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ActorHandle { tx }, rx)
}
