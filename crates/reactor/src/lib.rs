//! Topic-keyed pub/sub fan-out (§4.6): `subscribe`/`unsubscribe`/`post`/
//! `stop` fronting a single dispatcher task that owns every topic's
//! subscriber list, so delivery order within a topic matches post order
//! with no locking on the hot path.

pub mod error;

pub use error::ReactorError;

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

/// Matches the original's fixed-size `eventBufferSize` channel: posts
/// enqueue onto this and never block past its capacity.
const COMMAND_BUFFER: usize = 64;

pub type Payload = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
pub struct Event {
    pub topic: String,
    pub payload: Payload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

enum Command {
    Subscribe { topic: String, sender: mpsc::Sender<Event>, reply: oneshot::Sender<SubscriptionId> },
    Unsubscribe { topic: String, id: SubscriptionId },
    Post { topic: String, payload: Payload },
    Stop { reply: oneshot::Sender<()> },
}

/// Cloneable handle to the bus. Every method enqueues a command on the
/// dispatcher's channel; the dispatcher itself is the only task that ever
/// touches the subscriber lists.
#[derive(Clone)]
pub struct Reactor {
    commands: mpsc::Sender<Command>,
}

impl Reactor {
    pub fn start() -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(dispatch_loop(rx));
        Self { commands: tx }
    }

    pub async fn subscribe(&self, topic: impl Into<String>, sender: mpsc::Sender<Event>) -> Result<SubscriptionId, ReactorError> {
        let (reply, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Subscribe { topic: topic.into(), sender, reply })
            .await
            .map_err(|_| ReactorError::Stopped)?;
        reply_rx.await.map_err(|_| ReactorError::Stopped)
    }

    pub async fn unsubscribe(&self, topic: impl Into<String>, id: SubscriptionId) -> Result<(), ReactorError> {
        self.commands
            .send(Command::Unsubscribe { topic: topic.into(), id })
            .await
            .map_err(|_| ReactorError::Stopped)
    }

    pub async fn post(&self, topic: impl Into<String>, payload: Payload) -> Result<(), ReactorError> {
        self.commands
            .send(Command::Post { topic: topic.into(), payload })
            .await
            .map_err(|_| ReactorError::Stopped)
    }

    /// Drains every command already enqueued (delivering any posts still
    /// in flight) then closes the dispatcher; every subsequent `post`
    /// fails with `ReactorError::Stopped` once the channel is dropped.
    pub async fn stop(&self) -> Result<(), ReactorError> {
        let (reply, reply_rx) = oneshot::channel();
        self.commands.send(Command::Stop { reply }).await.map_err(|_| ReactorError::Stopped)?;
        reply_rx.await.map_err(|_| ReactorError::Stopped)
    }
}

async fn dispatch_loop(mut commands: mpsc::Receiver<Command>) {
    let mut subscribers: HashMap<String, Vec<(SubscriptionId, mpsc::Sender<Event>)>> = HashMap::new();
    let mut next_id = 0u64;

    while let Some(command) = commands.recv().await {
        match command {
            Command::Subscribe { topic, sender, reply } => {
                next_id += 1;
                let id = SubscriptionId(next_id);
                subscribers.entry(topic.clone()).or_default().push((id, sender));
                tracing::debug!(topic = %topic, "new subscription");
                let _ = reply.send(id);
            }
            Command::Unsubscribe { topic, id } => {
                if let Some(subs) = subscribers.get_mut(&topic) {
                    subs.retain(|(sub_id, _)| *sub_id != id);
                }
                tracing::debug!(topic = %topic, "removed subscription");
            }
            Command::Post { topic, payload } => dispatch(&subscribers, &topic, payload),
            Command::Stop { reply } => {
                while let Ok(command) = commands.try_recv() {
                    if let Command::Post { topic, payload } = command {
                        dispatch(&subscribers, &topic, payload);
                    }
                }
                let _ = reply.send(());
                return;
            }
        }
    }
}

fn dispatch(subscribers: &HashMap<String, Vec<(SubscriptionId, mpsc::Sender<Event>)>>, topic: &str, payload: Payload) {
    let Some(subs) = subscribers.get(topic) else { return };
    for (id, sender) in subs {
        let event = Event { topic: topic.to_string(), payload: payload.clone() };
        if sender.try_send(event).is_err() {
            tracing::debug!(topic, subscriber = id.0, "subscriber channel full, dropping event");
        }
    }
}
