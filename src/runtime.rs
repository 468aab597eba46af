//! Runtime for executing conversations
//!
//! Each conversation runs as one task that owns its dialog state, timeline
//! and playback slot. Everything else talks to it through channels.

mod adapters;
mod executor;

#[cfg(test)]
pub mod testing;

pub use adapters::BroadcastSpeech;
pub use executor::{ConversationRuntime, RuntimeSettings};

use crate::completion::CompletionService;
use crate::config::Config;
use crate::state_machine::{DialogState, Event};
use crate::timeline::Message;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;

/// Events buffered per conversation before slow subscribers start lagging
const BROADCAST_CAPACITY: usize = 256;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime = ConversationRuntime<Arc<dyn CompletionService>, BroadcastSpeech>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Conversation not found: {0}")]
    NotFound(String),
    #[error("Conversation closed: {0}")]
    Closed(String),
}

/// Requests handled by a conversation's event loop
#[derive(Debug)]
pub enum Command {
    Dialog(Event),
    ToggleSpeech,
    SpeechFinished,
    Snapshot(oneshot::Sender<Snapshot>),
}

/// Point-in-time view of a conversation
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub conversation_id: String,
    pub state: DialogState,
    pub messages: Vec<Message>,
    pub speaking: bool,
    pub completion_pending: bool,
}

/// Severity shown with a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Danger,
}

/// Transient, dismissible notification for the client to show
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub duration_ms: u64,
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init { snapshot: Snapshot },
    Message { message: Message },
    /// Bot is "typing"
    Composing,
    /// Partial text of the reply being revealed
    Reveal { text: String },
    StateChange { state: DialogState },
    CompletionPending { pending: bool },
    Notification(Notification),
    Speak { text: String },
    StopSpeaking,
    Error { message: String },
}

/// Handle to interact with a running conversation
#[derive(Clone, Debug)]
pub struct ConversationHandle {
    pub id: String,
    pub command_tx: mpsc::Sender<Command>,
    pub broadcast_tx: broadcast::Sender<SseEvent>,
    pub shutdown: CancellationToken,
}

impl ConversationHandle {
    pub async fn send(&self, command: Command) -> Result<(), RuntimeError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| RuntimeError::Closed(self.id.clone()))
    }

    pub async fn snapshot(&self) -> Result<Snapshot, RuntimeError> {
        self.snapshot_source().snapshot().await
    }

    pub fn snapshot_source(&self) -> SnapshotSource {
        SnapshotSource {
            id: self.id.clone(),
            command_tx: self.command_tx.clone(),
        }
    }
}

/// Asks a conversation for snapshots
///
/// Unlike a [`ConversationHandle`] it holds no broadcast sender, so an SSE
/// stream keeping one still ends when the conversation stops.
#[derive(Clone)]
pub struct SnapshotSource {
    id: String,
    command_tx: mpsc::Sender<Command>,
}

impl SnapshotSource {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn snapshot(&self) -> Result<Snapshot, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(Command::Snapshot(tx))
            .await
            .map_err(|_| RuntimeError::Closed(self.id.clone()))?;
        rx.await.map_err(|_| RuntimeError::Closed(self.id.clone()))
    }
}

/// Manager for all conversation runtimes
pub struct RuntimeManager {
    config: Config,
    completion: Arc<dyn CompletionService>,
    runtimes: Arc<RwLock<HashMap<String, ConversationHandle>>>,
}

impl RuntimeManager {
    pub fn new(config: Config, completion: Arc<dyn CompletionService>) -> Self {
        Self {
            config,
            completion,
            runtimes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start a fresh conversation
    pub async fn create(&self) -> ConversationHandle {
        let id = uuid::Uuid::new_v4().to_string();
        let (command_tx, command_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let shutdown = CancellationToken::new();

        let runtime: ProductionRuntime = ConversationRuntime::new(
            RuntimeSettings::from_config(&id, &self.config),
            self.completion.clone(),
            BroadcastSpeech::new(broadcast_tx.clone()),
            command_rx,
            command_tx.clone(),
            broadcast_tx.clone(),
            shutdown.clone(),
        );

        let handle = ConversationHandle {
            id: id.clone(),
            command_tx,
            broadcast_tx,
            shutdown,
        };
        // Registered before the loop starts; the loop's exit removes it
        self.runtimes.write().await.insert(id.clone(), handle.clone());

        let runtimes = Arc::clone(&self.runtimes);
        tokio::spawn(async move {
            runtime.run().await;
            runtimes.write().await.remove(&id);
            tracing::info!(conv_id = %id, "Conversation runtime finished");
        });

        handle
    }

    pub async fn get(&self, conversation_id: &str) -> Result<ConversationHandle, RuntimeError> {
        self.runtimes
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(conversation_id.to_string()))
    }

    /// Send a command to a conversation
    pub async fn send(&self, conversation_id: &str, command: Command) -> Result<(), RuntimeError> {
        self.get(conversation_id).await?.send(command).await
    }

    pub async fn snapshot(&self, conversation_id: &str) -> Result<Snapshot, RuntimeError> {
        self.get(conversation_id).await?.snapshot().await
    }

    /// Subscribe to conversation updates
    pub async fn subscribe(
        &self,
        conversation_id: &str,
    ) -> Result<broadcast::Receiver<SseEvent>, RuntimeError> {
        Ok(self.get(conversation_id).await?.broadcast_tx.subscribe())
    }

    /// Tear a conversation down: pending reveals and completions are dropped
    pub async fn close(&self, conversation_id: &str) -> Result<(), RuntimeError> {
        let handle = self
            .runtimes
            .write()
            .await
            .remove(conversation_id)
            .ok_or_else(|| RuntimeError::NotFound(conversation_id.to_string()))?;
        handle.shutdown.cancel();
        tracing::info!(conv_id = %conversation_id, "Conversation closed");
        Ok(())
    }

    /// Close every conversation (server shutdown)
    pub async fn close_all(&self) {
        let handles: Vec<_> = self.runtimes.write().await.drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.shutdown.cancel();
        }
    }
}
