//! Command/event contract with the external realtime agent platform
//!
//! The platform owns call media, speech recognition, and workflow execution.
//! This module defines the narrow boundary the rest of the crate consumes:
//! two outbound commands (start, stop) and the decoded forms of the five
//! inbound signal kinds.

mod events;

pub use events::{ClientEvent, ConnectionState, ServerMessage, TranscriptRole};

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

/// Kind of session the platform should run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Agent,
    Workflow,
}

/// Outbound start command
#[derive(Clone, Debug)]
pub struct StartRequest {
    pub kind: SessionKind,
    pub id: String,
    /// Opaque variables forwarded to the workflow (user name, ids, tags)
    pub variables: Map<String, Value>,
}

impl StartRequest {
    /// Start a named, externally configured workflow.
    pub fn workflow(id: impl Into<String>) -> Self {
        Self {
            kind: SessionKind::Workflow,
            id: id.into(),
            variables: Map::new(),
        }
    }

    /// Start a standalone agent session.
    #[allow(dead_code)]
    pub fn agent(id: impl Into<String>) -> Self {
        Self {
            kind: SessionKind::Agent,
            id: id.into(),
            variables: Map::new(),
        }
    }

    /// Attach an opaque variable to the request.
    pub fn variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}

/// Errors from the realtime client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection timeout - the platform did not respond within {0} seconds")]
    ConnectionTimeout(u64),

    #[error("Call rejected: {0}")]
    Rejected(String),

    #[error("A call is already in progress")]
    AlreadyStarted,

    #[error("No call in progress")]
    NotConnected,
}

/// The realtime client surface consumed by the session shim.
///
/// `start` and `stop` suspend the caller until the platform resolves or
/// rejects them; signals arrive independently on the subscribed channel.
#[allow(async_fn_in_trait)]
pub trait VoiceClient: Send + Sync + 'static {
    /// Subscribe to decoded client events.
    fn subscribe(&self) -> broadcast::Receiver<ClientEvent>;

    /// Ask the platform to begin a session.
    async fn start(&self, request: StartRequest) -> Result<(), ClientError>;

    /// Ask the platform to tear the current session down.
    async fn stop(&self) -> Result<(), ClientError>;
}
