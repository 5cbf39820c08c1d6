//! Wire message types for the realtime signaling channel
//!
//! Commands are tagged by `type`, inbound frames by `event`. Frames this
//! crate does not recognize decode to `Other` and are dropped by the
//! receive task.

use crate::client::{SessionKind, StartRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Commands sent to the platform
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub(crate) enum ClientCommand {
    /// Begin a call for the described agent or workflow
    #[serde(rename = "call.start")]
    CallStart { call: CallDescriptor },
    /// Tear the current call down
    #[serde(rename = "call.stop")]
    CallStop,
}

/// What the platform should run
#[derive(Debug, Serialize)]
pub(crate) struct CallDescriptor {
    #[serde(rename = "type")]
    pub(crate) kind: SessionKind,
    pub(crate) id: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub(crate) variables: Map<String, Value>,
}

impl From<StartRequest> for CallDescriptor {
    fn from(request: StartRequest) -> Self {
        Self {
            kind: request.kind,
            id: request.id,
            variables: request.variables,
        }
    }
}

/// Frames received from the platform
#[derive(Debug, Deserialize)]
#[serde(tag = "event")]
pub(crate) enum ServerFrame {
    /// The platform accepted a start command
    #[serde(rename = "call.accepted")]
    CallAccepted,
    /// The platform refused a start command
    #[serde(rename = "call.rejected")]
    CallRejected {
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(rename = "state-change")]
    StateChange { state: String },
    #[serde(rename = "message")]
    Message { message: Value },
    #[serde(rename = "speech-start")]
    SpeechStart,
    #[serde(rename = "speech-end")]
    SpeechEnd,
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: Value,
    },
    /// Catch-all for frames this crate does not act on
    #[serde(other)]
    Other,
}
