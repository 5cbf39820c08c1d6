//! Decoded forms of the platform's inbound signals
//!
//! The platform emits opaque payloads; everything here narrows them into
//! tagged variants with a safe catch-all so an unrecognized shape can never
//! reach the session shim as anything but a no-op.

use serde::Deserialize;

/// A decoded event from the realtime client
#[derive(Clone, Debug)]
pub enum ClientEvent {
    /// Connection lifecycle signal
    StateChange(ConnectionState),
    /// In-call message (transcripts, tool traffic)
    Message(ServerMessage),
    /// The interviewer started speaking
    SpeechStart,
    /// The interviewer stopped speaking
    SpeechEnd,
    /// Runtime error reported by the platform; payload is kept opaque
    Error(serde_json::Value),
}

/// Connection state carried by a `state-change` signal
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    /// Any state string this crate does not act on
    Other(String),
}

impl From<&str> for ConnectionState {
    fn from(state: &str) -> Self {
        match state {
            "connected" => ConnectionState::Connected,
            "disconnected" => ConnectionState::Disconnected,
            other => ConnectionState::Other(other.to_string()),
        }
    }
}

/// In-call messages from the platform
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Speech-to-text result for one utterance
    #[serde(rename = "transcript")]
    Transcript {
        role: TranscriptRole,
        #[serde(rename = "transcriptType")]
        stage: TranscriptStage,
        transcript: String,
    },
    /// Tool invocation requested by the workflow
    #[serde(rename = "function-call")]
    FunctionCall {
        #[serde(rename = "functionCall")]
        #[allow(dead_code)]
        call: FunctionCall,
    },
    /// Result of a tool invocation
    #[serde(rename = "function-call-result")]
    FunctionCallResult {
        #[serde(rename = "functionCallResult")]
        #[allow(dead_code)]
        result: FunctionCallResult,
    },
    /// Catch-all for message types this crate does not act on
    #[serde(other)]
    Other,
}

/// Tool invocation payload
#[derive(Clone, Debug, Deserialize)]
pub struct FunctionCall {
    #[allow(dead_code)]
    pub name: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub parameters: serde_json::Value,
}

/// Tool invocation result payload
#[derive(Clone, Debug, Deserialize)]
pub struct FunctionCallResult {
    #[serde(default)]
    #[allow(dead_code)]
    pub result: serde_json::Value,
}

/// Who an utterance belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    User,
    System,
    Assistant,
}

impl TranscriptRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptRole::User => "user",
            TranscriptRole::System => "system",
            TranscriptRole::Assistant => "assistant",
        }
    }
}

/// Whether a transcript is still subject to revision
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptStage {
    Partial,
    Final,
}

impl ServerMessage {
    /// Narrow this message to a finalized transcript if it is one.
    ///
    /// Partial transcripts and tool traffic return `None`.
    pub fn final_transcript(&self) -> Option<(TranscriptRole, &str)> {
        match self {
            ServerMessage::Transcript {
                role,
                stage: TranscriptStage::Final,
                transcript,
            } => Some((*role, transcript.as_str())),
            _ => None,
        }
    }
}
