//! Finalized transcript accumulation

use crate::client::TranscriptRole;
use chrono::{DateTime, Utc};

/// One finalized utterance from the interview
#[derive(Clone, Debug)]
pub struct Utterance {
    pub role: TranscriptRole,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

/// Append-only transcript of finalized utterances, in arrival order.
///
/// Append is the only mutation; entries are never removed or revised, and
/// consecutive identical utterances are both kept.
#[derive(Clone, Debug, Default)]
pub struct TranscriptBuffer {
    entries: Vec<Utterance>,
}

impl TranscriptBuffer {
    /// Append a finalized utterance.
    pub fn push(&mut self, role: TranscriptRole, text: impl Into<String>) {
        self.entries.push(Utterance {
            role,
            text: text.into(),
            received_at: Utc::now(),
        });
    }

    /// The most recent utterance, if any.
    pub fn latest(&self) -> Option<&Utterance> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[allow(dead_code)]
    pub fn entries(&self) -> &[Utterance] {
        &self.entries
    }

    /// The full transcript, one timestamped line per utterance.
    pub fn full_text(&self) -> String {
        self.entries
            .iter()
            .map(|u| {
                format!(
                    "[{}] {}: {}",
                    u.received_at.format("%H:%M:%S"),
                    u.role.as_str(),
                    u.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
