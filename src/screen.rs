//! Terminal interview screen
//!
//! Renders session snapshots as they change and drives the start/stop
//! interaction: the call starts when the screen runs and ends on Enter or
//! when the platform disconnects.

use crate::client::{StartRequest, VoiceClient};
use crate::session::{CallPhase, InterviewSession, SessionSnapshot};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

/// Interview participant identity, forwarded to the workflow as variables
#[derive(Clone, Debug)]
pub struct Participant {
    pub user_name: String,
    pub user_id: String,
    pub session_type: String,
}

/// What was last put on the terminal, to render only deltas
#[derive(Debug, Default)]
struct Rendered {
    phase: CallPhase,
    speaking: bool,
    utterance_count: usize,
}

/// Run one interview screen to completion.
pub async fn run<C: VoiceClient>(
    session: Arc<InterviewSession<C>>,
    workflow_id: String,
    participant: Participant,
) {
    let mut snapshots = session.watch();
    let mut rendered = Rendered::default();

    println!("AI Interviewer ready. Interviewing {}.", participant.user_name);

    let request = StartRequest::workflow(workflow_id)
        .variable("username", participant.user_name.clone())
        .variable("userId", participant.user_id.clone())
        .variable("type", participant.session_type.clone());

    session.start(request).await;

    let snapshot = session.snapshot();
    print_lines(render_lines(&snapshot, &mut rendered));
    if snapshot.phase != CallPhase::Active {
        println!("Could not start the interview.");
        return;
    }

    println!("Press Enter to end the interview.");

    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stop_requested = false;

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                print_lines(render_lines(&snapshot, &mut rendered));
                if snapshot.phase.is_terminal() {
                    break;
                }
            }
            line = stdin_lines.next_line(), if !stop_requested => {
                if let Err(e) = line {
                    warn!("Failed to read stdin: {}", e);
                }
                stop_requested = true;
                session.stop().await;
            }
        }
    }

    let transcript = session.transcript_text();
    if !transcript.is_empty() {
        println!();
        println!("{}", transcript);
    }
    println!("Interview finished.");
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

/// Diff a snapshot against what is already on screen
fn render_lines(snapshot: &SessionSnapshot, last: &mut Rendered) -> Vec<String> {
    let mut lines = Vec::new();

    if snapshot.phase != last.phase {
        lines.push(format!("[{}]", snapshot.phase));
    }
    if snapshot.utterance_count != last.utterance_count {
        if let Some(utterance) = &snapshot.latest {
            lines.push(format!(
                "{:>9} | {}",
                utterance.role.as_str(),
                utterance.text
            ));
        }
    }
    if snapshot.speaking && !last.speaking {
        lines.push("          | (interviewer is speaking)".to_string());
    }

    last.phase = snapshot.phase;
    last.speaking = snapshot.speaking;
    last.utterance_count = snapshot.utterance_count;
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TranscriptRole;
    use crate::session::Utterance;

    fn snapshot(phase: CallPhase, speaking: bool, latest: Option<(&str, &str)>) -> SessionSnapshot {
        let latest = latest.map(|(role, text)| Utterance {
            role: match role {
                "user" => TranscriptRole::User,
                "system" => TranscriptRole::System,
                _ => TranscriptRole::Assistant,
            },
            text: text.to_string(),
            received_at: chrono::Utc::now(),
        });
        SessionSnapshot {
            phase,
            speaking,
            utterance_count: usize::from(latest.is_some()),
            latest,
        }
    }

    #[test]
    fn test_renders_phase_change_once() {
        let mut last = Rendered::default();
        let active = snapshot(CallPhase::Active, false, None);
        assert_eq!(render_lines(&active, &mut last), vec!["[active]"]);
        assert!(render_lines(&active, &mut last).is_empty());
    }

    #[test]
    fn test_renders_only_the_latest_utterance() {
        let mut last = Rendered::default();
        let with_line = snapshot(CallPhase::Active, false, Some(("assistant", "Hello Jane")));
        let lines = render_lines(&with_line, &mut last);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("assistant"));
        assert!(lines[1].contains("Hello Jane"));
    }

    #[test]
    fn test_speaking_indicator_on_rising_edge_only() {
        let mut last = Rendered::default();
        let speaking = snapshot(CallPhase::Active, true, None);
        let lines = render_lines(&speaking, &mut last);
        assert!(lines.iter().any(|l| l.contains("speaking")));

        // Still speaking: no repeat.
        assert!(render_lines(&speaking, &mut last).is_empty());

        // Stopped speaking: nothing to print either.
        let quiet = snapshot(CallPhase::Active, false, None);
        assert!(render_lines(&quiet, &mut last).is_empty());
    }
}
