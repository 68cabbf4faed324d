//! Interaction event types

use relay_ai::{Message, RunId, RunStatus, ThreadId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Events emitted while a question is relayed to the assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionEvent {
    /// The user message was recorded and is being sent
    Submitted { prompt: String },

    /// A new remote thread was bound to the session
    ThreadCreated { thread_id: ThreadId },

    /// A run was started for the submitted message
    RunStarted { run_id: RunId },

    /// A poll observed the run's status
    RunStatus {
        run_id: RunId,
        status: RunStatus,
        attempt: u32,
    },

    /// A chart produced by the assistant was written to disk
    ImageSaved { path: PathBuf },

    /// The assistant's reply was recorded
    Reply { message: Message },

    /// The interaction failed
    Error { message: String },
}

impl InteractionEvent {
    /// Check if this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InteractionEvent::Reply { .. } | InteractionEvent::Error { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = InteractionEvent::RunStatus {
            run_id: RunId::new("run_1"),
            status: RunStatus::InProgress,
            attempt: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "run_status");
        assert_eq!(json["status"], "in_progress");
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_reply_and_error_are_terminal() {
        let reply = InteractionEvent::Reply {
            message: Message::assistant("done"),
        };
        let error = InteractionEvent::Error {
            message: "boom".into(),
        };
        assert!(reply.is_terminal());
        assert!(error.is_terminal());
        assert!(!InteractionEvent::ThreadCreated {
            thread_id: ThreadId::new("thread_1")
        }
        .is_terminal());
    }
}
