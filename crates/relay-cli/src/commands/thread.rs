//! /thread command - show thread, resources and history counts

use super::CommandResult;
use relay_agent::{ResourceManifest, Session};

pub struct ThreadCommand;

impl ThreadCommand {
    pub fn execute(session: &Session, manifest: &ResourceManifest) -> CommandResult {
        CommandResult::Message(describe(session, manifest))
    }
}

/// Human-readable summary of the session and its remote resources
pub fn describe(session: &Session, manifest: &ResourceManifest) -> String {
    let mut output = String::from("Session Info\n");
    output.push_str(&"-".repeat(40));
    output.push('\n');

    let thread = session
        .thread()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "(none yet)".to_string());
    output.push_str(&format!("Thread:     {}\n", thread));

    match manifest.assistant {
        Some(ref assistant) => {
            output.push_str(&format!("Assistant:  {}", assistant.id));
            if let Some(ref name) = assistant.name {
                output.push_str(&format!(" ({})", name));
            }
            output.push('\n');
            if let Some(ref model) = assistant.model {
                output.push_str(&format!("Model:      {}\n", model));
            }
        }
        None => output.push_str("Assistant:  (not created)\n"),
    }

    match manifest.file {
        Some(ref file) => {
            output.push_str(&format!("Dataset:    {}", file.id));
            if let Some(ref source) = file.source {
                output.push_str(&format!(" from {}", source.display()));
            }
            output.push('\n');
        }
        None => output.push_str("Dataset:    (not uploaded)\n"),
    }
    output.push('\n');

    let (user, assistant) = session.counts();
    output.push_str(&format!("Messages:   {} total\n", user + assistant));
    output.push_str(&format!(
        "            {} user, {} assistant\n",
        user, assistant
    ));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_agent::MemoryStore;
    use relay_ai::{AssistantId, FileId, Message, ThreadId};

    #[test]
    fn test_describe_session() {
        let mut session = Session::open(Box::new(MemoryStore::new())).unwrap();
        session.bind_thread(ThreadId::new("thread_9")).unwrap();
        session.push(Message::user("q")).unwrap();
        session.push(Message::assistant("a")).unwrap();
        session.push(Message::user("q2")).unwrap();

        let mut manifest = ResourceManifest::default();
        manifest.seed(Some(FileId::new("file_1")), Some(AssistantId::new("asst_1")));

        let text = describe(&session, &manifest);
        assert!(text.contains("Thread:     thread_9"));
        assert!(text.contains("Assistant:  asst_1"));
        assert!(text.contains("Dataset:    file_1"));
        assert!(text.contains("2 user, 1 assistant"));
    }

    #[test]
    fn test_describe_fresh_session() {
        let session = Session::open(Box::new(MemoryStore::new())).unwrap();
        let text = describe(&session, &ResourceManifest::default());
        assert!(text.contains("(none yet)"));
        assert!(text.contains("(not created)"));
    }
}
