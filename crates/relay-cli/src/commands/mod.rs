//! Slash commands for interactive mode

mod thread;

pub use thread::ThreadCommand;

use relay_agent::{ConversationController, ResourceManifest, Session};

/// Result of executing a slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Empty the chat history
    ClearHistory,
    /// Start a new remote thread
    NewThread,
    /// Show a message to the user (not sent to the assistant)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(
    input: &str,
    session: &Session,
    manifest: &ResourceManifest,
) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let command = rest.split_whitespace().next().unwrap_or("").to_lowercase();

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "clear" | "c" => CommandResult::ClearHistory,

        "new" | "n" => CommandResult::NewThread,

        "thread" | "t" | "status" => ThreadCommand::execute(session, manifest),

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

/// Empty the history; returns the notice to show
pub fn clear_history(session: &mut Session) -> relay_agent::Result<String> {
    let dropped = session.history().len();
    session.clear_history()?;
    Ok(format!("Cleared {} messages.", dropped))
}

/// Switch to a fresh thread; returns the notice to show
pub async fn new_thread(
    session: &mut Session,
    controller: &ConversationController,
) -> relay_agent::Result<String> {
    let thread = controller.new_thread(session).await?;
    Ok(format!("Started new thread {}.", thread))
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /clear, /c           Clear chat history (Ctrl+L)
  /new, /n             Start a new thread (Ctrl+N)
  /thread, /t          Show thread, resources and message counts
  /quit, /exit, /q     Exit relay

While the assistant is working, Esc or Ctrl+C cancels the run."#
        .to_string()
}
