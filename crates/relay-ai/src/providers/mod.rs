//! Assistant service implementations

pub mod openai;

use crate::{
    AssistantConfig, AssistantId, Error, FileId, MessageId, Result, Role, Run, RunId,
    ThreadId, ThreadMessage,
};
use async_trait::async_trait;

/// Purpose tag attached to uploaded files
pub const ASSISTANTS_PURPOSE: &str = "assistants";

/// The operations consumed from a hosted assistant service
#[async_trait]
pub trait AssistantsApi: Send + Sync {
    /// Upload a file and return its identifier
    async fn upload_file(&self, file_name: &str, bytes: Vec<u8>, purpose: &str)
    -> Result<FileId>;

    /// Create an assistant
    async fn create_assistant(&self, config: &AssistantConfig) -> Result<AssistantId>;

    /// Create an empty conversation thread
    async fn create_thread(&self) -> Result<ThreadId>;

    /// Add a message to a thread
    async fn create_message(&self, thread: &ThreadId, role: Role, content: &str)
    -> Result<MessageId>;

    /// Start a run of an assistant over a thread
    async fn create_run(&self, thread: &ThreadId, assistant: &AssistantId) -> Result<Run>;

    /// Fetch the current state of a run
    async fn get_run(&self, thread: &ThreadId, run: &RunId) -> Result<Run>;

    /// Ask the service to cancel a run
    async fn cancel_run(&self, thread: &ThreadId, run: &RunId) -> Result<Run>;

    /// List messages on a thread, newest first
    async fn list_messages(&self, thread: &ThreadId) -> Result<Vec<ThreadMessage>>;

    /// Download the raw content of a file
    async fn file_content(&self, file: &FileId) -> Result<Vec<u8>>;
}

/// Get an API key from a provided value or the environment
pub fn get_api_key(provided: Option<&str>, env_var: &str) -> Result<String> {
    if let Some(key) = provided.filter(|k| !k.trim().is_empty()) {
        return Ok(key.to_string());
    }

    std::env::var(env_var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or(Error::InvalidApiKey)
}
