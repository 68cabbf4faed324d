//! Scripted in-memory assistant service for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_ai::{
    AssistantConfig, AssistantId, AssistantsApi, FileId, MessageContent, MessageId, Result, Role,
    Run, RunError, RunId, RunStatus, TextContent, ThreadId, ThreadMessage,
};
use std::collections::{HashMap, VecDeque};

/// One scripted answer to `get_run`
#[derive(Debug, Clone)]
pub enum Step {
    Status(RunStatus),
    /// A retryable transport failure
    Transient,
}

#[derive(Default)]
struct MockState {
    next_id: u32,
    steps: VecDeque<Step>,
    threads: HashMap<ThreadId, Vec<ThreadMessage>>,
    runs: HashMap<RunId, ThreadId>,
    uploads: Vec<String>,
    assistants: Vec<AssistantConfig>,
    cancelled: Vec<RunId>,
    get_run_calls: u32,
    reply_override: Option<Vec<MessageContent>>,
    skip_reply: bool,
}

/// Mock service: threads and runs live in memory, `get_run` follows a script
/// and then reports `final_status` forever.
pub struct MockApi {
    state: Mutex<MockState>,
    final_status: RunStatus,
}

impl MockApi {
    pub fn new() -> Self {
        Self::with_final_status(RunStatus::Completed)
    }

    pub fn with_final_status(final_status: RunStatus) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            final_status,
        }
    }

    pub fn script(&self, steps: impl IntoIterator<Item = Step>) {
        self.state.lock().steps.extend(steps);
    }

    pub fn reply_with(&self, parts: Vec<MessageContent>) {
        self.state.lock().reply_override = Some(parts);
    }

    pub fn without_reply(&self) {
        self.state.lock().skip_reply = true;
    }

    pub fn threads_created(&self) -> usize {
        self.state.lock().threads.len()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.state.lock().uploads.clone()
    }

    pub fn assistants(&self) -> Vec<AssistantConfig> {
        self.state.lock().assistants.clone()
    }

    pub fn cancelled(&self) -> Vec<RunId> {
        self.state.lock().cancelled.clone()
    }

    pub fn get_run_calls(&self) -> u32 {
        self.state.lock().get_run_calls
    }

    /// Messages on a thread in creation order
    pub fn thread_messages(&self, thread: &ThreadId) -> Vec<ThreadMessage> {
        self.state
            .lock()
            .threads
            .get(thread)
            .cloned()
            .unwrap_or_default()
    }

    fn next_id(state: &mut MockState, prefix: &str) -> String {
        state.next_id += 1;
        format!("{}_{}", prefix, state.next_id)
    }
}

fn text_part(value: impl Into<String>) -> MessageContent {
    MessageContent::Text {
        text: TextContent {
            value: value.into(),
            annotations: vec![],
        },
    }
}

fn run(id: &RunId, thread: &ThreadId, status: RunStatus) -> Run {
    let last_error = (status == RunStatus::Failed).then(|| RunError {
        code: "server_error".to_string(),
        message: "scripted failure".to_string(),
    });
    Run {
        id: id.clone(),
        thread_id: thread.clone(),
        assistant_id: None,
        status,
        last_error,
        incomplete_details: None,
    }
}

#[async_trait]
impl AssistantsApi for MockApi {
    async fn upload_file(&self, file_name: &str, _bytes: Vec<u8>, _purpose: &str) -> Result<FileId> {
        let mut state = self.state.lock();
        state.uploads.push(file_name.to_string());
        Ok(FileId::new(Self::next_id(&mut state, "file")))
    }

    async fn create_assistant(&self, config: &AssistantConfig) -> Result<AssistantId> {
        let mut state = self.state.lock();
        state.assistants.push(config.clone());
        Ok(AssistantId::new(Self::next_id(&mut state, "asst")))
    }

    async fn create_thread(&self) -> Result<ThreadId> {
        let mut state = self.state.lock();
        let id = ThreadId::new(Self::next_id(&mut state, "thread"));
        state.threads.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn create_message(&self, thread: &ThreadId, role: Role, content: &str) -> Result<MessageId> {
        let mut state = self.state.lock();
        let id = MessageId::new(Self::next_id(&mut state, "msg"));
        let message = ThreadMessage {
            id: id.clone(),
            role,
            content: vec![text_part(content)],
            run_id: None,
            created_at: 0,
        };
        state
            .threads
            .get_mut(thread)
            .ok_or_else(|| relay_ai::Error::NotFound(thread.to_string()))?
            .push(message);
        Ok(id)
    }

    async fn create_run(&self, thread: &ThreadId, _assistant: &AssistantId) -> Result<Run> {
        let mut state = self.state.lock();
        let run_id = RunId::new(Self::next_id(&mut state, "run"));
        let messages = state
            .threads
            .get(thread)
            .ok_or_else(|| relay_ai::Error::NotFound(thread.to_string()))?;
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.text())
            .unwrap_or_default();

        if !state.skip_reply {
            let content = state
                .reply_override
                .clone()
                .unwrap_or_else(|| vec![text_part(format!("reply to: {}", last_user))]);
            let reply = ThreadMessage {
                id: MessageId::new(Self::next_id(&mut state, "msg")),
                role: Role::Assistant,
                content,
                run_id: Some(run_id.clone()),
                created_at: 0,
            };
            if let Some(messages) = state.threads.get_mut(thread) {
                messages.push(reply);
            }
        }
        state.runs.insert(run_id.clone(), thread.clone());
        Ok(run(&run_id, thread, RunStatus::Queued))
    }

    async fn get_run(&self, thread: &ThreadId, run_id: &RunId) -> Result<Run> {
        let mut state = self.state.lock();
        state.get_run_calls += 1;
        match state.steps.pop_front() {
            Some(Step::Status(status)) => Ok(run(run_id, thread, status)),
            Some(Step::Transient) => Err(relay_ai::Error::RateLimited { retry_after: None }),
            None => Ok(run(run_id, thread, self.final_status)),
        }
    }

    async fn cancel_run(&self, thread: &ThreadId, run_id: &RunId) -> Result<Run> {
        let mut state = self.state.lock();
        state.cancelled.push(run_id.clone());
        Ok(run(run_id, thread, RunStatus::Cancelling))
    }

    async fn list_messages(&self, thread: &ThreadId) -> Result<Vec<ThreadMessage>> {
        let state = self.state.lock();
        let mut messages = state
            .threads
            .get(thread)
            .cloned()
            .ok_or_else(|| relay_ai::Error::NotFound(thread.to_string()))?;
        messages.reverse();
        Ok(messages)
    }

    async fn file_content(&self, file: &FileId) -> Result<Vec<u8>> {
        Ok(format!("PNG:{}", file).into_bytes())
    }
}
