//! The interaction loop: submit, run, poll, extract, record.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use relay_ai::{AssistantId, AssistantsApi, FileId, Message, Role, RunId, ThreadId, ThreadMessage};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::controller::ConversationController;
use crate::error::{Error, Result};
use crate::events::InteractionEvent;
use crate::handle::InteractionHandle;
use crate::poll::{PollConfig, wait_for_run};
use crate::session::Session;

/// The recorded outcome of one question
#[derive(Debug, Clone)]
pub struct Reply {
    /// The assistant message appended to history
    pub message: Message,
    /// Run that produced the reply
    pub run_id: RunId,
    /// Image files attached to the reply
    pub charts: Vec<FileId>,
    /// Where charts were written, if an image directory is configured
    pub saved: Vec<PathBuf>,
}

/// Relays user questions to the assistant and records the answers
pub struct Interaction {
    api: Arc<dyn AssistantsApi>,
    assistant_id: AssistantId,
    controller: ConversationController,
    poll: PollConfig,
    event_tx: broadcast::Sender<InteractionEvent>,
    handle: InteractionHandle,
    image_dir: Option<PathBuf>,
}

impl Interaction {
    pub fn new(api: Arc<dyn AssistantsApi>, assistant_id: AssistantId) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let controller = ConversationController::new(api.clone()).with_events(event_tx.clone());
        Self {
            api,
            assistant_id,
            controller,
            poll: PollConfig::default(),
            event_tx,
            handle: InteractionHandle::new(),
            image_dir: None,
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Save charts produced by the code interpreter into `dir`
    pub fn with_image_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.image_dir = dir;
        self
    }

    /// Subscribe to interaction events
    pub fn subscribe(&self) -> broadcast::Receiver<InteractionEvent> {
        self.event_tx.subscribe()
    }

    /// Get a cloneable handle for cancelling from another task
    pub fn handle(&self) -> InteractionHandle {
        self.handle.clone()
    }

    /// Controller sharing this interaction's service and event channel
    pub fn controller(&self) -> &ConversationController {
        &self.controller
    }

    pub fn assistant_id(&self) -> &AssistantId {
        &self.assistant_id
    }

    /// Relay one question and record the reply.
    ///
    /// The user turn is recorded before anything is sent, so it stays in
    /// history even when the interaction fails.
    pub async fn ask(&self, session: &mut Session, prompt: &str) -> Result<Reply> {
        let cancel = self.handle.begin();
        let result = self.turn(session, prompt, &cancel).await;
        self.handle.finish();

        if let Err(ref e) = result {
            let _ = self.event_tx.send(InteractionEvent::Error {
                message: e.to_string(),
            });
        }
        result
    }

    async fn turn(
        &self,
        session: &mut Session,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<Reply> {
        session.push(Message::user(prompt))?;
        let _ = self.event_tx.send(InteractionEvent::Submitted {
            prompt: prompt.to_string(),
        });

        let thread = self.controller.ensure_thread(session).await?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.api.create_message(&thread, Role::User, prompt).await?;
        let run = self.api.create_run(&thread, &self.assistant_id).await?;
        tracing::debug!(thread = %thread, run = %run.id, "started run");
        let _ = self.event_tx.send(InteractionEvent::RunStarted {
            run_id: run.id.clone(),
        });

        let waited = wait_for_run(
            self.api.as_ref(),
            &thread,
            &run.id,
            &self.poll,
            cancel,
            Some(&self.event_tx),
        )
        .await;
        if let Err(ref e) = waited {
            if matches!(e, Error::PollTimeout { .. } | Error::Cancelled) {
                self.cancel_remote(&thread, &run.id).await;
            }
        }
        waited?;

        let messages = self.api.list_messages(&thread).await?;
        let reply = latest_reply(&messages, &run.id).ok_or_else(|| Error::NoReply {
            run_id: run.id.clone(),
        })?;

        let mut text = reply.text();
        let charts: Vec<FileId> = reply.image_files().into_iter().cloned().collect();
        let mut saved = Vec::new();
        if let Some(ref dir) = self.image_dir {
            for file in &charts {
                match self.save_chart(dir, file).await {
                    Ok(path) => {
                        push_line(&mut text, &format!("[chart saved to {}]", path.display()));
                        saved.push(path);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to save chart {}: {}", file, e);
                        push_line(&mut text, &format!("[chart {} could not be saved]", file));
                    }
                }
            }
        }

        if text.trim().is_empty() && charts.is_empty() {
            return Err(Error::NoReply { run_id: run.id });
        }

        let message = Message::assistant(text);
        session.push(message.clone())?;
        let _ = self.event_tx.send(InteractionEvent::Reply {
            message: message.clone(),
        });

        Ok(Reply {
            message,
            run_id: run.id,
            charts,
            saved,
        })
    }

    async fn cancel_remote(&self, thread: &ThreadId, run: &RunId) {
        if let Err(e) = self.api.cancel_run(thread, run).await {
            tracing::warn!("Failed to cancel run {}: {}", run, e);
        }
    }

    async fn save_chart(&self, dir: &Path, file: &FileId) -> Result<PathBuf> {
        let bytes = self.api.file_content(file).await?;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}.png", file));
        tokio::fs::write(&path, bytes).await?;
        let _ = self.event_tx.send(InteractionEvent::ImageSaved { path: path.clone() });
        Ok(path)
    }
}

/// Newest assistant message, preferring one produced by `run`
fn latest_reply<'a>(messages: &'a [ThreadMessage], run: &RunId) -> Option<&'a ThreadMessage> {
    messages
        .iter()
        .find(|m| m.role == Role::Assistant && m.run_id.as_ref() == Some(run))
        .or_else(|| messages.iter().find(|m| m.role == Role::Assistant))
}

fn push_line(text: &mut String, line: &str) {
    if !text.is_empty() {
        text.push_str("\n\n");
    }
    text.push_str(line);
}
