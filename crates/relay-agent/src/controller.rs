//! Conversation controller: binds sessions to remote threads.

use std::sync::Arc;

use relay_ai::{AssistantsApi, ThreadId};
use tokio::sync::broadcast;

use crate::error::Result;
use crate::events::InteractionEvent;
use crate::session::Session;

/// Creates and caches the remote thread behind a session
#[derive(Clone)]
pub struct ConversationController {
    api: Arc<dyn AssistantsApi>,
    event_tx: Option<broadcast::Sender<InteractionEvent>>,
}

impl ConversationController {
    pub fn new(api: Arc<dyn AssistantsApi>) -> Self {
        Self {
            api,
            event_tx: None,
        }
    }

    /// Report thread creation on this channel
    pub fn with_events(mut self, tx: broadcast::Sender<InteractionEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Return the session's thread, creating one on first use
    pub async fn ensure_thread(&self, session: &mut Session) -> Result<ThreadId> {
        if let Some(thread) = session.thread() {
            return Ok(thread.clone());
        }
        self.new_thread(session).await
    }

    /// Start a fresh thread, superseding the current one.
    ///
    /// The old thread is left on the service untouched.
    pub async fn new_thread(&self, session: &mut Session) -> Result<ThreadId> {
        let thread = self.api.create_thread().await?;
        tracing::info!(thread = %thread, "created thread");
        session.bind_thread(thread.clone())?;

        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(InteractionEvent::ThreadCreated {
                thread_id: thread.clone(),
            });
        }
        Ok(thread)
    }
}
