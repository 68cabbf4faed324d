//! Session context: chat history and the bound remote thread.

use relay_ai::{Message, ThreadId};

use crate::error::Result;
use crate::store::SessionStore;

/// Explicit per-user session context.
///
/// Constructed once per user session and passed to every controller and
/// interaction call. Every mutation goes to the store before memory, so the
/// in-memory view never runs ahead of what a restart would recover.
pub struct Session {
    history: Vec<Message>,
    thread: Option<ThreadId>,
    max_history: Option<usize>,
    store: Box<dyn SessionStore>,
}

impl Session {
    /// Open a session over a store, recovering its persisted state
    pub fn open(mut store: Box<dyn SessionStore>) -> Result<Self> {
        let stored = store.load()?;
        Ok(Self {
            history: stored.messages,
            thread: stored.thread_id,
            max_history: None,
            store,
        })
    }

    /// Bound the number of messages kept in memory
    pub fn with_max_history(mut self, max: Option<usize>) -> Self {
        self.max_history = max;
        self.trim();
        self
    }

    /// Chat history in conversation order
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Thread currently bound to this session
    pub fn thread(&self) -> Option<&ThreadId> {
        self.thread.as_ref()
    }

    /// Append a message and persist it
    pub fn push(&mut self, message: Message) -> Result<()> {
        self.store.append_message(&message)?;
        self.history.push(message);
        self.trim();
        Ok(())
    }

    /// Bind a new thread, superseding the previous one
    pub fn bind_thread(&mut self, thread: ThreadId) -> Result<()> {
        self.store.set_thread(&thread)?;
        if let Some(ref previous) = self.thread {
            tracing::info!(%previous, current = %thread, "thread superseded");
        }
        self.thread = Some(thread);
        Ok(())
    }

    /// Empty the history and persist that
    pub fn clear_history(&mut self) -> Result<()> {
        self.store.clear_history()?;
        self.history.clear();
        Ok(())
    }

    /// Count of (user, assistant) messages
    pub fn counts(&self) -> (usize, usize) {
        let user = self.history.iter().filter(|m| m.is_user()).count();
        (user, self.history.len() - user)
    }

    fn trim(&mut self) {
        if let Some(max) = self.max_history {
            if self.history.len() > max {
                let excess = self.history.len() - max;
                self.history.drain(..excess);
            }
        }
    }
}
