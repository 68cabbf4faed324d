//! Session persistence abstraction

use parking_lot::Mutex;
use relay_ai::{Message, ThreadId};
use std::io;
use std::sync::Arc;

/// State recovered from a session store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredSession {
    /// Chat history in conversation order
    pub messages: Vec<Message>,
    /// Remote thread bound to this session, if any
    pub thread_id: Option<ThreadId>,
}

/// Append-oriented storage for one local chat session.
///
/// Implementations persist each mutation as it happens; nobody rewrites the
/// whole history on every turn.
pub trait SessionStore: Send {
    /// Read the persisted state
    fn load(&mut self) -> io::Result<StoredSession>;

    /// Append one message to the history
    fn append_message(&mut self, message: &Message) -> io::Result<()>;

    /// Replace the active thread reference
    fn set_thread(&mut self, thread: &ThreadId) -> io::Result<()>;

    /// Drop all history (the thread reference is kept)
    fn clear_history(&mut self) -> io::Result<()>;
}

/// In-process store. Clones share the same state, which lets tests
/// simulate a restart by opening a second session on a clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoredSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current contents
    pub fn snapshot(&self) -> StoredSession {
        self.state.lock().clone()
    }
}

impl SessionStore for MemoryStore {
    fn load(&mut self) -> io::Result<StoredSession> {
        Ok(self.snapshot())
    }

    fn append_message(&mut self, message: &Message) -> io::Result<()> {
        self.state.lock().messages.push(message.clone());
        Ok(())
    }

    fn set_thread(&mut self, thread: &ThreadId) -> io::Result<()> {
        self.state.lock().thread_id = Some(thread.clone());
        Ok(())
    }

    fn clear_history(&mut self) -> io::Result<()> {
        self.state.lock().messages.clear();
        Ok(())
    }
}
