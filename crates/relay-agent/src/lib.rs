//! relay-agent: session lifecycle for the assistant relay
//!
//! This crate owns the local side of a conversation: the persisted session
//! context, idempotent bootstrap of remote resources, thread management and
//! the bounded submit/run/poll/extract loop.

pub mod bootstrap;
pub mod controller;
pub mod error;
pub mod events;
pub mod handle;
pub mod interaction;
pub mod poll;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use bootstrap::{AssistantSpec, Bootstrapper, Ensured, ResourceManifest, Resources};
pub use controller::ConversationController;
pub use error::{Error, Result};
pub use events::InteractionEvent;
pub use handle::InteractionHandle;
pub use interaction::{Interaction, Reply};
pub use poll::PollConfig;
pub use session::Session;
pub use store::{MemoryStore, SessionStore, StoredSession};
