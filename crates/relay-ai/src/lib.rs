//! relay-ai: Typed access to a hosted assistant service
//!
//! This crate models the thread/run/message abstractions of the OpenAI
//! Assistants API and provides an async client for them. Everything above
//! the wire (sessions, polling policy, persistence) lives in relay-agent.

pub mod error;
pub mod providers;
pub mod types;

pub use error::{Error, Result};
pub use providers::{AssistantsApi, openai::OpenAIAssistants};
pub use types::*;
