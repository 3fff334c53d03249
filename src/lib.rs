//! Parley: a conversational agent runtime.
//!
//! Parley normalizes the streaming wire formats of heterogeneous chat
//! backends into one event taxonomy and drives a tool-calling turn loop on
//! top of it. A session owns a conversation, streams assistant output
//! through a [`adapter::ChatAdapter`], assembles fragmented tool calls,
//! executes registered tools, and feeds results back until the model stops
//! asking for tools.
//!
//! # Example
//!
//! ```no_run
//! use parley::prelude::*;
//!
//! # async fn run() -> parley::Result<()> {
//! let config = ParleyConfig::from_env();
//! let backend: Backend = "openai:gpt-4o".parse()?;
//! let adapter = create_adapter(&backend, &config)?;
//!
//! let mut session = AgentSession::new(adapter, "You are a helpful assistant.");
//! let outcome = session.run_turn("What is the capital of France?").await?;
//! println!("{}", outcome.text);
//! # Ok(())
//! # }
//! ```

pub mod accumulator;
pub mod adapter;
pub mod agent;
pub mod config;
pub mod conversation;
pub mod error;
pub mod persistence;
pub mod prelude;
pub mod tools;
pub mod types;

pub use accumulator::ToolCallAccumulator;
pub use adapter::{create_adapter, AdapterRequest, Backend, ChatAdapter, ModelParameters};
pub use agent::{AgentSession, SessionEvent, TurnOutcome, TurnState};
pub use config::ParleyConfig;
pub use conversation::Conversation;
pub use error::{ParleyError, Result};
pub use types::{FinishReason, Message, Role, StreamEvent, ToolCall, ToolCallFragment};
