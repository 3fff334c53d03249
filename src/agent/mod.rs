//! Agent orchestration: the turn loop and its observable event stream.

pub mod events;
pub mod session;

pub use events::{SessionEvent, SessionEventPayload, SessionEventSink};
pub use session::{AgentSession, TurnOutcome, TurnState};
