//! Convenience re-exports for common usage.

pub use crate::accumulator::ToolCallAccumulator;
pub use crate::adapter::{
    create_adapter, AdapterRequest, Backend, BlockAdapter, ChatAdapter, DeltaAdapter, EventStream,
    ModelParameters, ToolSchema,
};
pub use crate::agent::{
    AgentSession, SessionEvent, SessionEventPayload, SessionEventSink, TurnOutcome, TurnState,
};
pub use crate::config::ParleyConfig;
pub use crate::conversation::{Conversation, TransportMessage};
pub use crate::error::{ParleyError, Result};
pub use crate::persistence::{ConversationSink, JsonlSink, MemorySink, NullSink};
pub use crate::tools::{FnTool, ParamKind, ParameterBuilder, Tool, ToolParameters, ToolRegistry};
pub use crate::types::{
    ContentPart, FinishReason, ImageContent, Message, MessageContent, Role, StreamEvent, ToolCall,
    ToolCallFragment,
};
