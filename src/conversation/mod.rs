//! Append-only conversation state and its transport projection.

use serde::Serialize;

use crate::types::{ContentPart, Message, MessageContent, Role, ToolCall};

/// The ordered, role-tagged message log for one session.
///
/// Created once per session with the system prompt; mutated only by
/// appending. Owned by exactly one `AgentSession`.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    system_prompt: String,
}

/// A wire-ready projection of one message. Reasoning is stripped since
/// providers reject unknown fields on replay.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransportMessage {
    pub role: Role,
    pub content: Option<MessageContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Conversation {
    /// Create a conversation holding only the system message.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            messages: vec![Message::system(system_prompt.clone())],
            system_prompt,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recently appended message (for incremental persistence).
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Append a plain-text user message.
    pub fn append_user(&mut self, text: impl Into<String>) {
        self.append(Message::user(text));
    }

    /// Append a multimodal user message.
    pub fn append_user_parts(&mut self, parts: Vec<ContentPart>) {
        self.append(Message::user_parts(parts));
    }

    /// Append an assistant message after a streaming round completes.
    ///
    /// Empty strings and empty lists are normalized so that content is
    /// `None` exactly when the round produced only tool calls. A round with
    /// neither text nor calls (reasoning-only, or a bare finish) keeps
    /// empty-string content; replay must never send a null-content
    /// assistant message without tool calls.
    pub fn append_assistant(
        &mut self,
        content: Option<String>,
        reasoning: Option<String>,
        tool_calls: Option<Vec<ToolCall>>,
    ) {
        let mut content = content.filter(|c| !c.is_empty());
        let reasoning = reasoning.filter(|r| !r.is_empty());
        let tool_calls = tool_calls.filter(|t| !t.is_empty());
        if content.is_none() && tool_calls.is_none() {
            content = Some(String::new());
        }
        self.append(Message::assistant(content, reasoning, tool_calls));
    }

    /// Append a tool result message.
    pub fn append_tool(&mut self, tool_call_id: impl Into<String>, content: impl Into<String>) {
        self.append(Message::tool(tool_call_id, content));
    }

    // Timestamps are clamped non-decreasing within the session.
    fn append(&mut self, mut message: Message) {
        if let Some(last) = self.messages.last() {
            if message.timestamp < last.timestamp {
                message.timestamp = last.timestamp;
            }
        }
        self.messages.push(message);
    }

    /// Render the full history into the wire shape adapters expect.
    ///
    /// A pure projection: reorders nothing, deletes nothing, never mutates
    /// the underlying log.
    pub fn to_transport(&self) -> Vec<TransportMessage> {
        self.messages
            .iter()
            .map(|m| TransportMessage {
                role: m.role,
                content: m.content.clone(),
                tool_calls: m.tool_calls.clone(),
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }
}
