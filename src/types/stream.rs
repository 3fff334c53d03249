//! Normalized streaming events.
//!
//! Every backend stream is translated into this closed taxonomy. Exactly one
//! payload per event; fragments for the same logical tool call may arrive
//! many times before it is complete.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A normalized event produced by an adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental natural-language text.
    Content { text: String },
    /// Incremental hidden reasoning text.
    Reasoning { text: String },
    /// A partial piece of a tool call, keyed by stream index.
    ToolCallFragment(ToolCallFragment),
    /// Terminal completion signal. Emitted at most once per stream.
    Finish { reason: FinishReason },
}

impl StreamEvent {
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning { text: text.into() }
    }
}

/// A partial tool call delivered across stream chunks.
///
/// `id` and `name` set/overwrite the entry; `arguments_delta` appends.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolCallFragment {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments_delta: Option<String>,
}

impl ToolCallFragment {
    /// Fragment announcing a call: id and name, zero argument bytes.
    pub fn opening(index: u32, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            arguments_delta: None,
        }
    }

    /// Fragment carrying only an arguments delta.
    pub fn arguments(index: u32, delta: impl Into<String>) -> Self {
        Self {
            index,
            id: None,
            name: None,
            arguments_delta: Some(delta.into()),
        }
    }
}

/// Why a stream finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    /// Backend-specific reason with no portable mapping.
    Other,
}
