//! Session event stream types.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Callback used for streaming session events.
pub type SessionEventSink = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// Concrete event payloads emitted during a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEventPayload {
    TurnStarted,
    AssistantDelta {
        text: String,
    },
    ReasoningDelta {
        text: String,
    },
    /// A tool call gained its name mid-stream, before arguments finished.
    ToolCallDetected {
        index: u32,
        name: String,
    },
    ToolCallStarted {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
    ToolResult {
        id: String,
        name: String,
        content: String,
        is_error: bool,
    },
    TurnCompleted,
    TurnFailed {
        error: String,
    },
    TurnCanceled,
    /// A non-fatal problem the turn survived (skipped call, sink failure).
    Error {
        kind: String,
        message: String,
    },
}

/// Envelope for streaming session events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session_id: Uuid,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: SessionEventPayload,
}

pub(crate) struct SessionEventEmitter {
    session_id: Uuid,
    seq: AtomicU64,
    sink: Option<SessionEventSink>,
}

impl SessionEventEmitter {
    pub(crate) fn new(session_id: Uuid, sink: Option<SessionEventSink>) -> Self {
        Self {
            session_id,
            seq: AtomicU64::new(1),
            sink,
        }
    }

    pub(crate) fn emit(&self, payload: SessionEventPayload) {
        let Some(sink) = &self.sink else {
            return;
        };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        (sink)(SessionEvent {
            session_id: self.session_id,
            seq,
            timestamp: Utc::now(),
            payload,
        });
    }
}
