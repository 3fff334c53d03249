//! Conversation persistence sinks.
//!
//! Persistence is advisory: the orchestrator flushes each newly committed
//! message after it lands in the conversation, and a sink failure is logged
//! and swallowed, never surfaced to the caller.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::types::Message;

/// Destination for committed conversation messages.
#[async_trait]
pub trait ConversationSink: Send + Sync {
    /// Persist one committed message.
    async fn persist(&self, message: &Message) -> Result<()>;
}

/// Sink that discards everything. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl ConversationSink for NullSink {
    async fn persist(&self, _message: &Message) -> Result<()> {
        Ok(())
    }
}

/// In-memory sink, mainly for tests and demos.
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<Message>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything persisted so far, in commit order.
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConversationSink for MemorySink {
    async fn persist(&self, message: &Message) -> Result<()> {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.clone());
        }
        Ok(())
    }
}

/// Appends each message as one JSON line to a file.
#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl ConversationSink for JsonlSink {
    async fn persist(&self, message: &Message) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.persist(&Message::user("one")).await.unwrap();
        sink.persist(&Message::user("two")).await.unwrap();
        let stored = sink.messages();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].text(), "one");
        assert_eq!(stored[1].text(), "two");
    }

    #[tokio::test]
    async fn jsonl_sink_appends_one_line_per_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let sink = JsonlSink::new(&path);
        sink.persist(&Message::user("first")).await.unwrap();
        sink.persist(&Message::user("second")).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let restored: Message = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(restored.text(), "second");
    }
}
