//! Assembly of fragmented tool calls.
//!
//! Both adapter families may split a single logical tool call's id, name,
//! and arguments across independent fragments. Updates are additive only:
//! id and name set/overwrite, argument deltas append, so re-emitted id/name
//! fragments are idempotent and argument order is preserved.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::types::{ToolCall, ToolCallFragment};

/// Assembles `ToolCallFragment`s into complete `ToolCall`s, keyed by index.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    order: Vec<u32>,
    entries: HashMap<u32, PendingToolCall>,
}

#[derive(Debug, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
    announced: bool,
}

/// An entry that still had no name when the stream finished.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedToolCall {
    pub index: u32,
    pub id: String,
    pub arguments: String,
}

/// Result of draining the accumulator at stream finish.
#[derive(Debug, Default)]
pub struct DrainedCalls {
    /// Complete calls in first-seen index order.
    pub calls: Vec<ToolCall>,
    /// Contract violations, to be reported by the caller.
    pub malformed: Vec<MalformedToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one fragment. Returns the tool name exactly once, at the first
    /// sight of a non-empty name for that index, so the caller can announce
    /// the detected call.
    pub fn push(&mut self, fragment: &ToolCallFragment) -> Option<String> {
        let entry = match self.entries.entry(fragment.index) {
            Entry::Vacant(slot) => {
                self.order.push(fragment.index);
                slot.insert(PendingToolCall::default())
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        if let Some(id) = fragment.id.as_deref() {
            if !id.is_empty() {
                entry.id = id.to_string();
            }
        }
        if let Some(name) = fragment.name.as_deref() {
            if !name.is_empty() {
                entry.name = name.to_string();
            }
        }
        if let Some(delta) = fragment.arguments_delta.as_deref() {
            entry.arguments.push_str(delta);
        }

        if !entry.announced && !entry.name.is_empty() {
            entry.announced = true;
            return Some(entry.name.clone());
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Drain into complete calls (first-seen order) and reset for the next
    /// round. Entries without a name are returned as violations, never
    /// silently dropped.
    pub fn drain(&mut self) -> DrainedCalls {
        let mut drained = DrainedCalls::default();
        for index in std::mem::take(&mut self.order) {
            let Some(pending) = self.entries.remove(&index) else {
                continue;
            };
            if pending.name.is_empty() {
                drained.malformed.push(MalformedToolCall {
                    index,
                    id: pending.id,
                    arguments: pending.arguments,
                });
            } else {
                drained.calls.push(ToolCall {
                    id: pending.id,
                    name: pending.name,
                    arguments: pending.arguments,
                    index,
                });
            }
        }
        self.entries.clear();
        drained
    }

    /// Discard all partial state (used on cancellation and turn abort).
    pub fn reset(&mut self) {
        self.order.clear();
        self.entries.clear();
    }
}
