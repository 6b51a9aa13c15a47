//! Tool invocation accumulator
//!
//! Tool arguments arrive as JSON fragments spread over many frames, possibly
//! for several invocations open at once. Scratch state lives here, keyed by
//! content block index; the [`ToolCall`] handed out on completion is final.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::logging::Logger;
use crate::types::ToolCall;

/// An invocation whose arguments are still streaming in
#[derive(Debug, Clone, PartialEq)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    pub raw_arguments: String,
}

/// Reassembles interleaved tool invocations
pub struct ToolCallAccumulator {
    pending: HashMap<usize, PendingToolCall>,
    /// Open block indices, oldest first
    open: Vec<usize>,
    logger: Arc<dyn Logger>,
}

impl ToolCallAccumulator {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            pending: HashMap::new(),
            open: Vec::new(),
            logger,
        }
    }

    /// Number of invocations still open
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Open a buffer for a new invocation at `index`
    ///
    /// If a block at the same index is somehow still open, it is finalized
    /// first and returned.
    pub fn start(&mut self, index: usize, id: impl Into<String>, name: impl Into<String>) -> Option<ToolCall> {
        let replaced = if self.pending.contains_key(&index) {
            self.logger.warn(&format!(
                "[ToolCallAccumulator] Block {} reopened before it was closed",
                index
            ));
            self.finish(index)
        } else {
            None
        };

        self.pending.insert(
            index,
            PendingToolCall {
                id: id.into(),
                name: name.into(),
                raw_arguments: String::new(),
            },
        );
        self.open.push(index);
        replaced
    }

    /// Append an argument fragment, returning the id of the invocation it went to
    ///
    /// A fragment for an index with no open tool block goes to the most
    /// recently started invocation that is still open.
    pub fn append(&mut self, index: usize, fragment: &str) -> Option<&str> {
        let target = if self.pending.contains_key(&index) {
            index
        } else {
            let fallback = *self.open.last()?;
            self.logger.debug(&format!(
                "[ToolCallAccumulator] Delta for block {} routed to open block {}",
                index, fallback
            ));
            fallback
        };

        let pending = self.pending.get_mut(&target)?;
        pending.raw_arguments.push_str(fragment);
        Some(pending.id.as_str())
    }

    /// Finalize the invocation at `index`, if one is open there
    pub fn finish(&mut self, index: usize) -> Option<ToolCall> {
        let pending = self.pending.remove(&index)?;
        self.open.retain(|open| *open != index);
        Some(self.finalize(pending))
    }

    /// Finalize every open invocation, oldest first
    pub fn finish_all(&mut self) -> Vec<ToolCall> {
        let mut calls = Vec::with_capacity(self.open.len());
        for index in std::mem::take(&mut self.open) {
            if let Some(pending) = self.pending.remove(&index) {
                calls.push(self.finalize(pending));
            }
        }
        calls
    }

    fn finalize(&self, pending: PendingToolCall) -> ToolCall {
        let input = parse_arguments(&pending.raw_arguments).unwrap_or_else(|e| {
            self.logger.warn(&format!(
                "[ToolCallAccumulator] Invalid arguments for {} ({}): {}; using {{}}",
                pending.name, pending.id, e
            ));
            empty_object()
        });
        ToolCall::new(pending.id, pending.name, input)
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Parse a complete argument buffer; an empty buffer means no arguments
pub fn parse_arguments(raw: &str) -> Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(empty_object());
    }
    serde_json::from_str(raw)
}
