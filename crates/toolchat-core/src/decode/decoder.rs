//! Stream event decoder
//!
//! Demultiplexes provider frames into semantic [`StreamEvent`]s. Frame kinds
//! the decoder does not act on are skipped; upstream protocols grow new ones.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use futures::{stream, Stream, StreamExt};

use crate::logging::Logger;
use crate::providers::{FrameStream, ProviderResult};
use crate::types::{BlockKind, StreamEvent, StreamFrame};

use super::accumulator::ToolCallAccumulator;

/// Decoded event stream for one model call
pub type EventStream = Pin<Box<dyn Stream<Item = ProviderResult<StreamEvent>> + Send>>;

/// Push-style decoder for one model response
pub struct StreamDecoder {
    accumulator: ToolCallAccumulator,
    completed: bool,
    logger: Arc<dyn Logger>,
}

impl StreamDecoder {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            accumulator: ToolCallAccumulator::new(Arc::clone(&logger)),
            completed: false,
            logger,
        }
    }

    /// Whether `TurnComplete` has been emitted
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Feed one frame, returning the events it produces
    pub fn push(&mut self, frame: StreamFrame) -> Vec<StreamEvent> {
        if self.completed {
            return Vec::new();
        }

        match frame {
            StreamFrame::BlockStart { index, block: BlockKind::ToolUse { id, name } } => {
                let mut events: Vec<StreamEvent> = self
                    .accumulator
                    .start(index, id.clone(), name.clone())
                    .map(|tool_call| StreamEvent::ToolCallCompleted { tool_call })
                    .into_iter()
                    .collect();
                events.push(StreamEvent::ToolCallStarted { id, name });
                events
            }
            StreamFrame::TextDelta { text, .. } if !text.is_empty() => vec![StreamEvent::text(text)],
            StreamFrame::InputJsonDelta { index, partial_json } => {
                match self.accumulator.append(index, &partial_json) {
                    Some(id) => vec![StreamEvent::ToolInputDelta {
                        id: id.to_string(),
                        partial_json,
                    }],
                    None => {
                        self.logger.warn(&format!(
                            "[StreamDecoder] Argument delta for block {} with no open tool call",
                            index
                        ));
                        Vec::new()
                    }
                }
            }
            StreamFrame::BlockStop { index } => self
                .accumulator
                .finish(index)
                .map(|tool_call| StreamEvent::ToolCallCompleted { tool_call })
                .into_iter()
                .collect(),
            StreamFrame::MessageStop => self.finish(),
            StreamFrame::Unknown { kind } => {
                self.logger.debug(&format!("[StreamDecoder] Ignoring frame '{}'", kind));
                Vec::new()
            }
            StreamFrame::MessageStart | StreamFrame::BlockStart { .. } | StreamFrame::TextDelta { .. } => Vec::new(),
        }
    }

    /// End of input: flush open invocations and complete the turn once
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.completed {
            return Vec::new();
        }
        self.completed = true;

        let mut events: Vec<StreamEvent> = self
            .accumulator
            .finish_all()
            .into_iter()
            .map(|tool_call| StreamEvent::ToolCallCompleted { tool_call })
            .collect();
        events.push(StreamEvent::TurnComplete);
        events
    }
}

struct DecodeState {
    frames: FrameStream,
    decoder: StreamDecoder,
    pending: VecDeque<StreamEvent>,
    done: bool,
}

/// Lazily decode a frame stream
///
/// Ends after `TurnComplete`. A frame error is yielded once and ends the
/// stream.
pub fn decode(frames: FrameStream, logger: Arc<dyn Logger>) -> EventStream {
    let state = DecodeState {
        frames,
        decoder: StreamDecoder::new(logger),
        pending: VecDeque::new(),
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.done {
                return None;
            }

            match state.frames.next().await {
                Some(Ok(frame)) => {
                    state.pending.extend(state.decoder.push(frame));
                    state.done = state.decoder.is_complete();
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.pending.extend(state.decoder.finish());
                    state.done = true;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::providers::ProviderError;
    use crate::types::ToolCall;
    use serde_json::json;

    fn decoder() -> StreamDecoder {
        StreamDecoder::new(Arc::new(NoOpLogger::new()))
    }

    fn frames(items: Vec<ProviderResult<StreamFrame>>) -> FrameStream {
        Box::pin(stream::iter(items))
    }

    #[test]
    fn test_text_and_tool_events() {
        let mut d = decoder();
        let mut events = Vec::new();
        for frame in [
            StreamFrame::MessageStart,
            StreamFrame::BlockStart { index: 0, block: BlockKind::Text },
            StreamFrame::text(0, "Let me "),
            StreamFrame::text(0, "check"),
            StreamFrame::BlockStop { index: 0 },
            StreamFrame::tool_start(1, "toolu_1", "srv__echo"),
            StreamFrame::input_json(1, "{\"x\":"),
            StreamFrame::input_json(1, "1}"),
            StreamFrame::BlockStop { index: 1 },
            StreamFrame::MessageStop,
        ] {
            events.extend(d.push(frame));
        }

        assert_eq!(
            events,
            vec![
                StreamEvent::text("Let me "),
                StreamEvent::text("check"),
                StreamEvent::ToolCallStarted { id: "toolu_1".into(), name: "srv__echo".into() },
                StreamEvent::ToolInputDelta { id: "toolu_1".into(), partial_json: "{\"x\":".into() },
                StreamEvent::ToolInputDelta { id: "toolu_1".into(), partial_json: "1}".into() },
                StreamEvent::ToolCallCompleted {
                    tool_call: ToolCall::new("toolu_1", "srv__echo", json!({"x": 1})),
                },
                StreamEvent::TurnComplete,
            ]
        );
        assert!(d.is_complete());
    }

    #[test]
    fn test_unknown_frames_ignored_and_after_complete() {
        let mut d = decoder();
        assert!(d.push(StreamFrame::Unknown { kind: "ping".into() }).is_empty());
        assert!(d.push(StreamFrame::BlockStart { index: 0, block: BlockKind::Other { kind: "thinking".into() } }).is_empty());
        assert_eq!(d.push(StreamFrame::MessageStop), vec![StreamEvent::TurnComplete]);
        assert!(d.push(StreamFrame::text(0, "late")).is_empty());
        assert!(d.finish().is_empty());
    }

    #[test]
    fn test_finish_flushes_open_blocks() {
        let mut d = decoder();
        d.push(StreamFrame::tool_start(0, "a", "srv__one"));
        d.push(StreamFrame::input_json(0, "{\"unterminated\""));

        let events = d.finish();
        assert_eq!(
            events,
            vec![
                StreamEvent::ToolCallCompleted { tool_call: ToolCall::new("a", "srv__one", json!({})) },
                StreamEvent::TurnComplete,
            ]
        );
    }

    #[tokio::test]
    async fn test_decode_stream_completes_without_message_stop() {
        let events: Vec<_> = decode(
            frames(vec![Ok(StreamFrame::text(0, "hello"))]),
            Arc::new(NoOpLogger::new()),
        )
        .collect()
        .await;

        let events: Vec<StreamEvent> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(events, vec![StreamEvent::text("hello"), StreamEvent::TurnComplete]);
    }

    #[tokio::test]
    async fn test_decode_error_ends_stream() {
        let events: Vec<_> = decode(
            frames(vec![
                Ok(StreamFrame::text(0, "partial")),
                Err(ProviderError::Other("connection reset".into())),
                Ok(StreamFrame::text(0, "never")),
            ]),
            Arc::new(NoOpLogger::new()),
        )
        .collect()
        .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], Ok(StreamEvent::TextDelta { text }) if text == "partial"));
        assert!(events[1].is_err());
    }
}
