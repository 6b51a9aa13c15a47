//! Model stream decoding
//!
//! [`decode`] wraps a provider's frame stream; [`StreamDecoder`] does the
//! frame-by-frame work and [`ToolCallAccumulator`] reassembles tool arguments.

mod accumulator;
mod decoder;

pub use accumulator::{parse_arguments, PendingToolCall, ToolCallAccumulator};
pub use decoder::{decode, EventStream, StreamDecoder};
