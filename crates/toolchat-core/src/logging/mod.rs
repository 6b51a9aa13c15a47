//! Logging abstractions
//!
//! Components take an `Arc<dyn Logger>` instead of reaching for a global,
//! so tests can run silent and the binary can route everything to `tracing`.

mod traits;
mod noop;
mod tracing_logger;

pub use traits::{Logger, SharedLogger};
pub use noop::NoOpLogger;
pub use tracing_logger::TracingLogger;
