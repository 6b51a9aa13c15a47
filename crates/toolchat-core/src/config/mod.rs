//! Configuration
//!
//! `AppConfig` is read from YAML by `FileConfigProvider`, then adjusted by
//! `TOOLCHAT_*` environment overrides and validated.

mod traits;
mod settings;
mod file;

pub use traits::{ConfigError, ConfigResult};
pub use settings::{
    AppConfig, ModelSettings, ToolServerConfig, TransportConfig,
    DEFAULT_LISTEN, DEFAULT_MAX_ROUNDS, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
};
pub use file::{load_layered, ConfigLevel, FileConfigProvider};
