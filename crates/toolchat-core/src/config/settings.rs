//! Application settings
//!
//! ```yaml
//! model:
//!   provider: anthropic
//!   model: claude-sonnet-4-20250514
//!   max_tokens: 4096
//! max_rounds: 10
//! listen: 127.0.0.1:3000
//! servers:
//!   - name: strategy-review
//!     transport:
//!       type: stdio
//!       command: uv
//!       args: [run, strategy-review-mcp]
//!       env:
//!         OPENSEARCH_URL: http://opensearch:9200
//!   - name: neo4j
//!     transport:
//!       type: http
//!       url: http://localhost:8000/mcp
//! modes:
//!   budget-review: You are a funding and budget analyst...
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::tools::QUALIFIED_SEPARATOR;
use super::traits::{ConfigError, ConfigResult};

/// Default hard bound on tool-dispatch rounds per turn
pub const DEFAULT_MAX_ROUNDS: usize = 10;
/// Default output token limit per model call
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
/// Default HTTP listen address
pub const DEFAULT_LISTEN: &str = "127.0.0.1:3000";
/// Default model when none is configured
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Top-level configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model endpoint settings
    #[serde(default)]
    pub model: ModelSettings,

    /// Maximum tool-dispatch rounds per turn
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Address the HTTP server binds to
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Tool servers to connect to
    #[serde(default)]
    pub servers: Vec<ToolServerConfig>,

    /// Extra or overriding instruction strings keyed by mode
    #[serde(default)]
    pub modes: BTreeMap<String, String>,
}

fn default_max_rounds() -> usize {
    DEFAULT_MAX_ROUNDS
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelSettings::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            listen: default_listen(),
            servers: Vec::new(),
            modes: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Check invariants the rest of the system relies on
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_rounds == 0 {
            return Err(ConfigError::invalid("max_rounds must be at least 1"));
        }
        if self.model.model.trim().is_empty() {
            return Err(ConfigError::invalid("model.model must not be empty"));
        }

        let mut seen = HashSet::new();
        for server in &self.servers {
            if server.name.trim().is_empty() {
                return Err(ConfigError::invalid("tool server name must not be empty"));
            }
            if server.name.contains(QUALIFIED_SEPARATOR) {
                return Err(ConfigError::invalid(format!(
                    "tool server name '{}' must not contain '{}'",
                    server.name, QUALIFIED_SEPARATOR
                )));
            }
            if !seen.insert(server.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "duplicate tool server name '{}'",
                    server.name
                )));
            }
        }
        Ok(())
    }

    /// Layer `other` on top of this config
    ///
    /// Scalar settings come from `other`. Servers are merged by name with
    /// `other` winning; modes likewise.
    pub fn overlay(&mut self, other: AppConfig) {
        self.model = other.model;
        self.max_rounds = other.max_rounds;
        self.listen = other.listen;
        for server in other.servers {
            match self.servers.iter_mut().find(|s| s.name == server.name) {
                Some(existing) => *existing = server,
                None => self.servers.push(server),
            }
        }
        self.modes.extend(other.modes);
    }

    /// Apply `TOOLCHAT_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(provider) = lookup("TOOLCHAT_PROVIDER") {
            self.model.provider = provider;
        }
        if let Some(model) = lookup("TOOLCHAT_MODEL") {
            self.model.model = model;
        }
        if let Some(api_base) = lookup("TOOLCHAT_API_BASE") {
            self.model.api_base = Some(api_base);
        }
        if let Some(listen) = lookup("TOOLCHAT_LISTEN") {
            self.listen = listen;
        }
        if let Some(rounds) = lookup("TOOLCHAT_MAX_ROUNDS") {
            self.max_rounds = rounds.trim().parse().map_err(|_| {
                ConfigError::invalid(format!("TOOLCHAT_MAX_ROUNDS is not a number: {}", rounds))
            })?;
        }
        Ok(())
    }
}

/// Model endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Provider id ("anthropic", "openai", "gemini", "mock", ...)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier as used by the provider's API
    #[serde(default = "default_model")]
    pub model: String,

    /// Custom API base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    /// Explicit API key; normally resolved from the environment instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Output token limit per model call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider() -> String {
    "anthropic".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_base: None,
            api_key: None,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// One external tool server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolServerConfig {
    /// Server name; becomes the prefix of every qualified tool name
    pub name: String,
    /// How to reach the server
    pub transport: TransportConfig,
}

impl ToolServerConfig {
    /// A server launched as a child process speaking MCP over stdio
    pub fn stdio(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            transport: TransportConfig::Stdio {
                command: command.into(),
                args,
                env: BTreeMap::new(),
            },
        }
    }

    /// A server reached over Streamable HTTP
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: TransportConfig::Http { url: url.into() },
        }
    }
}

/// Transport used to reach a tool server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Spawn a child process and talk over stdin/stdout
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
    /// Streamable HTTP endpoint
    Http { url: String },
    /// Unix domain socket
    Unix { path: PathBuf },
}

impl TransportConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            TransportConfig::Stdio { .. } => "stdio",
            TransportConfig::Http { .. } => "http",
            TransportConfig::Unix { .. } => "unix",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.max_rounds, 10);
        assert_eq!(config.model.provider, "anthropic");
        assert_eq!(config.model.max_tokens, 4096);
        assert_eq!(config.listen, "127.0.0.1:3000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overlay() {
        let mut base = AppConfig::default();
        base.servers.push(ToolServerConfig::http("docs", "http://a/mcp"));
        base.servers.push(ToolServerConfig::http("graph", "http://b/mcp"));
        base.modes.insert("review".into(), "base".into());

        let mut top = AppConfig::default();
        top.max_rounds = 4;
        top.servers.push(ToolServerConfig::http("graph", "http://c/mcp"));
        top.servers.push(ToolServerConfig::stdio("local", "uv", vec!["run".into()]));
        top.modes.insert("review".into(), "top".into());

        base.overlay(top);
        assert_eq!(base.max_rounds, 4);
        let names: Vec<_> = base.servers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["docs", "graph", "local"]);
        assert_eq!(base.servers[1], ToolServerConfig::http("graph", "http://c/mcp"));
        assert_eq!(base.modes["review"], "top");
    }

    #[test]
    fn test_parse_servers() {
        let yaml = r#"
max_rounds: 3
servers:
  - name: strategy-review
    transport:
      type: stdio
      command: uv
      args: [run, strategy-review-mcp]
      env:
        OPENSEARCH_URL: http://opensearch:9200
  - name: neo4j
    transport:
      type: http
      url: http://localhost:8000/mcp
  - name: local
    transport:
      type: unix
      path: /tmp/tools.sock
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_rounds, 3);
        assert_eq!(config.model, ModelSettings::default());
        assert_eq!(config.servers.len(), 3);
        assert_eq!(config.servers[0].transport.kind(), "stdio");
        assert_eq!(config.servers[1], ToolServerConfig::http("neo4j", "http://localhost:8000/mcp"));
        match &config.servers[0].transport {
            TransportConfig::Stdio { command, args, env } => {
                assert_eq!(command, "uv");
                assert_eq!(args, &["run", "strategy-review-mcp"]);
                assert_eq!(env.get("OPENSEARCH_URL").map(String::as_str), Some("http://opensearch:9200"));
            }
            other => panic!("unexpected transport {:?}", other),
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_separator_and_duplicates() {
        let mut config = AppConfig::default();
        config.servers.push(ToolServerConfig::http("bad__name", "http://x"));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.servers.push(ToolServerConfig::http("srv", "http://x"));
        config.servers.push(ToolServerConfig::http("srv", "http://y"));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = AppConfig { max_rounds: 0, ..AppConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TOOLCHAT_PROVIDER", "mock"),
            ("TOOLCHAT_MODEL", "mock-echo"),
            ("TOOLCHAT_MAX_ROUNDS", "4"),
            ("TOOLCHAT_LISTEN", ""),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.model.provider, "mock");
        assert_eq!(config.model.model, "mock-echo");
        assert_eq!(config.max_rounds, 4);
        assert_eq!(config.listen, DEFAULT_LISTEN);
    }

    #[test]
    fn test_bad_round_override() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(|name| {
            (name == "TOOLCHAT_MAX_ROUNDS").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
