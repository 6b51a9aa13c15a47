//! Mode table
//!
//! A mode names one instruction string sent as the system prompt for every
//! model call of a turn. The built-in `default` mode can be overridden, and
//! new modes added, through the `modes` section of the config file.

use std::collections::BTreeMap;

use crate::config::{ConfigError, ConfigResult};

/// Mode used when a request names none
pub const DEFAULT_MODE: &str = "default";

const DEFAULT_INSTRUCTIONS: &str = "\
You are a research assistant with access to external tools. Answer the \
user's question, calling tools whenever they can supply facts you do not \
already have.

## Tools

Tool names have the form `server__tool`. Call several tools in the same \
response when their inputs do not depend on each other. If a tool returns an \
error, read it, adjust the arguments and try again, or explain what could not \
be retrieved.

## Output Format

Start with a short direct answer, then the supporting detail. Cite the tool \
each fact came from. Finish with two or three follow-up questions under \
**Want to dig deeper?**";

/// Instruction strings keyed by mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeTable {
    modes: BTreeMap<String, String>,
}

impl Default for ModeTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModeTable {
    /// Table holding only the built-in modes
    pub fn builtin() -> Self {
        let mut modes = BTreeMap::new();
        modes.insert(DEFAULT_MODE.to_string(), DEFAULT_INSTRUCTIONS.to_string());
        Self { modes }
    }

    /// Built-in modes overlaid with configured ones
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut table = Self::builtin();
        for (name, instructions) in overrides {
            table.insert(name.clone(), instructions.clone());
        }
        table
    }

    /// Add or replace a mode
    pub fn insert(&mut self, name: impl Into<String>, instructions: impl Into<String>) {
        self.modes.insert(name.into(), instructions.into());
    }

    /// Resolve a mode to its instruction string
    pub fn instructions(&self, mode: &str) -> ConfigResult<&str> {
        self.modes
            .get(mode)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::UnknownMode(mode.to_string()))
    }

    /// Known mode names, sorted
    pub fn modes(&self) -> Vec<&str> {
        self.modes.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, mode: &str) -> bool {
        self.modes.contains_key(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_default() {
        let table = ModeTable::builtin();
        assert!(table.instructions(DEFAULT_MODE).unwrap().contains("server__tool"));
        assert_eq!(table.modes(), vec!["default"]);
    }

    #[test]
    fn test_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert("budget-review".to_string(), "You are a budget analyst.".to_string());
        overrides.insert("default".to_string(), "Be brief.".to_string());

        let table = ModeTable::with_overrides(&overrides);
        assert_eq!(table.instructions("default").unwrap(), "Be brief.");
        assert_eq!(table.instructions("budget-review").unwrap(), "You are a budget analyst.");
        assert_eq!(table.modes(), vec!["budget-review", "default"]);
    }

    #[test]
    fn test_unknown_mode() {
        let table = ModeTable::default();
        assert!(!table.contains("nope"));
        assert!(matches!(
            table.instructions("nope"),
            Err(ConfigError::UnknownMode(m)) if m == "nope"
        ));
    }
}
