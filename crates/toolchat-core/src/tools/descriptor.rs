//! Qualified tool names and descriptors

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Tool;

/// Separator between server name and local tool name
pub const QUALIFIED_SEPARATOR: &str = "__";

/// Build `server__local`
pub fn qualify(server: &str, local: &str) -> String {
    format!("{}{}{}", server, QUALIFIED_SEPARATOR, local)
}

/// Split a qualified name at the first separator
///
/// Returns `None` when there is no separator or either side is empty.
pub fn split_qualified(name: &str) -> Option<(&str, &str)> {
    let (server, local) = name.split_once(QUALIFIED_SEPARATOR)?;
    if server.is_empty() || local.is_empty() {
        return None;
    }
    Some((server, local))
}

/// A tool offered by one connected server, under its global name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub qualified_name: String,
    pub server_name: String,
    pub local_name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(
        server_name: impl Into<String>,
        local_name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        let server_name = server_name.into();
        let local_name = local_name.into();
        Self {
            qualified_name: qualify(&server_name, &local_name),
            server_name,
            local_name,
            description: description.into(),
            input_schema,
        }
    }

    /// The definition handed to the model
    pub fn to_tool(&self) -> Tool {
        Tool::new(
            &self.qualified_name,
            format!("[{}] {}", self.server_name, self.description),
        )
        .with_schema(self.input_schema.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_on_first_separator() {
        assert_eq!(split_qualified("srv__echo"), Some(("srv", "echo")));
        assert_eq!(split_qualified("srv__get__thing"), Some(("srv", "get__thing")));
        assert_eq!(split_qualified("unknownserver__foo"), Some(("unknownserver", "foo")));
        assert_eq!(split_qualified("echo"), None);
        assert_eq!(split_qualified("__echo"), None);
        assert_eq!(split_qualified("srv__"), None);
    }

    #[test]
    fn test_descriptor_to_tool() {
        let descriptor = ToolDescriptor::new(
            "strategy-review",
            "search",
            "Search documents",
            json!({"type": "object", "properties": {"q": {"type": "string"}}}),
        );
        assert_eq!(descriptor.qualified_name, "strategy-review__search");

        let tool = descriptor.to_tool();
        assert_eq!(tool.name, "strategy-review__search");
        assert_eq!(tool.description, "[strategy-review] Search documents");
        assert_eq!(tool.input_schema["properties"]["q"]["type"], "string");
    }
}
