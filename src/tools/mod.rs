//! Tool definitions, registry, and lenient argument parsing.

pub mod registry;
pub mod tool;
pub mod types;

pub use registry::ToolRegistry;
pub use tool::{FnTool, Tool, ToolExecutionContext};
pub use types::{ParamKind, ParameterBuilder, ToolParameters};

use crate::error::{ParleyError, Result};

/// Parse accumulated tool-call arguments leniently.
///
/// Models occasionally emit near-JSON (trailing commas, unquoted keys), so
/// strict parsing is tried first and a lenient pass covers the rest. An
/// empty or whitespace-only argument string means "no arguments" and parses
/// to an empty object.
pub fn parse_arguments(name: &str, raw: &str) -> Result<serde_json::Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(serde_json::json!({}));
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }
    json5::from_str(trimmed).map_err(|e| ParleyError::ToolArguments {
        name: name.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_json_parses() {
        let value = parse_arguments("t", r#"{"path": "a.txt"}"#).unwrap();
        assert_eq!(value["path"], "a.txt");
    }

    #[test]
    fn empty_arguments_mean_empty_object() {
        assert_eq!(parse_arguments("t", "").unwrap(), serde_json::json!({}));
        assert_eq!(parse_arguments("t", "  \n").unwrap(), serde_json::json!({}));
    }

    #[test]
    fn trailing_commas_and_unquoted_keys_are_tolerated() {
        let value = parse_arguments("t", r#"{path: "a.txt",}"#).unwrap();
        assert_eq!(value["path"], "a.txt");
    }

    #[test]
    fn garbage_reports_the_tool_name() {
        let err = parse_arguments("list_dir", "{{{").unwrap_err();
        assert!(matches!(
            err,
            ParleyError::ToolArguments { ref name, .. } if name == "list_dir"
        ));
    }
}
