//! Tool parameter schemas.
//!
//! Both backend families accept the same JSON-Schema object shape for tool
//! definitions (the delta format under `function.parameters`, the block
//! format under `input_schema`), so one schema type serves both.

use serde::{Deserialize, Serialize};
use strum::Display;

/// The JSON Schema a tool advertises for its arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolParameters(serde_json::Value);

impl ToolParameters {
    /// Wrap a raw JSON Schema value.
    pub fn from_schema(schema: serde_json::Value) -> Self {
        Self(schema)
    }

    /// Schema for a tool that takes no arguments.
    pub fn empty() -> Self {
        ParameterBuilder::default().build()
    }

    /// Start building an object schema field by field.
    pub fn object() -> ParameterBuilder {
        ParameterBuilder::default()
    }

    pub fn schema(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Primitive argument types exposed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ParamKind {
    String,
    Number,
    Boolean,
}

/// Accumulates object properties and the required-name list.
#[derive(Debug, Default)]
pub struct ParameterBuilder {
    properties: serde_json::Map<String, serde_json::Value>,
    required: Vec<String>,
}

impl ParameterBuilder {
    /// Add an optional field.
    pub fn field(
        mut self,
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        self.properties.insert(
            name.into(),
            serde_json::json!({
                "type": kind.to_string(),
                "description": description.into(),
            }),
        );
        self
    }

    /// Add a field the model must supply.
    pub fn required(
        self,
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let mut builder = self.field(name.clone(), kind, description);
        builder.required.push(name);
        builder
    }

    pub fn build(self) -> ToolParameters {
        ToolParameters(serde_json::json!({
            "type": "object",
            "properties": self.properties,
            "required": self.required,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_fields_and_required_names() {
        let params = ToolParameters::object()
            .required("path", ParamKind::String, "File path")
            .field("recursive", ParamKind::Boolean, "Recurse into subdirectories")
            .build();
        let schema = params.schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["path"]["type"], "string");
        assert_eq!(schema["properties"]["recursive"]["type"], "boolean");
        assert_eq!(schema["required"], serde_json::json!(["path"]));
    }

    #[test]
    fn empty_schema_is_an_argumentless_object() {
        let schema = ToolParameters::empty();
        assert_eq!(schema.schema()["type"], "object");
        assert!(schema.schema()["properties"]
            .as_object()
            .unwrap()
            .is_empty());
    }
}
