//! Builder for tool schema definitions.
//!
//! Replaces the repetitive `Map::new()` + `insert()` boilerplate in every
//! tool's `definition()` method with a concise builder API.

use serde_json::{Map, Value};

use planter_core::schema::{SchemaObject, ToolSchema};

/// Fluent builder for [`ToolSchema`].
///
/// ```ignore
/// SchemaBuilder::new("read_file", "Read file contents")
///     .required("path", json!({"type": "string", "description": "Path"}))
///     .optional("start_line", json!({"type": "integer"}))
///     .build()
/// ```
pub struct SchemaBuilder {
    name: String,
    description: String,
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl SchemaBuilder {
    /// Start a builder with the tool name and description.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }

    /// Add a required property.
    #[must_use]
    pub fn required(mut self, name: &str, schema: Value) -> Self {
        let _ = self.properties.insert(name.into(), schema);
        self.required.push(name.into());
        self
    }

    /// Add an optional property.
    #[must_use]
    pub fn optional(mut self, name: &str, schema: Value) -> Self {
        let _ = self.properties.insert(name.into(), schema);
        self
    }

    /// Build the schema.
    #[must_use]
    pub fn build(self) -> ToolSchema {
        ToolSchema {
            name: self.name,
            description: self.description,
            parameters: SchemaObject {
                schema_type: "object".into(),
                properties: if self.properties.is_empty() {
                    None
                } else {
                    Some(self.properties)
                },
                required: if self.required.is_empty() {
                    None
                } else {
                    Some(self.required)
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_schema() {
        let schema = SchemaBuilder::new("finish", "Finish the solve").build();
        assert_eq!(schema.name, "finish");
        assert!(schema.parameters.properties.is_none());
        assert!(schema.parameters.required.is_none());
    }

    #[test]
    fn required_listed_in_both_places() {
        let schema = SchemaBuilder::new("t", "d")
            .required("path", json!({"type": "string"}))
            .optional("depth", json!({"type": "integer"}))
            .build();
        let props = schema.parameters.properties.unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(schema.parameters.required.unwrap(), vec!["path"]);
    }
}
