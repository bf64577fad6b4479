//! Provider-neutral tool schema types.
//!
//! One canonical catalog of these drives both provider schema conversion and
//! dispatch. Conversion to provider forms is pure and lives with each
//! provider; strict-mode adjustments (`additionalProperties: false`, full
//! `required`) are applied there, not here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-Schema `object` parameters for one tool.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaObject {
    /// Always `"object"`.
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Property name to property schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    /// Required property names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl SchemaObject {
    /// All declared property names (map order).
    #[must_use]
    pub fn property_names(&self) -> Vec<String> {
        self.properties
            .as_ref()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// A tool definition as exposed to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Catalog name (e.g. `read_file`).
    pub name: String,
    /// Model-facing description.
    pub description: String,
    /// Input parameter schema.
    pub parameters: SchemaObject,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_type_field() {
        let schema = ToolSchema {
            name: "think".into(),
            description: "Record a thought".into(),
            parameters: SchemaObject {
                schema_type: "object".into(),
                properties: Some({
                    let mut m = Map::new();
                    let _ = m.insert("text".into(), json!({"type": "string"}));
                    m
                }),
                required: Some(vec!["text".into()]),
            },
        };
        let v = serde_json::to_value(&schema).unwrap();
        assert_eq!(v["parameters"]["type"], "object");
        assert_eq!(v["parameters"]["required"][0], "text");
    }

    #[test]
    fn property_names_lists_all_properties() {
        let mut props = Map::new();
        let _ = props.insert("b".into(), json!({"type": "string"}));
        let _ = props.insert("a".into(), json!({"type": "string"}));
        let obj = SchemaObject {
            schema_type: "object".into(),
            properties: Some(props),
            required: None,
        };
        let mut names = obj.property_names();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }
}
