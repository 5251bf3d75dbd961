use serde::Serialize;
use serde_json::{json, Map, Value};

/// Shape of a single field the model must fill in.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Boolean,
    StringList,
    ObjectList(Vec<FieldSpec>),
    Optional(Box<FieldKind>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub description: Option<String>,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: None,
        }
    }

    pub fn described(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// Named set of fields the structured-generation service must return.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl OutputSchema {
    pub fn new(name: &str, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.to_string(),
            fields,
        }
    }

    /// Renders the schema as a strict JSON Schema object. Optional fields stay
    /// in `required` but accept `null`, which is what strict providers expect.
    pub fn to_json_schema(&self) -> Value {
        object_schema(&self.fields)
    }
}

fn object_schema(fields: &[FieldSpec]) -> Value {
    let mut properties = Map::new();
    for field in fields {
        let mut schema = kind_schema(&field.kind);
        if let (Some(description), Value::Object(map)) = (&field.description, &mut schema) {
            map.insert("description".to_string(), Value::String(description.clone()));
        }
        properties.insert(field.name.clone(), schema);
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": fields.iter().map(|f| f.name.clone()).collect::<Vec<_>>(),
        "additionalProperties": false,
    })
}

fn kind_schema(kind: &FieldKind) -> Value {
    match kind {
        FieldKind::String => json!({ "type": "string" }),
        FieldKind::Boolean => json!({ "type": "boolean" }),
        FieldKind::StringList => json!({ "type": "array", "items": { "type": "string" } }),
        FieldKind::ObjectList(fields) => json!({ "type": "array", "items": object_schema(fields) }),
        FieldKind::Optional(inner) => {
            let mut schema = kind_schema(inner);
            if let Some(Value::String(ty)) = schema.get("type").cloned() {
                schema["type"] = json!([ty, "null"]);
            }
            schema
        }
    }
}

/// One call to the structured-generation service.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub system: String,
    pub prompt: String,
    pub schema: OutputSchema,
}

/// Request body echoed into debug logs.
#[derive(Debug, Serialize)]
pub struct RequestSummary<'a> {
    pub schema: &'a str,
    pub prompt_chars: usize,
}

impl StructuredRequest {
    pub fn summary(&self) -> RequestSummary<'_> {
        RequestSummary {
            schema: &self.schema.name,
            prompt_chars: self.prompt.chars().count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_schema() {
        let schema = OutputSchema::new(
            "explanation",
            vec![FieldSpec::new(
                "explanations",
                FieldKind::ObjectList(vec![
                    FieldSpec::new("section", FieldKind::String),
                    FieldSpec::new("explanation", FieldKind::String).described("plain language"),
                ]),
            )],
        );

        let rendered = schema.to_json_schema();
        assert_eq!(rendered["required"], json!(["explanations"]));
        assert_eq!(rendered["properties"]["explanations"]["type"], "array");
        assert_eq!(
            rendered["properties"]["explanations"]["items"]["properties"]["explanation"]["description"],
            "plain language"
        );
        assert_eq!(rendered["additionalProperties"], false);
    }

    #[test]
    fn optional_fields_accept_null() {
        let schema = OutputSchema::new(
            "chart",
            vec![FieldSpec::new("multipleLines", FieldKind::Optional(Box::new(FieldKind::Boolean)))],
        );
        assert_eq!(
            schema.to_json_schema()["properties"]["multipleLines"]["type"],
            json!(["boolean", "null"])
        );
    }
}
