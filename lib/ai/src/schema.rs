//! Schema contract for structured generation.
//!
//! A [`SchemaDescriptor`] describes the shape a generation result must have
//! without any backend-specific syntax. Each transport translates it into
//! what its wire protocol expects: a native schema object, or a textual
//! instruction appended to the prompt.

use serde_json::{Map, Value as JsonValue, json};
use std::fmt;

/// Declarative description of an expected JSON shape.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDescriptor {
    /// A JSON string.
    String { description: Option<String> },
    /// Any JSON number.
    Number { description: Option<String> },
    /// A JSON number without a fractional part.
    Integer { description: Option<String> },
    /// A JSON boolean.
    Boolean { description: Option<String> },
    /// A JSON array whose elements all match `items`.
    Array {
        items: Box<SchemaDescriptor>,
        description: Option<String>,
    },
    /// A JSON object with named properties, in declaration order.
    Object {
        properties: Vec<Property>,
        description: Option<String>,
    },
}

/// A named property of an object schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Property name as it appears in the JSON output.
    pub name: String,
    /// Shape of the property value.
    pub schema: SchemaDescriptor,
    /// Whether the property must be present.
    pub required: bool,
}

impl SchemaDescriptor {
    /// A string schema.
    #[must_use]
    pub fn string() -> Self {
        Self::String { description: None }
    }

    /// A number schema.
    #[must_use]
    pub fn number() -> Self {
        Self::Number { description: None }
    }

    /// An integer schema.
    #[must_use]
    pub fn integer() -> Self {
        Self::Integer { description: None }
    }

    /// A boolean schema.
    #[must_use]
    pub fn boolean() -> Self {
        Self::Boolean { description: None }
    }

    /// An array schema with the given element shape.
    #[must_use]
    pub fn array(items: SchemaDescriptor) -> Self {
        Self::Array {
            items: Box::new(items),
            description: None,
        }
    }

    /// An object schema with no properties yet.
    #[must_use]
    pub fn object() -> Self {
        Self::Object {
            properties: Vec::new(),
            description: None,
        }
    }

    /// Attaches a human-readable description, forwarded to backends as a
    /// generation hint.
    #[must_use]
    pub fn described(mut self, text: impl Into<String>) -> Self {
        let text = Some(text.into());
        match &mut self {
            Self::String { description }
            | Self::Number { description }
            | Self::Integer { description }
            | Self::Boolean { description }
            | Self::Array { description, .. }
            | Self::Object { description, .. } => *description = text,
        }
        self
    }

    /// Adds a required property. No-op on non-object schemas.
    #[must_use]
    pub fn field(self, name: impl Into<String>, schema: SchemaDescriptor) -> Self {
        self.with_property(name.into(), schema, true)
    }

    /// Adds an optional property. No-op on non-object schemas.
    #[must_use]
    pub fn optional_field(self, name: impl Into<String>, schema: SchemaDescriptor) -> Self {
        self.with_property(name.into(), schema, false)
    }

    fn with_property(mut self, name: String, schema: SchemaDescriptor, required: bool) -> Self {
        if let Self::Object { properties, .. } = &mut self {
            properties.push(Property {
                name,
                schema,
                required,
            });
        }
        self
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::String { description }
            | Self::Number { description }
            | Self::Integer { description }
            | Self::Boolean { description }
            | Self::Array { description, .. }
            | Self::Object { description, .. } => description.as_deref(),
        }
    }

    /// Returns true if the top-level value is an object.
    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object { .. })
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::String { .. } => "string",
            Self::Number { .. } => "number",
            Self::Integer { .. } => "integer",
            Self::Boolean { .. } => "boolean",
            Self::Array { .. } => "array",
            Self::Object { .. } => "object",
        }
    }

    /// Renders the schema as a JSON Schema document.
    #[must_use]
    pub fn to_json_schema(&self) -> JsonValue {
        self.render(&|name: &str| name.to_string())
    }

    /// Renders the schema in the OpenAPI subset accepted by natively
    /// schema-constrained backends, which spell types in upper case and
    /// honour `propertyOrdering`.
    #[must_use]
    pub fn to_openapi_schema(&self) -> JsonValue {
        let mut rendered = self.render(&|name: &str| name.to_ascii_uppercase());
        add_property_ordering(self, &mut rendered);
        rendered
    }

    fn render(&self, type_label: &dyn Fn(&str) -> String) -> JsonValue {
        let mut out = Map::new();
        out.insert("type".to_string(), json!(type_label(self.type_name())));
        if let Some(description) = self.description() {
            out.insert("description".to_string(), json!(description));
        }
        match self {
            Self::Array { items, .. } => {
                out.insert("items".to_string(), items.render(type_label));
            }
            Self::Object { properties, .. } => {
                let mut props = Map::new();
                for property in properties {
                    props.insert(property.name.clone(), property.schema.render(type_label));
                }
                out.insert("properties".to_string(), JsonValue::Object(props));
                let required: Vec<&str> = properties
                    .iter()
                    .filter(|p| p.required)
                    .map(|p| p.name.as_str())
                    .collect();
                if !required.is_empty() {
                    out.insert("required".to_string(), json!(required));
                }
            }
            _ => {}
        }
        JsonValue::Object(out)
    }

    /// Builds the JSON-only instruction appended to prompts for backends
    /// that cannot be constrained by a schema object.
    #[must_use]
    pub fn instruction(&self) -> String {
        let schema = serde_json::to_string_pretty(&self.to_json_schema())
            .unwrap_or_else(|_| self.to_json_schema().to_string());
        let top_level = if self.is_object() {
            "a single JSON object"
        } else {
            "a single JSON value"
        };
        format!(
            "Respond with JSON only: {top_level}, with no markdown fences and no commentary \
             before or after it. The JSON must match this schema exactly:\n{schema}"
        )
    }

    /// Checks a parsed value against this schema.
    ///
    /// Returns the first violation found, in document order.
    pub fn check(&self, value: &JsonValue) -> Result<(), ShapeViolation> {
        self.check_at(value, "$")
    }

    fn check_at(&self, value: &JsonValue, path: &str) -> Result<(), ShapeViolation> {
        let matches = match self {
            Self::String { .. } => value.is_string(),
            Self::Number { .. } => value.is_number(),
            Self::Integer { .. } => value.is_i64() || value.is_u64(),
            Self::Boolean { .. } => value.is_boolean(),
            Self::Array { .. } => value.is_array(),
            Self::Object { .. } => value.is_object(),
        };
        if !matches {
            return Err(ShapeViolation {
                path: path.to_string(),
                expected: self.type_name().to_string(),
                found: json_type_name(value).to_string(),
            });
        }

        match (self, value) {
            (Self::Array { items, .. }, JsonValue::Array(elements)) => {
                for (index, element) in elements.iter().enumerate() {
                    items.check_at(element, &format!("{path}[{index}]"))?;
                }
            }
            (Self::Object { properties, .. }, JsonValue::Object(fields)) => {
                for property in properties {
                    let child = format!("{path}.{}", property.name);
                    match fields.get(&property.name) {
                        Some(field) => property.schema.check_at(field, &child)?,
                        None if property.required => {
                            return Err(ShapeViolation {
                                path: child,
                                expected: property.schema.type_name().to_string(),
                                found: "nothing".to_string(),
                            });
                        }
                        None => {}
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn add_property_ordering(schema: &SchemaDescriptor, rendered: &mut JsonValue) {
    match (schema, rendered) {
        (SchemaDescriptor::Array { items, .. }, JsonValue::Object(out)) => {
            if let Some(rendered_items) = out.get_mut("items") {
                add_property_ordering(items, rendered_items);
            }
        }
        (SchemaDescriptor::Object { properties, .. }, JsonValue::Object(out)) => {
            let order: Vec<&str> = properties.iter().map(|p| p.name.as_str()).collect();
            if let Some(JsonValue::Object(props)) = out.get_mut("properties") {
                for property in properties {
                    if let Some(child) = props.get_mut(&property.name) {
                        add_property_ordering(&property.schema, child);
                    }
                }
            }
            out.insert("propertyOrdering".to_string(), json!(order));
        }
        _ => {}
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Where and how a value departs from its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeViolation {
    /// Path to the offending value, rooted at `$`.
    pub path: String,
    /// The type the schema asked for.
    pub expected: String,
    /// The type actually found.
    pub found: String,
}

impl fmt::Display for ShapeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected {} at {}, found {}",
            self.expected, self.path, self.found
        )
    }
}

impl std::error::Error for ShapeViolation {}
