#![forbid(unsafe_code)]

use serde_json::{Map, Value, json};

/// The accepted shape of one tool parameter.
///
/// Contracts are data, not code: a handler declares its parameters once and
/// the validator enforces them before the handler ever runs. Enum value sets
/// must be non-empty (checked when the registry is built).
#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Enum(&'static [&'static str]),
    Array(Box<FieldKind>),
    Object,
}

impl FieldKind {
    pub fn label(&self) -> String {
        match self {
            FieldKind::String => "string".to_string(),
            FieldKind::Integer => "integer".to_string(),
            FieldKind::Number => "number".to_string(),
            FieldKind::Boolean => "boolean".to_string(),
            FieldKind::Enum(values) => format!("one of [{}]", values.join(", ")),
            FieldKind::Array(inner) => format!("array of {}", inner.label()),
            FieldKind::Object => "object".to_string(),
        }
    }

    fn json_schema(&self) -> Value {
        match self {
            FieldKind::String => json!({ "type": "string" }),
            FieldKind::Integer => json!({ "type": "integer" }),
            FieldKind::Number => json!({ "type": "number" }),
            FieldKind::Boolean => json!({ "type": "boolean" }),
            FieldKind::Enum(values) => json!({ "type": "string", "enum": values }),
            FieldKind::Array(inner) => json!({ "type": "array", "items": inner.json_schema() }),
            FieldKind::Object => json!({ "type": "object" }),
        }
    }

    /// Runtime kind check for a supplied value. Arrays are checked
    /// element-wise; enum membership is a separate concern handled by the
    /// validator so it can report the offending value.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Enum(_) => value.is_string(),
            FieldKind::Array(inner) => match value.as_array() {
                Some(items) => items.iter().all(|item| inner.matches(item)),
                None => false,
            },
            FieldKind::Object => value.is_object(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
        }
    }

    /// A field with a default is implicitly optional.
    pub fn with_default(name: &'static str, kind: FieldKind, default: Value) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: Some(default),
        }
    }
}

/// Ordered parameter list for one tool. Built once at registry-build time,
/// immutable afterwards.
#[derive(Clone, Debug, Default)]
pub struct ToolContract {
    fields: Vec<FieldSpec>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractError {
    DuplicateField(String),
    EmptyEnum(String),
}

impl ContractError {
    pub fn message(&self) -> String {
        match self {
            Self::DuplicateField(name) => format!("duplicate contract field: {name}"),
            Self::EmptyEnum(name) => format!("enum field has no values: {name}"),
        }
    }
}

impl ToolContract {
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, ContractError> {
        let mut seen = std::collections::BTreeSet::new();
        for field in fields.iter() {
            if !seen.insert(field.name) {
                return Err(ContractError::DuplicateField(field.name.to_string()));
            }
            if let FieldKind::Enum(values) = &field.kind
                && values.is_empty()
            {
                return Err(ContractError::EmptyEnum(field.name.to_string()));
            }
        }
        Ok(Self { fields })
    }

    pub fn empty() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Render the contract as a JSON Schema object for `tools/list`.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in self.fields.iter() {
            let mut schema = field.kind.json_schema();
            if let Some(default) = field.default.as_ref()
                && let Some(obj) = schema.as_object_mut()
            {
                obj.insert("default".to_string(), default.clone());
            }
            properties.insert(field.name.to_string(), schema);
            if field.required {
                required.push(Value::String(field.name.to_string()));
            }
        }
        json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": Value::Array(required)
        })
    }
}
