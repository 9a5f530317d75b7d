use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Column Types
// ============================================================================

/// Primitive semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Boolean,
}

impl ColumnType {
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Number => "number",
            ColumnType::Boolean => "boolean",
        }
    }

    /// True if `value` is a non-null value of this type.
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ColumnType::String, Value::String(_))
                | (ColumnType::Number, Value::Number(_))
                | (ColumnType::Boolean, Value::Bool(_))
        )
    }
}

/// Column declaration: a type plus whether the value may be absent/null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    #[serde(rename = "type")]
    pub ty: ColumnType,
    #[serde(default)]
    pub optional: bool,
}

impl ColumnSchema {
    /// True if `value` may be stored in this column.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.optional;
        }
        self.ty.accepts(value)
    }
}

// ============================================================================
// Schema Builder API (`t` module)
// ============================================================================

/// Column builder helpers. Usage: `t::string()`, `t::optional(t::string())`.
pub mod t {
    use super::{ColumnSchema, ColumnType};

    pub fn string() -> ColumnSchema {
        ColumnSchema {
            ty: ColumnType::String,
            optional: false,
        }
    }

    pub fn number() -> ColumnSchema {
        ColumnSchema {
            ty: ColumnType::Number,
            optional: false,
        }
    }

    pub fn boolean() -> ColumnSchema {
        ColumnSchema {
            ty: ColumnType::Boolean,
            optional: false,
        }
    }

    pub fn optional(inner: ColumnSchema) -> ColumnSchema {
        ColumnSchema {
            optional: true,
            ..inner
        }
    }
}

/// Name of a JSON value's type, for validation messages.
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
