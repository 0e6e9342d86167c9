use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

// ════════════════════════════════════════════════════════════════
//  Schema Type
// ════════════════════════════════════════════════════════════════

/// Physical type of a record key or value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Boolean,
    String,
    Bytes,
    Array,
    Map,
    Struct,
}

impl SchemaType {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            SchemaType::Int8 | SchemaType::Int16 | SchemaType::Int32 | SchemaType::Int64
        )
    }

    /// Inclusive value range of an integer type.
    pub fn integer_range(self) -> Option<(i64, i64)> {
        match self {
            SchemaType::Int8 => Some((i8::MIN as i64, i8::MAX as i64)),
            SchemaType::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            SchemaType::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            SchemaType::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SchemaType::Int8 => "int8",
            SchemaType::Int16 => "int16",
            SchemaType::Int32 => "int32",
            SchemaType::Int64 => "int64",
            SchemaType::Float32 => "float32",
            SchemaType::Float64 => "float64",
            SchemaType::Boolean => "boolean",
            SchemaType::String => "string",
            SchemaType::Bytes => "bytes",
            SchemaType::Array => "array",
            SchemaType::Map => "map",
            SchemaType::Struct => "struct",
        };
        f.write_str(s)
    }
}

/// Logical type layered over a physical one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "name")]
pub enum LogicalType {
    /// Arbitrary precision number; indexed as a double.
    Decimal { scale: u8 },
    /// Days since epoch.
    Date,
    /// Milliseconds since midnight.
    Time,
    /// Milliseconds since epoch.
    Timestamp,
}

// ════════════════════════════════════════════════════════════════
//  Schema
// ════════════════════════════════════════════════════════════════

/// Schema attached to a record key or value.
///
/// JSON shape follows the upstream converter envelope:
/// `{"type": "struct", "optional": false, "fields": [{"field": "id", "type": "int32"}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "type")]
    pub ty: SchemaType,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical: Option<LogicalType>,
    /// Element schema (`array` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Key schema (`map` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Box<Schema>>,
    /// Value schema (`map` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Box<Schema>>,
    /// Ordered fields (`struct` only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
}

/// Named struct field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(rename = "field")]
    pub name: String,
    #[serde(flatten)]
    pub schema: Schema,
}

impl Field {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self { name: name.into(), schema }
    }
}

impl Schema {
    pub fn of(ty: SchemaType) -> Self {
        Self {
            ty,
            optional: false,
            logical: None,
            items: None,
            keys: None,
            values: None,
            fields: Vec::new(),
        }
    }

    pub fn int8() -> Self { Self::of(SchemaType::Int8) }
    pub fn int16() -> Self { Self::of(SchemaType::Int16) }
    pub fn int32() -> Self { Self::of(SchemaType::Int32) }
    pub fn int64() -> Self { Self::of(SchemaType::Int64) }
    pub fn float32() -> Self { Self::of(SchemaType::Float32) }
    pub fn float64() -> Self { Self::of(SchemaType::Float64) }
    pub fn boolean() -> Self { Self::of(SchemaType::Boolean) }
    pub fn string() -> Self { Self::of(SchemaType::String) }
    pub fn bytes() -> Self { Self::of(SchemaType::Bytes) }

    pub fn array(items: Schema) -> Self {
        Self { items: Some(Box::new(items)), ..Self::of(SchemaType::Array) }
    }

    pub fn map(keys: Schema, values: Schema) -> Self {
        Self {
            keys: Some(Box::new(keys)),
            values: Some(Box::new(values)),
            ..Self::of(SchemaType::Map)
        }
    }

    pub fn structure(fields: Vec<Field>) -> Self {
        Self { fields, ..Self::of(SchemaType::Struct) }
    }

    /// Mark the schema as nullable.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_logical(mut self, logical: LogicalType) -> Self {
        self.logical = Some(logical);
        self
    }

    pub fn item_schema(&self) -> Result<&Schema, SchemaError> {
        self.items
            .as_deref()
            .ok_or(SchemaError::MissingPart { ty: "array", part: "items" })
    }

    pub fn key_schema(&self) -> Result<&Schema, SchemaError> {
        self.keys
            .as_deref()
            .ok_or(SchemaError::MissingPart { ty: "map", part: "keys" })
    }

    pub fn value_schema(&self) -> Result<&Schema, SchemaError> {
        self.values
            .as_deref()
            .ok_or(SchemaError::MissingPart { ty: "map", part: "values" })
    }
}
