//! The schema model and its ingest from JSON.
//!
//! Two dialects are read: plain JSON Schema, and the OpenAPI superset that
//! adds `example`, `xml` and `nullable`. The OpenAPI dialect is detected by
//! its `$schema` URI or by the presence of `example` or `xml`.

mod emit;
mod parse;
mod refs;
mod validate;

pub use parse::{parse_schema, parse_schema_str, OPENAPI_DIALECT};
pub use refs::SchemaSet;
pub use validate::{format_matches, is_multiple_of, json_equal, type_matches, validate, ValidationError};

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

pub type SchemaRef = Arc<Schema>;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unexpected type for '{field}': {kind}")]
    UnexpectedType { field: String, kind: ValueKind },

    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("cannot resolve reference '{0}'")]
    UnresolvedRef(String),

    #[error("invalid schema document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid schema document: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Kind names used in type-mismatch errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Array,
    Integer,
    Number,
    Boolean,
    Object,
    String,
    Unknown,
}

impl ValueKind {
    pub fn of(value: &Value) -> ValueKind {
        match value {
            Value::Array(_) => ValueKind::Array,
            Value::Number(n) if n.is_i64() || n.is_u64() => ValueKind::Integer,
            Value::Number(_) => ValueKind::Number,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Object(_) => ValueKind::Object,
            Value::String(_) => ValueKind::String,
            Value::Null => ValueKind::Unknown,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Array => "Array",
            ValueKind::Integer => "Integer",
            ValueKind::Number => "Number",
            ValueKind::Boolean => "Boolean",
            ValueKind::Object => "Object",
            ValueKind::String => "String",
            ValueKind::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
}

impl SchemaType {
    pub const ALL: [SchemaType; 7] = [
        SchemaType::String,
        SchemaType::Number,
        SchemaType::Integer,
        SchemaType::Boolean,
        SchemaType::Array,
        SchemaType::Object,
        SchemaType::Null,
    ];

    pub fn parse(name: &str) -> Option<SchemaType> {
        Some(match name {
            "string" => SchemaType::String,
            "number" => SchemaType::Number,
            "integer" => SchemaType::Integer,
            "boolean" => SchemaType::Boolean,
            "array" => SchemaType::Array,
            "object" => SchemaType::Object,
            "null" => SchemaType::Null,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
            SchemaType::Null => "null",
        }
    }

    /// Type of a JSON value; integral numbers report `Integer`.
    pub fn of(value: &Value) -> SchemaType {
        match value {
            Value::Null => SchemaType::Null,
            Value::Bool(_) => SchemaType::Boolean,
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() || n.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false) {
                    SchemaType::Integer
                } else {
                    SchemaType::Number
                }
            }
            Value::String(_) => SchemaType::String,
            Value::Array(_) => SchemaType::Array,
            Value::Object(_) => SchemaType::Object,
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `exclusiveMinimum`/`exclusiveMaximum`: a flag pairing with the inclusive
/// bound (draft 4, OpenAPI 3.0) or a bound of its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Exclusive {
    Flag(bool),
    Bound(f64),
}

#[derive(Debug, Clone)]
pub enum BoolOrSchema {
    Bool(bool),
    Schema(SchemaRef),
}

impl BoolOrSchema {
    pub fn schema(&self) -> Option<&SchemaRef> {
        match self {
            BoolOrSchema::Schema(s) => Some(s),
            BoolOrSchema::Bool(_) => None,
        }
    }

    pub fn is_false(&self) -> bool {
        matches!(self, BoolOrSchema::Bool(false))
    }
}

/// OpenAPI `xml` metadata used when marshalling to XML.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Xml {
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub attribute: bool,
    pub wrapped: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub types: Option<Vec<SchemaType>>,
    pub enum_values: Option<Vec<Value>>,
    pub const_value: Option<Value>,
    pub default: Option<Value>,

    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<Exclusive>,
    pub exclusive_maximum: Option<Exclusive>,
    pub multiple_of: Option<f64>,

    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    pub format: Option<String>,

    pub items: Option<BoolOrSchema>,
    pub prefix_items: Vec<SchemaRef>,
    pub unevaluated_items: Option<BoolOrSchema>,
    pub contains: Option<SchemaRef>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub min_contains: Option<usize>,
    pub max_contains: Option<usize>,
    pub unique_items: bool,
    /// Non-standard `x-shuffleItems`: permute the generated array.
    pub shuffle_items: bool,

    /// Declared properties in document order.
    pub properties: Option<Vec<(String, SchemaRef)>>,
    pub pattern_properties: Vec<(String, SchemaRef)>,
    pub additional_properties: Option<BoolOrSchema>,
    pub property_names: Option<SchemaRef>,
    pub required: Vec<String>,
    pub min_properties: Option<usize>,
    pub max_properties: Option<usize>,
    pub dependent_required: Vec<(String, Vec<String>)>,
    pub dependent_schemas: Vec<(String, SchemaRef)>,

    pub all_of: Vec<SchemaRef>,
    pub any_of: Vec<SchemaRef>,
    pub one_of: Vec<SchemaRef>,
    pub not: Option<SchemaRef>,

    pub if_schema: Option<SchemaRef>,
    pub then_schema: Option<SchemaRef>,
    pub else_schema: Option<SchemaRef>,

    pub examples: Vec<Value>,
    pub example: Option<Value>,
    pub title: Option<String>,
    pub description: Option<String>,

    pub id: Option<String>,
    pub anchor: Option<String>,
    pub dynamic_anchor: Option<String>,
    pub defs: Vec<(String, SchemaRef)>,
    pub reference: Option<String>,
    pub dialect: Option<String>,
    pub xml: Option<Xml>,
    /// `true` for the literal schema `false`.
    pub never: bool,
}

impl Schema {
    pub fn of_type(t: SchemaType) -> Schema {
        Schema {
            types: Some(vec![t]),
            ..Default::default()
        }
    }

    pub fn is_type(&self, t: SchemaType) -> bool {
        match &self.types {
            Some(types) => types.contains(&t),
            None => false,
        }
    }

    /// Whether the type set admits `t`. No type set admits everything;
    /// `number` admits integers.
    pub fn allows_type(&self, t: SchemaType) -> bool {
        match &self.types {
            None => true,
            Some(types) => {
                types.contains(&t) || (t == SchemaType::Integer && types.contains(&SchemaType::Number))
            }
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.is_type(SchemaType::Null)
    }

    /// Type set without `null`.
    pub fn non_null_types(&self) -> Vec<SchemaType> {
        self.types
            .as_ref()
            .map(|t| t.iter().copied().filter(|t| *t != SchemaType::Null).collect())
            .unwrap_or_default()
    }

    pub fn is_object_like(&self) -> bool {
        self.is_type(SchemaType::Object)
            || (self.types.is_none()
                && (self.properties.is_some()
                    || !self.pattern_properties.is_empty()
                    || self.additional_properties.as_ref().and_then(|a| a.schema()).is_some()))
    }

    pub fn is_array_like(&self) -> bool {
        self.is_type(SchemaType::Array)
            || (self.types.is_none() && (self.items.is_some() || !self.prefix_items.is_empty()))
    }

    pub fn has_composition(&self) -> bool {
        !self.all_of.is_empty() || !self.any_of.is_empty() || !self.one_of.is_empty()
    }

    /// A schema without any constraint.
    pub fn is_unconstrained(&self) -> bool {
        self.types.is_none()
            && self.enum_values.is_none()
            && self.const_value.is_none()
            && self.minimum.is_none()
            && self.maximum.is_none()
            && self.exclusive_minimum.is_none()
            && self.exclusive_maximum.is_none()
            && self.multiple_of.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.pattern.is_none()
            && self.format.is_none()
            && self.items.is_none()
            && self.prefix_items.is_empty()
            && self.contains.is_none()
            && self.properties.is_none()
            && self.pattern_properties.is_empty()
            && self.additional_properties.is_none()
            && self.required.is_empty()
            && !self.has_composition()
            && self.not.is_none()
            && self.if_schema.is_none()
            && self.reference.is_none()
            && !self.never
    }

    pub fn property(&self, name: &str) -> Option<&SchemaRef> {
        self.properties
            .as_ref()
            .and_then(|props| props.iter().find(|(k, _)| k == name).map(|(_, s)| s))
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Effective inclusive or exclusive lower bound: `(value, exclusive)`.
    pub fn lower_bound(&self) -> Option<(f64, bool)> {
        match (self.minimum, self.exclusive_minimum) {
            (_, Some(Exclusive::Bound(b))) => match self.minimum {
                Some(m) if m > b => Some((m, false)),
                _ => Some((b, true)),
            },
            (Some(m), Some(Exclusive::Flag(true))) => Some((m, true)),
            (Some(m), _) => Some((m, false)),
            (None, _) => None,
        }
    }

    pub fn upper_bound(&self) -> Option<(f64, bool)> {
        match (self.maximum, self.exclusive_maximum) {
            (_, Some(Exclusive::Bound(b))) => match self.maximum {
                Some(m) if m < b => Some((m, false)),
                _ => Some((b, true)),
            },
            (Some(m), Some(Exclusive::Flag(true))) => Some((m, true)),
            (Some(m), _) => Some((m, false)),
            (None, _) => None,
        }
    }
}

/// Short description used in log records and errors.
impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.never {
            return f.write_str("schema false");
        }
        let mut parts = Vec::new();
        if let Some(types) = &self.types {
            let names: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
            parts.push(format!("type={}", names.join("|")));
        }
        if let Some(format) = &self.format {
            parts.push(format!("format={}", format));
        }
        if let Some(pattern) = &self.pattern {
            parts.push(format!("pattern={}", pattern));
        }
        if let Some(r) = &self.reference {
            parts.push(format!("$ref={}", r));
        }
        if parts.is_empty() {
            f.write_str("schema")
        } else {
            write!(f, "schema {}", parts.join(" "))
        }
    }
}
