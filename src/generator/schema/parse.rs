use std::sync::Arc;

use serde_json::{Map, Value};

use super::{BoolOrSchema, Exclusive, Schema, SchemaError, SchemaRef, SchemaType, ValueKind, Xml};

/// `$schema` URI of the OpenAPI 3.1 schema dialect.
pub const OPENAPI_DIALECT: &str = "https://spec.openapis.org/oas/3.1/dialect/base";

struct Parser {
    openapi: bool,
}

/// Reads a schema from a JSON value.
pub fn parse_schema(value: &Value) -> Result<Schema, SchemaError> {
    let openapi = match value {
        Value::Object(map) => is_openapi(map),
        _ => false,
    };
    Parser { openapi }.schema(value)
}

pub(super) fn parse_in_dialect(value: &Value, openapi: bool) -> Result<Schema, SchemaError> {
    Parser { openapi }.schema(value)
}

pub(super) fn detect_openapi(value: &Value) -> bool {
    value.as_object().map(is_openapi).unwrap_or(false)
}

/// Reads a schema from JSON or YAML text.
pub fn parse_schema_str(text: &str) -> Result<Schema, SchemaError> {
    let trimmed = text.trim_start();
    let value: Value = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        serde_json::from_str(text)?
    } else {
        serde_yaml::from_str(text)?
    };
    parse_schema(&value)
}

fn is_openapi(map: &Map<String, Value>) -> bool {
    if let Some(Value::String(uri)) = map.get("$schema") {
        return uri.starts_with("https://spec.openapis.org/oas/");
    }
    map.contains_key("example") || map.contains_key("xml") || map.contains_key("nullable")
}

fn unexpected(field: &str, value: &Value) -> SchemaError {
    SchemaError::UnexpectedType {
        field: field.to_string(),
        kind: ValueKind::of(value),
    }
}

fn invalid(field: &str, message: impl Into<String>) -> SchemaError {
    SchemaError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

impl Parser {
    fn schema(&self, value: &Value) -> Result<Schema, SchemaError> {
        let map = match value {
            Value::Bool(true) => return Ok(Schema::default()),
            Value::Bool(false) => {
                return Ok(Schema {
                    never: true,
                    ..Default::default()
                })
            }
            Value::Object(map) => map,
            other => return Err(unexpected("schema", other)),
        };
        let mut s = Schema::default();
        let mut nullable = false;
        for (key, v) in map {
            match key.as_str() {
                "type" => s.types = Some(self.types(v)?),
                "enum" => match v {
                    Value::Array(items) => s.enum_values = Some(items.clone()),
                    other => return Err(unexpected("enum", other)),
                },
                "const" => s.const_value = Some(v.clone()),
                "default" => s.default = Some(v.clone()),
                "minimum" => s.minimum = Some(number(key, v)?),
                "maximum" => s.maximum = Some(number(key, v)?),
                "exclusiveMinimum" => s.exclusive_minimum = Some(exclusive(key, v)?),
                "exclusiveMaximum" => s.exclusive_maximum = Some(exclusive(key, v)?),
                "multipleOf" => {
                    let m = number(key, v)?;
                    if m <= 0.0 {
                        return Err(invalid(key, "must be greater than 0"));
                    }
                    s.multiple_of = Some(m);
                }
                "minLength" => s.min_length = Some(count(key, v)?),
                "maxLength" => s.max_length = Some(count(key, v)?),
                "pattern" => {
                    let pattern = string(key, v)?;
                    if let Err(e) = regex::Regex::new(&pattern) {
                        return Err(SchemaError::InvalidPattern {
                            pattern,
                            message: e.to_string(),
                        });
                    }
                    s.pattern = Some(pattern);
                }
                "format" => s.format = Some(string(key, v)?),
                "items" => s.items = Some(self.bool_or_schema(v)?),
                "prefixItems" => s.prefix_items = self.schema_list(key, v)?,
                "unevaluatedItems" => s.unevaluated_items = Some(self.bool_or_schema(v)?),
                "contains" => s.contains = Some(self.sub(v)?),
                "minItems" => s.min_items = Some(count(key, v)?),
                "maxItems" => s.max_items = Some(count(key, v)?),
                "minContains" => s.min_contains = Some(count(key, v)?),
                "maxContains" => s.max_contains = Some(count(key, v)?),
                "uniqueItems" => s.unique_items = boolean(key, v)?,
                "x-shuffleItems" => s.shuffle_items = boolean(key, v)?,
                "properties" => s.properties = Some(self.schema_map(key, v)?),
                "patternProperties" => s.pattern_properties = self.schema_map(key, v)?,
                "additionalProperties" => s.additional_properties = Some(self.bool_or_schema(v)?),
                "propertyNames" => s.property_names = Some(self.sub(v)?),
                "required" => s.required = strings(key, v)?,
                "minProperties" => s.min_properties = Some(count(key, v)?),
                "maxProperties" => s.max_properties = Some(count(key, v)?),
                "dependentRequired" => {
                    let map = v.as_object().ok_or_else(|| unexpected(key, v))?;
                    for (name, list) in map {
                        s.dependent_required.push((name.clone(), strings(key, list)?));
                    }
                }
                "dependentSchemas" => s.dependent_schemas = self.schema_map(key, v)?,
                "allOf" => s.all_of = self.schema_list(key, v)?,
                "anyOf" => s.any_of = self.schema_list(key, v)?,
                "oneOf" => s.one_of = self.schema_list(key, v)?,
                "not" => s.not = Some(self.sub(v)?),
                "if" => s.if_schema = Some(self.sub(v)?),
                "then" => s.then_schema = Some(self.sub(v)?),
                "else" => s.else_schema = Some(self.sub(v)?),
                "examples" => match v {
                    Value::Array(items) => s.examples = items.clone(),
                    other => return Err(unexpected(key, other)),
                },
                "title" => s.title = Some(string(key, v)?),
                "description" => s.description = Some(string(key, v)?),
                "$id" => s.id = Some(string(key, v)?),
                "$anchor" => s.anchor = Some(string(key, v)?),
                "$dynamicAnchor" => s.dynamic_anchor = Some(string(key, v)?),
                "$defs" | "definitions" => {
                    let defs = self.schema_map(key, v)?;
                    s.defs.extend(defs);
                }
                "$ref" | "$dynamicRef" => s.reference = Some(string(key, v)?),
                "$schema" => s.dialect = Some(string(key, v)?),
                "example" if self.openapi => s.example = Some(v.clone()),
                "xml" if self.openapi => s.xml = Some(xml(v)?),
                "nullable" if self.openapi => nullable = boolean(key, v)?,
                _ => {}
            }
        }
        if nullable {
            if let Some(types) = &mut s.types {
                if !types.contains(&SchemaType::Null) {
                    types.push(SchemaType::Null);
                }
            }
        }
        Ok(s)
    }

    fn types(&self, v: &Value) -> Result<Vec<SchemaType>, SchemaError> {
        let names: Vec<String> = match v {
            Value::String(name) => vec![name.clone()],
            Value::Array(items) => {
                let mut names = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(name) => names.push(name.clone()),
                        other => return Err(unexpected("type", other)),
                    }
                }
                names
            }
            other => return Err(unexpected("type", other)),
        };
        let mut types = Vec::with_capacity(names.len());
        for name in names {
            let t = SchemaType::parse(&name).ok_or_else(|| invalid("type", format!("unknown type '{}'", name)))?;
            if !types.contains(&t) {
                types.push(t);
            }
        }
        Ok(types)
    }

    fn sub(&self, v: &Value) -> Result<SchemaRef, SchemaError> {
        Ok(Arc::new(self.schema(v)?))
    }

    fn bool_or_schema(&self, v: &Value) -> Result<BoolOrSchema, SchemaError> {
        match v {
            Value::Bool(b) => Ok(BoolOrSchema::Bool(*b)),
            other => Ok(BoolOrSchema::Schema(self.sub(other)?)),
        }
    }

    fn schema_list(&self, field: &str, v: &Value) -> Result<Vec<SchemaRef>, SchemaError> {
        match v {
            Value::Array(items) => items.iter().map(|item| self.sub(item)).collect(),
            other => Err(unexpected(field, other)),
        }
    }

    fn schema_map(&self, field: &str, v: &Value) -> Result<Vec<(String, SchemaRef)>, SchemaError> {
        match v {
            Value::Object(map) => map
                .iter()
                .map(|(k, item)| Ok((k.clone(), self.sub(item)?)))
                .collect(),
            other => Err(unexpected(field, other)),
        }
    }
}

fn number(field: &str, v: &Value) -> Result<f64, SchemaError> {
    v.as_f64().ok_or_else(|| unexpected(field, v))
}

fn count(field: &str, v: &Value) -> Result<usize, SchemaError> {
    match v {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Ok(u as usize);
            }
            match n.as_f64() {
                Some(f) if f >= 0.0 && f.fract() == 0.0 => Ok(f as usize),
                _ => Err(invalid(field, "must be a non-negative integer")),
            }
        }
        other => Err(unexpected(field, other)),
    }
}

fn string(field: &str, v: &Value) -> Result<String, SchemaError> {
    match v {
        Value::String(s) => Ok(s.clone()),
        other => Err(unexpected(field, other)),
    }
}

fn strings(field: &str, v: &Value) -> Result<Vec<String>, SchemaError> {
    match v {
        Value::Array(items) => items.iter().map(|item| string(field, item)).collect(),
        other => Err(unexpected(field, other)),
    }
}

fn boolean(field: &str, v: &Value) -> Result<bool, SchemaError> {
    match v {
        Value::Bool(b) => Ok(*b),
        other => Err(unexpected(field, other)),
    }
}

fn exclusive(field: &str, v: &Value) -> Result<Exclusive, SchemaError> {
    match v {
        Value::Bool(b) => Ok(Exclusive::Flag(*b)),
        Value::Number(n) => n.as_f64().map(Exclusive::Bound).ok_or_else(|| unexpected(field, v)),
        other => Err(unexpected(field, other)),
    }
}

fn xml(v: &Value) -> Result<Xml, SchemaError> {
    let map = v.as_object().ok_or_else(|| unexpected("xml", v))?;
    let mut xml = Xml::default();
    for (key, v) in map {
        match key.as_str() {
            "name" => xml.name = Some(string("xml.name", v)?),
            "namespace" => xml.namespace = Some(string("xml.namespace", v)?),
            "prefix" => xml.prefix = Some(string("xml.prefix", v)?),
            "attribute" => xml.attribute = boolean("xml.attribute", v)?,
            "wrapped" => xml.wrapped = boolean("xml.wrapped", v)?,
            _ => {}
        }
    }
    Ok(xml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_type_is_rejected_with_kind_name() {
        let err = parse_schema(&json!({"type": 123})).unwrap_err();
        assert_eq!(err.to_string(), "unexpected type for 'type': Integer");
    }

    #[test]
    fn type_list_and_properties_keep_order() {
        let s = parse_schema(&json!({
            "type": ["object", "null"],
            "properties": {"b": {"type": "string"}, "a": {"type": "integer"}}
        }))
        .unwrap();
        assert!(s.is_nullable());
        let names: Vec<&str> = s.properties.as_ref().unwrap().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn openapi_keywords_only_in_openapi_dialect() {
        let s = parse_schema(&json!({"type": "string", "example": "x", "nullable": true})).unwrap();
        assert_eq!(s.example, Some(json!("x")));
        assert!(s.is_nullable());

        let s = parse_schema(&json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "string",
            "example": "x"
        }))
        .unwrap();
        assert!(s.example.is_none());
    }

    #[test]
    fn bad_pattern_is_reported() {
        let err = parse_schema(&json!({"type": "string", "pattern": "("})).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidPattern { .. }));
    }
}
