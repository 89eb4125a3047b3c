use serde_json::{json, Map, Value};

use super::{BoolOrSchema, Exclusive, Schema, SchemaRef};

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn bool_or_schema(v: &BoolOrSchema) -> Value {
    match v {
        BoolOrSchema::Bool(b) => Value::Bool(*b),
        BoolOrSchema::Schema(s) => s.to_value(),
    }
}

fn list(items: &[SchemaRef]) -> Value {
    Value::Array(items.iter().map(|s| s.to_value()).collect())
}

fn map(entries: &[(String, SchemaRef)]) -> Value {
    Value::Object(entries.iter().map(|(k, s)| (k.clone(), s.to_value())).collect())
}

fn exclusive(e: &Exclusive) -> Value {
    match e {
        Exclusive::Flag(b) => Value::Bool(*b),
        Exclusive::Bound(n) => number(*n),
    }
}

impl Schema {
    /// JSON form of the schema, keywords in a fixed order.
    pub fn to_value(&self) -> Value {
        if self.never {
            return Value::Bool(false);
        }
        let mut m = Map::new();
        let mut put = |k: &str, v: Value| {
            m.insert(k.to_string(), v);
        };
        if let Some(r) = &self.reference {
            put("$ref", json!(r));
        }
        if let Some(types) = &self.types {
            if types.len() == 1 {
                put("type", json!(types[0].as_str()));
            } else {
                put("type", Value::Array(types.iter().map(|t| json!(t.as_str())).collect()));
            }
        }
        if let Some(v) = &self.enum_values {
            put("enum", Value::Array(v.clone()));
        }
        if let Some(v) = &self.const_value {
            put("const", v.clone());
        }
        if let Some(v) = &self.default {
            put("default", v.clone());
        }
        if let Some(v) = self.minimum {
            put("minimum", number(v));
        }
        if let Some(v) = self.maximum {
            put("maximum", number(v));
        }
        if let Some(v) = &self.exclusive_minimum {
            put("exclusiveMinimum", exclusive(v));
        }
        if let Some(v) = &self.exclusive_maximum {
            put("exclusiveMaximum", exclusive(v));
        }
        if let Some(v) = self.multiple_of {
            put("multipleOf", number(v));
        }
        if let Some(v) = self.min_length {
            put("minLength", json!(v));
        }
        if let Some(v) = self.max_length {
            put("maxLength", json!(v));
        }
        if let Some(v) = &self.pattern {
            put("pattern", json!(v));
        }
        if let Some(v) = &self.format {
            put("format", json!(v));
        }
        if let Some(v) = &self.items {
            put("items", bool_or_schema(v));
        }
        if !self.prefix_items.is_empty() {
            put("prefixItems", list(&self.prefix_items));
        }
        if let Some(v) = &self.unevaluated_items {
            put("unevaluatedItems", bool_or_schema(v));
        }
        if let Some(v) = &self.contains {
            put("contains", v.to_value());
        }
        for (key, value) in [
            ("minItems", self.min_items),
            ("maxItems", self.max_items),
            ("minContains", self.min_contains),
            ("maxContains", self.max_contains),
            ("minProperties", self.min_properties),
            ("maxProperties", self.max_properties),
        ] {
            if let Some(v) = value {
                put(key, json!(v));
            }
        }
        if self.unique_items {
            put("uniqueItems", json!(true));
        }
        if self.shuffle_items {
            put("x-shuffleItems", json!(true));
        }
        if let Some(v) = &self.properties {
            put("properties", map(v));
        }
        if !self.pattern_properties.is_empty() {
            put("patternProperties", map(&self.pattern_properties));
        }
        if let Some(v) = &self.additional_properties {
            put("additionalProperties", bool_or_schema(v));
        }
        if let Some(v) = &self.property_names {
            put("propertyNames", v.to_value());
        }
        if !self.required.is_empty() {
            put("required", json!(self.required));
        }
        if !self.dependent_required.is_empty() {
            let deps: Map<String, Value> = self
                .dependent_required
                .iter()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect();
            put("dependentRequired", Value::Object(deps));
        }
        if !self.dependent_schemas.is_empty() {
            put("dependentSchemas", map(&self.dependent_schemas));
        }
        if !self.all_of.is_empty() {
            put("allOf", list(&self.all_of));
        }
        if !self.any_of.is_empty() {
            put("anyOf", list(&self.any_of));
        }
        if !self.one_of.is_empty() {
            put("oneOf", list(&self.one_of));
        }
        if let Some(v) = &self.not {
            put("not", v.to_value());
        }
        if let Some(v) = &self.if_schema {
            put("if", v.to_value());
        }
        if let Some(v) = &self.then_schema {
            put("then", v.to_value());
        }
        if let Some(v) = &self.else_schema {
            put("else", v.to_value());
        }
        if !self.examples.is_empty() {
            put("examples", Value::Array(self.examples.clone()));
        }
        if let Some(v) = &self.example {
            put("example", v.clone());
        }
        if let Some(v) = &self.title {
            put("title", json!(v));
        }
        if let Some(v) = &self.description {
            put("description", json!(v));
        }
        if let Some(v) = &self.id {
            put("$id", json!(v));
        }
        if let Some(v) = &self.anchor {
            put("$anchor", json!(v));
        }
        if !self.defs.is_empty() {
            put("$defs", map(&self.defs));
        }
        if let Some(xml) = &self.xml {
            let mut x = Map::new();
            if let Some(n) = &xml.name {
                x.insert("name".into(), json!(n));
            }
            if let Some(n) = &xml.namespace {
                x.insert("namespace".into(), json!(n));
            }
            if let Some(p) = &xml.prefix {
                x.insert("prefix".into(), json!(p));
            }
            if xml.attribute {
                x.insert("attribute".into(), json!(true));
            }
            if xml.wrapped {
                x.insert("wrapped".into(), json!(true));
            }
            put("xml", Value::Object(x));
        }
        Value::Object(m)
    }
}

#[cfg(test)]
mod tests {
    use crate::generator::schema::parse_schema;
    use serde_json::json;

    #[test]
    fn emits_what_was_parsed() {
        let doc = json!({
            "type": "object",
            "properties": {"n": {"type": "integer", "minimum": 1, "multipleOf": 0.5}},
            "required": ["n"],
            "additionalProperties": false
        });
        assert_eq!(parse_schema(&doc).unwrap().to_value(), doc);
    }
}
