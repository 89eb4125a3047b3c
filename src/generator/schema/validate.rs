use std::fmt;

use regex::Regex;
use serde_json::{Map, Value};

use super::{BoolOrSchema, Schema, SchemaSet, SchemaType};

/// First constraint a value violates, with the JSON path of the offending
/// location.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{} at '{}'", self.message, self.path)
        }
    }
}

impl std::error::Error for ValidationError {}

type Check = Result<(), ValidationError>;

pub fn validate(value: &Value, schema: &Schema, refs: Option<&SchemaSet>) -> Check {
    Validator { refs }.check(value, schema, "")
}

struct Validator<'a> {
    refs: Option<&'a SchemaSet>,
}

fn fail(path: &str, message: impl Into<String>) -> Check {
    Err(ValidationError {
        path: path.to_string(),
        message: message.into(),
    })
}

fn child(path: &str, segment: &str) -> String {
    format!("{}/{}", path, segment)
}

/// JSON equality treating `1` and `1.0` as the same number.
pub fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_equal(a, b)),
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).map(|w| json_equal(v, w)).unwrap_or(false))
        }
        _ => a == b,
    }
}

pub fn is_multiple_of(n: f64, m: f64) -> bool {
    if m <= 0.0 {
        return true;
    }
    let q = n / m;
    (q - q.round()).abs() < 1e-9
}

pub fn type_matches(value: &Value, t: SchemaType) -> bool {
    match t {
        SchemaType::Integer => matches!(SchemaType::of(value), SchemaType::Integer),
        SchemaType::Number => value.is_number(),
        other => SchemaType::of(value) == other,
    }
}

impl<'a> Validator<'a> {
    fn check(&self, value: &Value, schema: &Schema, path: &str) -> Check {
        if schema.never {
            return fail(path, "no value is allowed");
        }
        if let Some(reference) = &schema.reference {
            let target = match self.refs {
                Some(refs) => refs.resolve(reference).map_err(|e| ValidationError {
                    path: path.to_string(),
                    message: e.to_string(),
                })?,
                None => return fail(path, format!("cannot resolve reference '{}'", reference)),
            };
            self.check(value, &target, path)?;
        }
        if let Some(types) = &schema.types {
            if !types.iter().any(|t| type_matches(value, *t)) {
                let names: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
                return fail(
                    path,
                    format!("invalid type, expected {} but got {}", names.join(" or "), SchemaType::of(value)),
                );
            }
        }
        if let Some(values) = &schema.enum_values {
            if !values.iter().any(|v| json_equal(v, value)) {
                return fail(path, format!("value {} does not match one in the enumeration", value));
            }
        }
        if let Some(c) = &schema.const_value {
            if !json_equal(c, value) {
                return fail(path, format!("value {} does not match const {}", value, c));
            }
        }
        match value {
            Value::Number(n) => self.number(n.as_f64().unwrap_or(0.0), schema, path)?,
            Value::String(s) => self.string(s, schema, path)?,
            Value::Array(items) => self.array(items, schema, path)?,
            Value::Object(map) => self.object(map, schema, path)?,
            _ => {}
        }
        self.composition(value, schema, path)
    }

    fn number(&self, n: f64, schema: &Schema, path: &str) -> Check {
        if let Some((min, exclusive)) = schema.lower_bound() {
            if n < min || (exclusive && n == min) {
                let op = if exclusive { ">" } else { ">=" };
                return fail(path, format!("number {} does not satisfy {} {}", n, op, min));
            }
        }
        if let Some((max, exclusive)) = schema.upper_bound() {
            if n > max || (exclusive && n == max) {
                let op = if exclusive { "<" } else { "<=" };
                return fail(path, format!("number {} does not satisfy {} {}", n, op, max));
            }
        }
        if let Some(m) = schema.multiple_of {
            if !is_multiple_of(n, m) {
                return fail(path, format!("number {} is not a multiple of {}", n, m));
            }
        }
        Ok(())
    }

    fn string(&self, s: &str, schema: &Schema, path: &str) -> Check {
        let len = s.chars().count();
        if let Some(min) = schema.min_length {
            if len < min {
                return fail(path, format!("string length {} is less than minimum of {}", len, min));
            }
        }
        if let Some(max) = schema.max_length {
            if len > max {
                return fail(path, format!("string length {} exceeds maximum of {}", len, max));
            }
        }
        if let Some(pattern) = &schema.pattern {
            match Regex::new(pattern) {
                Ok(re) if re.is_match(s) => {}
                Ok(_) => return fail(path, format!("string '{}' does not match regex pattern '{}'", s, pattern)),
                Err(e) => return fail(path, format!("invalid pattern '{}': {}", pattern, e)),
            }
        }
        if let Some(format) = &schema.format {
            if !format_matches(format, s) {
                return fail(path, format!("string '{}' does not match format '{}'", s, format));
            }
        }
        Ok(())
    }

    fn array(&self, items: &[Value], schema: &Schema, path: &str) -> Check {
        if let Some(min) = schema.min_items {
            if items.len() < min {
                return fail(path, format!("item count {} is less than minimum count of {}", items.len(), min));
            }
        }
        if let Some(max) = schema.max_items {
            if items.len() > max {
                return fail(path, format!("item count {} exceeds maximum count of {}", items.len(), max));
            }
        }
        for (i, (item, s)) in items.iter().zip(&schema.prefix_items).enumerate() {
            self.check(item, s, &child(path, &i.to_string()))?;
        }
        let rest = schema.items.as_ref().or(schema.unevaluated_items.as_ref());
        if let Some(rest) = rest {
            for (i, item) in items.iter().enumerate().skip(schema.prefix_items.len()) {
                let p = child(path, &i.to_string());
                match rest {
                    BoolOrSchema::Bool(false) => return fail(&p, "additional items are not allowed"),
                    BoolOrSchema::Bool(true) => {}
                    BoolOrSchema::Schema(s) => self.check(item, s, &p)?,
                }
            }
        }
        if let Some(contains) = &schema.contains {
            let count = items.iter().filter(|item| self.check(item, contains, path).is_ok()).count();
            let min = schema.min_contains.unwrap_or(1);
            if count < min {
                return fail(path, format!("contains match count {} is less than minimum of {}", count, min));
            }
            if let Some(max) = schema.max_contains {
                if count > max {
                    return fail(path, format!("contains match count {} exceeds maximum of {}", count, max));
                }
            }
        }
        if schema.unique_items {
            for (i, a) in items.iter().enumerate() {
                if items[..i].iter().any(|b| json_equal(a, b)) {
                    return fail(path, format!("non-unique array item at index {}", i));
                }
            }
        }
        Ok(())
    }

    fn object(&self, map: &Map<String, Value>, schema: &Schema, path: &str) -> Check {
        for name in &schema.required {
            if !map.contains_key(name) {
                return fail(path, format!("required properties are missing: {}", name));
            }
        }
        if let Some(min) = schema.min_properties {
            if map.len() < min {
                return fail(path, format!("property count {} is less than minimum count of {}", map.len(), min));
            }
        }
        if let Some(max) = schema.max_properties {
            if map.len() > max {
                return fail(path, format!("property count {} exceeds maximum count of {}", map.len(), max));
            }
        }
        for (key, value) in map {
            let p = child(path, key);
            let mut evaluated = false;
            if let Some(s) = schema.property(key) {
                evaluated = true;
                self.check(value, s, &p)?;
            }
            for (pattern, s) in &schema.pattern_properties {
                if Regex::new(pattern).map(|re| re.is_match(key)).unwrap_or(false) {
                    evaluated = true;
                    self.check(value, s, &p)?;
                }
            }
            if !evaluated {
                match &schema.additional_properties {
                    Some(BoolOrSchema::Bool(false)) => {
                        return fail(&p, format!("property '{}' not defined and the schema does not allow additional properties", key))
                    }
                    Some(BoolOrSchema::Schema(s)) => self.check(value, s, &p)?,
                    _ => {}
                }
            }
            if let Some(names) = &schema.property_names {
                self.check(&Value::String(key.clone()), names, &p)?;
            }
        }
        for (name, required) in &schema.dependent_required {
            if map.contains_key(name) {
                if let Some(missing) = required.iter().find(|r| !map.contains_key(*r)) {
                    return fail(path, format!("property '{}' requires '{}'", name, missing));
                }
            }
        }
        let whole = Value::Object(map.clone());
        for (name, s) in &schema.dependent_schemas {
            if map.contains_key(name) {
                self.check(&whole, s, path)?;
            }
        }
        Ok(())
    }

    fn composition(&self, value: &Value, schema: &Schema, path: &str) -> Check {
        for s in &schema.all_of {
            self.check(value, s, path)?;
        }
        if !schema.any_of.is_empty() && !schema.any_of.iter().any(|s| self.check(value, s, path).is_ok()) {
            return fail(path, "does not match any schemas of 'anyOf'");
        }
        if !schema.one_of.is_empty() {
            let matches = schema.one_of.iter().filter(|s| self.check(value, s, path).is_ok()).count();
            if matches == 0 {
                return fail(path, "does not match any schemas of 'oneOf'");
            }
            if matches > 1 {
                return fail(path, "valid against more than one schema from 'oneOf'");
            }
        }
        if let Some(not) = &schema.not {
            if self.check(value, not, path).is_ok() {
                return fail(path, "is valid against schema from 'not'");
            }
        }
        if let Some(condition) = &schema.if_schema {
            let branch = if self.check(value, condition, path).is_ok() {
                schema.then_schema.as_ref()
            } else {
                schema.else_schema.as_ref()
            };
            if let Some(branch) = branch {
                self.check(value, branch, path)?;
            }
        }
        Ok(())
    }
}

/// Loose format checks; unknown formats always match.
pub fn format_matches(format: &str, s: &str) -> bool {
    match format {
        "date" => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
        "date-time" => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
        "time" => {
            chrono::NaiveTime::parse_from_str(s.trim_end_matches('Z'), "%H:%M:%S%.f").is_ok()
                || chrono::NaiveTime::parse_from_str(s, "%H:%M:%S%:z").is_ok()
        }
        "email" => {
            let mut parts = s.splitn(2, '@');
            match (parts.next(), parts.next()) {
                (Some(local), Some(domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
                _ => false,
            }
        }
        "uuid" => uuid::Uuid::parse_str(s).is_ok(),
        "ipv4" => s.parse::<std::net::Ipv4Addr>().is_ok(),
        "ipv6" => s.parse::<std::net::Ipv6Addr>().is_ok(),
        "hostname" => {
            !s.is_empty()
                && s.len() <= 253
                && s.split('.').all(|label| {
                    !label.is_empty()
                        && label.len() <= 63
                        && !label.starts_with('-')
                        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                })
        }
        "uri" | "url" => match s.find(':') {
            Some(i) if i > 0 => s[..i].chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)),
            _ => false,
        },
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::schema::parse_schema;
    use serde_json::json;

    fn check(value: Value, schema: Value) -> Check {
        validate(&value, &parse_schema(&schema).unwrap(), None)
    }

    #[test]
    fn integer_accepts_integral_floats() {
        assert!(check(json!(3.0), json!({"type": "integer"})).is_ok());
        assert!(check(json!(3.5), json!({"type": "integer"})).is_err());
    }

    #[test]
    fn exclusive_bounds() {
        let schema = json!({"type": "number", "exclusiveMinimum": 1, "maximum": 2});
        assert!(check(json!(1), schema.clone()).is_err());
        assert!(check(json!(1.5), schema.clone()).is_ok());
        assert!(check(json!(2), schema).is_ok());
    }

    #[test]
    fn one_of_requires_exactly_one() {
        let schema = json!({"oneOf": [{"type": "integer"}, {"type": "number"}]});
        assert!(check(json!(2), schema.clone()).is_err());
        assert!(check(json!(2.5), schema).is_ok());
    }

    #[test]
    fn additional_properties_false() {
        let schema = json!({"properties": {"a": {}}, "additionalProperties": false});
        assert!(check(json!({"a": 1}), schema.clone()).is_ok());
        let err = check(json!({"a": 1, "b": 2}), schema).unwrap_err();
        assert_eq!(err.path, "/b");
    }

    #[test]
    fn formats() {
        assert!(format_matches("date", "2024-02-29"));
        assert!(!format_matches("date", "2023-02-29"));
        assert!(format_matches("ipv4", "10.0.0.1"));
        assert!(!format_matches("email", "nobody"));
    }
}
