//! `mokapi.marshal`: values to JSON, plain text or XML.

use serde_json::Value;
use thiserror::Error;

use crate::generator::schema::{validate, Schema, SchemaRef, SchemaSet, ValidationError};

#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("marshal data failed: {0}")]
    Invalid(#[from] ValidationError),

    #[error("unsupported content type '{0}'")]
    UnsupportedContentType(String),

    #[error("marshal data failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encodes `value` for `content_type`. With a schema the value is validated
/// first and, for XML, the schema's `xml` metadata names elements and
/// attributes.
pub fn marshal(value: &Value, schema: Option<&SchemaSet>, content_type: &str) -> Result<String, MarshalError> {
    if let Some(set) = schema {
        validate(value, set.root(), Some(set))?;
    }
    let media = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match media.as_str() {
        "" | "application/json" => Ok(serde_json::to_string(value)?),
        m if m.ends_with("+json") => Ok(serde_json::to_string(value)?),
        "text/plain" => Ok(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }),
        "application/xml" | "text/xml" => {
            let mut out = String::new();
            let root = schema.map(|s| s.root().clone());
            let name = root
                .as_ref()
                .and_then(|s| s.xml.as_ref().and_then(|x| x.name.clone()))
                .unwrap_or_else(|| "data".to_string());
            XmlWriter { set: schema }.element(&mut out, &name, value, root.as_ref());
            Ok(out)
        }
        m if m.ends_with("+xml") => marshal(value, None, "application/xml"),
        other => Err(MarshalError::UnsupportedContentType(other.to_string())),
    }
}

struct XmlWriter<'a> {
    set: Option<&'a SchemaSet>,
}

impl XmlWriter<'_> {
    fn resolve(&self, schema: Option<&SchemaRef>) -> Option<SchemaRef> {
        let schema = schema?;
        match (&schema.reference, self.set) {
            (Some(reference), Some(set)) => set.resolve(reference).ok().or_else(|| Some(schema.clone())),
            _ => Some(schema.clone()),
        }
    }

    fn property_schema(&self, schema: Option<&SchemaRef>, name: &str) -> Option<SchemaRef> {
        self.resolve(schema.and_then(|s| s.property(name)))
    }

    fn element(&self, out: &mut String, name: &str, value: &Value, schema: Option<&SchemaRef>) {
        let schema = self.resolve(schema);
        let tag = qualified(name, schema.as_deref());
        match value {
            Value::Object(map) => {
                out.push('<');
                out.push_str(&tag);
                push_namespace(out, schema.as_deref());
                let mut children = vec![];
                for (key, v) in map {
                    let prop = self.property_schema(schema.as_ref(), key);
                    let xml = prop.as_ref().and_then(|p| p.xml.clone()).unwrap_or_default();
                    let prop_name = xml.name.clone().unwrap_or_else(|| key.clone());
                    if xml.attribute {
                        out.push_str(&format!(" {}=\"{}\"", prop_name, escape(&scalar_text(v))));
                    } else {
                        children.push((prop_name, v, prop));
                    }
                }
                if children.is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for (child_name, v, prop) in children {
                    match v {
                        Value::Array(items) => self.array(out, &child_name, items, prop.as_ref()),
                        _ => self.element(out, &child_name, v, prop.as_ref()),
                    }
                }
                out.push_str(&format!("</{}>", tag));
            }
            Value::Array(items) => {
                let wrapped = schema.as_ref().map(|s| is_wrapped(s)).unwrap_or(true);
                if wrapped {
                    self.array(out, name, items, schema.as_ref());
                } else {
                    out.push_str(&format!("<{}>", tag));
                    self.array(out, name, items, schema.as_ref());
                    out.push_str(&format!("</{}>", tag));
                }
            }
            Value::Null => out.push_str(&format!("<{}/>", tag)),
            scalar => {
                out.push_str(&format!("<{}", tag));
                push_namespace(out, schema.as_deref());
                out.push('>');
                out.push_str(&escape(&scalar_text(scalar)));
                out.push_str(&format!("</{}>", tag));
            }
        }
    }

    /// Items of an array property: wrapped in one element named `name`
    /// when the schema says so, otherwise repeated as `name`.
    fn array(&self, out: &mut String, name: &str, items: &[Value], schema: Option<&SchemaRef>) {
        let item_schema = self.resolve(schema.and_then(|s| s.items.as_ref()).and_then(|i| i.schema()));
        let item_name = item_schema
            .as_ref()
            .and_then(|s| s.xml.as_ref().and_then(|x| x.name.clone()))
            .unwrap_or_else(|| name.to_string());
        let wrapped = schema.map(|s| is_wrapped(s)).unwrap_or(false);
        if wrapped {
            let tag = qualified(name, schema.map(|s| &**s));
            out.push_str(&format!("<{}>", tag));
            for item in items {
                self.element(out, &item_name, item, item_schema.as_ref());
            }
            out.push_str(&format!("</{}>", tag));
        } else {
            for item in items {
                self.element(out, &item_name, item, item_schema.as_ref());
            }
        }
    }
}

fn is_wrapped(schema: &Schema) -> bool {
    schema.xml.as_ref().map(|x| x.wrapped).unwrap_or(false)
}

fn qualified(name: &str, schema: Option<&Schema>) -> String {
    match schema.and_then(|s| s.xml.as_ref()).and_then(|x| x.prefix.as_deref()) {
        Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, name),
        _ => name.to_string(),
    }
}

fn push_namespace(out: &mut String, schema: Option<&Schema>) {
    if let Some(xml) = schema.and_then(|s| s.xml.as_ref()) {
        if let Some(ns) = &xml.namespace {
            match xml.prefix.as_deref() {
                Some(prefix) if !prefix.is_empty() => out.push_str(&format!(" xmlns:{}=\"{}\"", prefix, escape(ns))),
                _ => out.push_str(&format!(" xmlns=\"{}\"", escape(ns))),
            }
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(schema: Value) -> SchemaSet {
        SchemaSet::from_value(schema).unwrap()
    }

    #[test]
    fn json_and_text() {
        let v = json!({"a": [1, "x"]});
        assert_eq!(marshal(&v, None, "application/json").unwrap(), r#"{"a":[1,"x"]}"#);
        assert_eq!(marshal(&json!("hi"), None, "text/plain").unwrap(), "hi");
        assert_eq!(marshal(&json!(12), None, "text/plain; charset=utf-8").unwrap(), "12");
        assert!(matches!(
            marshal(&v, None, "image/png"),
            Err(MarshalError::UnsupportedContentType(_))
        ));
    }

    #[test]
    fn validates_against_schema() {
        let s = set(json!({"type": "object", "required": ["id"]}));
        let err = marshal(&json!({}), Some(&s), "application/json").unwrap_err();
        assert!(err.to_string().starts_with("marshal data failed"));
    }

    #[test]
    fn xml_with_metadata() {
        let s = set(json!({
            "type": "object",
            "xml": {"name": "pet"},
            "properties": {
                "id": {"type": "integer", "xml": {"attribute": true}},
                "name": {"type": "string"},
                "tags": {
                    "type": "array",
                    "xml": {"wrapped": true},
                    "items": {"type": "string", "xml": {"name": "tag"}}
                }
            }
        }));
        let v = json!({"id": 7, "name": "Rex & co", "tags": ["a", "b"]});
        assert_eq!(
            marshal(&v, Some(&s), "application/xml").unwrap(),
            r#"<pet id="7"><name>Rex &amp; co</name><tags><tag>a</tag><tag>b</tag></tags></pet>"#
        );
    }

    #[test]
    fn xml_unwrapped_arrays_repeat() {
        let v = json!({"item": [1, 2]});
        assert_eq!(
            marshal(&v, None, "application/xml").unwrap(),
            "<data><item>1</item><item>2</item></data>"
        );
    }
}
