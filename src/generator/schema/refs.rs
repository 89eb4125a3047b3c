use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::parse::{detect_openapi, parse_in_dialect};
use super::{Schema, SchemaError, SchemaRef};

/// A root schema together with the document it came from, resolving local
/// `$ref`s. Resolved schemas are cached so that a recursive reference
/// yields the same `Arc` each time.
#[derive(Debug)]
pub struct SchemaSet {
    root: SchemaRef,
    document: Option<Value>,
    openapi: bool,
    cache: Mutex<HashMap<String, SchemaRef>>,
}

impl SchemaSet {
    pub fn from_value(document: Value) -> Result<SchemaSet, SchemaError> {
        let openapi = detect_openapi(&document);
        let root = Arc::new(parse_in_dialect(&document, openapi)?);
        Ok(SchemaSet {
            root,
            document: Some(document),
            openapi,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Wraps an already parsed schema; only `#` and `$defs` references resolve.
    pub fn from_schema(schema: Schema) -> SchemaSet {
        SchemaSet {
            root: Arc::new(schema),
            document: None,
            openapi: false,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &SchemaRef {
        &self.root
    }

    pub fn resolve(&self, reference: &str) -> Result<SchemaRef, SchemaError> {
        if reference == "#" || reference.is_empty() {
            return Ok(self.root.clone());
        }
        if let Ok(cache) = self.cache.lock() {
            if let Some(s) = cache.get(reference) {
                return Ok(s.clone());
            }
        }
        let resolved = self.lookup(reference)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(reference.to_string(), resolved.clone());
        }
        Ok(resolved)
    }

    fn lookup(&self, reference: &str) -> Result<SchemaRef, SchemaError> {
        let unresolved = || SchemaError::UnresolvedRef(reference.to_string());
        let fragment = reference.strip_prefix('#').ok_or_else(unresolved)?;

        if let Some(pointer) = fragment.strip_prefix('/') {
            if let Some(doc) = &self.document {
                let target = doc.pointer(&format!("/{}", pointer)).ok_or_else(unresolved)?;
                return Ok(Arc::new(parse_in_dialect(target, self.openapi)?));
            }
            let mut parts = pointer.splitn(2, '/');
            return match (parts.next(), parts.next()) {
                (Some("$defs"), Some(name)) | (Some("definitions"), Some(name)) => {
                    let name = unescape(name);
                    self.root
                        .defs
                        .iter()
                        .find(|(k, _)| *k == name)
                        .map(|(_, s)| s.clone())
                        .ok_or_else(unresolved)
                }
                _ => Err(unresolved()),
            };
        }

        // plain-name fragment: an $anchor
        if let Some(doc) = &self.document {
            if let Some(found) = find_anchor(doc, fragment) {
                return Ok(Arc::new(parse_in_dialect(found, self.openapi)?));
            }
        }
        find_anchor_in_schema(&self.root, fragment).ok_or_else(unresolved)
    }
}

fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn find_anchor<'a>(value: &'a Value, anchor: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            let matches = |key: &str| map.get(key).and_then(|v| v.as_str()) == Some(anchor);
            if matches("$anchor") || matches("$dynamicAnchor") {
                return Some(value);
            }
            map.values().find_map(|v| find_anchor(v, anchor))
        }
        Value::Array(items) => items.iter().find_map(|v| find_anchor(v, anchor)),
        _ => None,
    }
}

fn find_anchor_in_schema(schema: &SchemaRef, anchor: &str) -> Option<SchemaRef> {
    if schema.anchor.as_deref() == Some(anchor) || schema.dynamic_anchor.as_deref() == Some(anchor) {
        return Some(schema.clone());
    }
    schema.defs.iter().find_map(|(_, s)| find_anchor_in_schema(s, anchor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_defs_and_root() {
        let set = SchemaSet::from_value(json!({
            "type": "object",
            "properties": {"child": {"$ref": "#"}, "id": {"$ref": "#/$defs/id"}},
            "$defs": {"id": {"type": "integer", "$anchor": "ident"}}
        }))
        .unwrap();
        assert!(Arc::ptr_eq(&set.resolve("#").unwrap(), set.root()));
        let id = set.resolve("#/$defs/id").unwrap();
        assert!(Arc::ptr_eq(&id, &set.resolve("#/$defs/id").unwrap()));
        assert!(set.resolve("#ident").is_ok());
        assert!(set.resolve("other.json#/x").is_err());
    }
}
