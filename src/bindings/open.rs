//! The global `open(path, {as})` and `$ref` inlining for resolved reads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::host::OpenAs;
use crate::modules::normalize;
use crate::runner::ds::json::json_to_js;
use crate::runner::ds::object::array_value;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::arg;

use super::{binding, expect_options, host_error, script_error, string_option, type_error};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("cannot resolve reference '{reference}': {message}")]
    Unresolved { reference: String, message: String },
}

pub(super) fn open(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let path = match arg(&args, 0) {
        JsValue::String(s) => s,
        other => return Err(type_error("path", &other, "String")),
    };
    let options = arg(&args, 1);
    expect_options("options", &options)?;
    let hint = match string_option(ctx, &options, "as")? {
        None => OpenAs::String,
        Some(s) => OpenAs::parse(&s).ok_or_else(|| script_error(format!("unknown open mode '{}'", s)))?,
    };
    let binding = binding(ctx)?;
    let path = normalize(&binding.base_dir.join(path));
    let host = binding.host.clone();
    let record = host.open_file(&path, hint).map_err(host_error)?;
    match hint {
        OpenAs::String => Ok(JsValue::String(record.text())),
        OpenAs::Binary => Ok(array_value(
            record.data.iter().map(|b| JsValue::from_i64(*b as i64)).collect(),
        )),
        OpenAs::Resolved => {
            let document = parse_document(&record.path, &record.text()).map_err(|e| script_error(e.to_string()))?;
            let mut load = |p: &Path| -> Result<Value, ResolveError> {
                let r = host.open_file(p, OpenAs::Resolved).map_err(|e| ResolveError::Unresolved {
                    reference: p.display().to_string(),
                    message: e.to_string(),
                })?;
                parse_document(p, &r.text())
            };
            let resolved =
                resolve_refs(&document, &record.path, &mut load).map_err(|e| script_error(e.to_string()))?;
            Ok(json_to_js(&resolved))
        }
    }
}

/// Parses JSON or YAML, chosen by extension; unknown extensions try JSON
/// first.
pub(crate) fn parse_document(path: &Path, text: &str) -> Result<Value, ResolveError> {
    let parse_error = |message: String| ResolveError::Parse {
        path: path.display().to_string(),
        message,
    };
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(text).map_err(|e| parse_error(e.to_string())),
        Some("json") => serde_json::from_str(text).map_err(|e| parse_error(e.to_string())),
        _ => serde_json::from_str(text)
            .or_else(|_| serde_yaml::from_str(text))
            .map_err(|e| parse_error(e.to_string())),
    }
}

/// Returns `document` with every `{"$ref": ...}` replaced by its target.
/// References are `file#/json/pointer`, `#/pointer` or a bare file, with
/// files relative to the referring document. A reference that leads back
/// into itself is left in place.
pub fn resolve_refs(
    document: &Value,
    path: &Path,
    load: &mut dyn FnMut(&Path) -> Result<Value, ResolveError>,
) -> Result<Value, ResolveError> {
    let mut resolver = Resolver {
        load,
        documents: HashMap::new(),
        stack: vec![],
    };
    let path = normalize(path);
    resolver.documents.insert(path.clone(), document.clone());
    resolver.walk(document, &path)
}

struct Resolver<'a> {
    load: &'a mut dyn FnMut(&Path) -> Result<Value, ResolveError>,
    documents: HashMap<PathBuf, Value>,
    stack: Vec<String>,
}

impl Resolver<'_> {
    fn walk(&mut self, value: &Value, path: &Path) -> Result<Value, ResolveError> {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    return self.follow(reference, value, path);
                }
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.walk(v, path)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => Ok(Value::Array(
                items.iter().map(|v| self.walk(v, path)).collect::<Result<_, _>>()?,
            )),
            other => Ok(other.clone()),
        }
    }

    fn document(&mut self, path: &Path) -> Result<Value, ResolveError> {
        if let Some(doc) = self.documents.get(path) {
            return Ok(doc.clone());
        }
        let doc = (self.load)(path)?;
        self.documents.insert(path.to_path_buf(), doc.clone());
        Ok(doc)
    }

    fn follow(&mut self, reference: &str, original: &Value, path: &Path) -> Result<Value, ResolveError> {
        let (file, pointer) = match reference.split_once('#') {
            Some((f, p)) => (f, p),
            None => (reference, ""),
        };
        let target_path = if file.is_empty() {
            path.to_path_buf()
        } else {
            normalize(&path.parent().unwrap_or_else(|| Path::new("")).join(file))
        };
        let key = format!("{}#{}", target_path.display(), pointer);
        if self.stack.contains(&key) {
            log::debug!("cyclic reference {} left unresolved", reference);
            return Ok(original.clone());
        }
        let document = self.document(&target_path)?;
        let target = if pointer.is_empty() {
            document
        } else {
            document
                .pointer(pointer)
                .cloned()
                .ok_or_else(|| ResolveError::Unresolved {
                    reference: reference.to_string(),
                    message: "pointer does not exist".to_string(),
                })?
        };
        self.stack.push(key);
        let resolved = self.walk(&target, &target_path);
        self.stack.pop();
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_files(p: &Path) -> Result<Value, ResolveError> {
        Err(ResolveError::Unresolved {
            reference: p.display().to_string(),
            message: "not found".to_string(),
        })
    }

    #[test]
    fn local_pointers() {
        let doc = json!({
            "a": {"$ref": "#/defs/x"},
            "defs": {"x": {"type": "string"}}
        });
        let out = resolve_refs(&doc, Path::new("/spec.json"), &mut no_files).unwrap();
        assert_eq!(out["a"], json!({"type": "string"}));
    }

    #[test]
    fn other_files() {
        let doc = json!({"pet": {"$ref": "models.yaml#/Pet"}});
        let mut load = |p: &Path| {
            assert_eq!(p, Path::new("/api/models.yaml"));
            parse_document(p, "Pet:\n  type: object\n")
        };
        let out = resolve_refs(&doc, Path::new("/api/spec.json"), &mut load).unwrap();
        assert_eq!(out["pet"], json!({"type": "object"}));
    }

    #[test]
    fn cycles_stay_references() {
        let doc = json!({"node": {"next": {"$ref": "#/node"}}});
        let out = resolve_refs(&doc, Path::new("/a.json"), &mut no_files).unwrap();
        assert_eq!(out["node"]["next"]["next"], json!({"$ref": "#/node"}));
    }

    #[test]
    fn missing_pointer() {
        let doc = json!({"a": {"$ref": "#/nope"}});
        let err = resolve_refs(&doc, Path::new("/a.json"), &mut no_files).unwrap_err();
        assert!(err.to_string().contains("'#/nope'"));
    }
}
