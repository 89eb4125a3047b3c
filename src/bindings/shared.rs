//! `mokapi.shared`: the process-wide store as seen from a script.
//!
//! Primitives are copied out. Objects and arrays come back as references
//! into the store: reading a field reads the current stored value, writing
//! one writes back through [`SharedStore::modify`].

use serde_json::Value;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::host_object::{HostKind, HostObject};
use crate::runner::ds::json::{js_to_json, json_to_js};
use crate::runner::ds::object::{array_value, new_host_object};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::call_value;
use crate::runner::std_lib::arg;
use crate::shared::{SharedError, SharedStore};

use super::{function, object, type_error};

impl From<SharedError> for JErrorType {
    fn from(e: SharedError) -> Self {
        JErrorType::TypeError(e.to_string())
    }
}

pub(crate) fn shared_object(store: SharedStore) -> JsValue {
    let s = store.clone();
    let get = function("get", move |_ctx, _this, args| {
        let key = key_arg(&args)?;
        Ok(match s.get(&key) {
            Some(v) => reference(&s, &key, vec![], &v),
            None => JsValue::Undefined,
        })
    });
    let s = store.clone();
    let set = function("set", move |_ctx, _this, args| {
        let key = key_arg(&args)?;
        s.set(&key, js_to_json(&arg(&args, 1))?);
        Ok(JsValue::Undefined)
    });
    let s = store.clone();
    let has = function("has", move |_ctx, _this, args| Ok(JsValue::Boolean(s.has(&key_arg(&args)?))));
    let s = store.clone();
    let delete = function("delete", move |_ctx, _this, args| {
        Ok(JsValue::Boolean(s.delete(&key_arg(&args)?)))
    });
    let s = store.clone();
    let clear = function("clear", move |_ctx, _this, _args| {
        s.clear();
        Ok(JsValue::Undefined)
    });
    let s = store.clone();
    let keys = function("keys", move |_ctx, _this, _args| {
        Ok(array_value(s.keys().into_iter().map(JsValue::String).collect()))
    });
    let s = store.clone();
    let update = function("update", move |ctx, _this, args| {
        let key = key_arg(&args)?;
        let f = arg(&args, 1);
        if !f.is_callable() {
            return Err(type_error("update", &f, "Function"));
        }
        let next = s.update(&key, |current| {
            let current = current.as_ref().map(json_to_js).unwrap_or(JsValue::Undefined);
            let result = call_value(ctx, &f, JsValue::Undefined, vec![current])?;
            js_to_json(&result)
        })?;
        Ok(reference(&s, &key, vec![], &next))
    });
    let s = store;
    let namespace = function("namespace", move |_ctx, _this, args| {
        let name = key_arg(&args)?;
        Ok(shared_object(s.namespace(&name)))
    });
    object(vec![
        ("get", get),
        ("set", set),
        ("has", has),
        ("delete", delete),
        ("clear", clear),
        ("keys", keys),
        ("update", update),
        ("namespace", namespace),
    ])
}

fn key_arg(args: &[JsValue]) -> Result<String, JErrorType> {
    match arg(args, 0) {
        JsValue::String(s) => Ok(s),
        other => Err(type_error("key", &other, "String")),
    }
}

/// Script value for the stored `value` found at `key` + `path`.
fn reference(store: &SharedStore, key: &str, path: Vec<String>, value: &Value) -> JsValue {
    match value {
        Value::Object(_) | Value::Array(_) => JsValue::Object(new_host_object(Box::new(SharedRef {
            store: store.clone(),
            key: key.to_string(),
            path,
            sequence: value.is_array(),
        }))),
        other => json_to_js(other),
    }
}

struct SharedRef {
    store: SharedStore,
    key: String,
    path: Vec<String>,
    sequence: bool,
}

fn at_path<'a>(mut value: &'a Value, path: &[String]) -> Option<&'a Value> {
    for segment in path {
        value = match value {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}

fn at_path_mut<'a>(mut value: &'a mut Value, path: &[String]) -> Option<&'a mut Value> {
    for segment in path {
        value = match value {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}

impl SharedRef {
    fn current(&self) -> Option<Value> {
        let root = self.store.get(&self.key)?;
        at_path(&root, &self.path).cloned()
    }

    fn stale(&self) -> JErrorType {
        JErrorType::TypeError(format!("shared value '{}' no longer exists", self.key))
    }

    fn child_path(&self, key: &str) -> Vec<String> {
        let mut path = self.path.clone();
        path.push(key.to_string());
        path
    }
}

impl HostObject for SharedRef {
    fn class_name(&self) -> &str {
        if self.sequence {
            "SharedArray"
        } else {
            "SharedObject"
        }
    }

    fn kind(&self) -> HostKind {
        if self.sequence {
            HostKind::Sequence
        } else {
            HostKind::Map
        }
    }

    fn get(&self, key: &str) -> Result<JsValue, JErrorType> {
        let current = match self.current() {
            Some(v) => v,
            None => return Ok(JsValue::Undefined),
        };
        if key == "length" {
            if let Value::Array(items) = &current {
                return Ok(JsValue::from_i64(items.len() as i64));
            }
        }
        Ok(match at_path(&current, &[key.to_string()]) {
            Some(v) => reference(&self.store, &self.key, self.child_path(key), v),
            None => JsValue::Undefined,
        })
    }

    fn set(&mut self, key: &str, value: JsValue) -> Result<(), JErrorType> {
        let value = js_to_json(&value)?;
        let key = key.to_string();
        let path = self.path.clone();
        let written = self.store.modify(&self.key, move |root| match at_path_mut(root, &path) {
            Some(Value::Object(map)) => {
                map.insert(key, value);
                Ok(())
            }
            Some(Value::Array(items)) => {
                let index: usize = key
                    .parse()
                    .map_err(|_| JErrorType::TypeError(format!("invalid array index '{}'", key)))?;
                if index >= items.len() {
                    items.resize(index + 1, Value::Null);
                }
                items[index] = value;
                Ok(())
            }
            _ => Err(JErrorType::TypeError(format!("cannot set '{}' on a primitive", key))),
        });
        written.ok_or_else(|| self.stale())?
    }

    fn delete(&mut self, key: &str) -> Result<bool, JErrorType> {
        let key = key.to_string();
        let path = self.path.clone();
        Ok(self
            .store
            .modify(&self.key, move |root| match at_path_mut(root, &path) {
                Some(Value::Object(map)) => map.shift_remove(&key).is_some(),
                _ => false,
            })
            .unwrap_or(false))
    }

    fn has(&self, key: &str) -> bool {
        match self.current() {
            Some(v) => at_path(&v, &[key.to_string()]).is_some(),
            None => false,
        }
    }

    fn keys(&self) -> Vec<String> {
        match self.current() {
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            Some(Value::Array(items)) => (0..items.len()).map(|i| i.to_string()).collect(),
            _ => vec![],
        }
    }

    fn to_json(&self) -> Value {
        self.current().unwrap_or(Value::Null)
    }

    fn length(&self) -> Option<usize> {
        match self.current() {
            Some(Value::Array(items)) => Some(items.len()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::eval::property::{get_property, put_property};
    use crate::runner::eval::types::ValueResult;
    use crate::runner::plugin::types::EvalContext;

    fn call(ctx: &mut EvalContext, shared: &JsValue, name: &str, args: Vec<JsValue>) -> ValueResult {
        let f = get_property(ctx, shared, name)?;
        call_value(ctx, &f, shared.clone(), args)
    }

    #[test]
    fn objects_write_back() {
        let mut ctx = EvalContext::with_core_builtins();
        let store = SharedStore::new();
        store.set("user", serde_json::json!({"name": "a", "tags": ["x"]}));
        let shared = shared_object(store.clone());
        let user = call(&mut ctx, &shared, "get", vec![JsValue::str("user")]).unwrap();
        put_property(&mut ctx, &user, "name", JsValue::str("b")).unwrap();
        let tags = get_property(&mut ctx, &user, "tags").unwrap();
        put_property(&mut ctx, &tags, "1", JsValue::str("y")).unwrap();
        assert_eq!(store.get("user"), Some(serde_json::json!({"name": "b", "tags": ["x", "y"]})));
    }

    #[test]
    fn update_and_namespaces() {
        let mut ctx = EvalContext::with_core_builtins();
        let store = SharedStore::new();
        let shared = shared_object(store.clone());
        let inc = function("inc", |_ctx, _this, args| match arg(&args, 0) {
            JsValue::Undefined => Ok(JsValue::from_i64(1)),
            v => Ok(JsValue::from_f64(v.as_f64().unwrap_or(0.0) + 1.0)),
        });
        call(&mut ctx, &shared, "update", vec![JsValue::str("n"), inc.clone()]).unwrap();
        call(&mut ctx, &shared, "update", vec![JsValue::str("n"), inc]).unwrap();
        assert_eq!(store.get("n"), Some(serde_json::json!(2)));

        let ns = call(&mut ctx, &shared, "namespace", vec![JsValue::str("child")]).unwrap();
        call(&mut ctx, &ns, "set", vec![JsValue::str("k"), JsValue::str("v")]).unwrap();
        call(&mut ctx, &shared, "clear", vec![]).unwrap();
        assert!(!store.has("n"));
        assert_eq!(store.namespace("child").get("k"), Some(serde_json::json!("v")));
    }

    #[test]
    fn key_must_be_string() {
        let mut ctx = EvalContext::with_core_builtins();
        let shared = shared_object(SharedStore::new());
        let err = call(&mut ctx, &shared, "get", vec![JsValue::from_i64(1)]).unwrap_err();
        assert_eq!(err.get_message(), "unexpected type for 'key': got Integer, expected String");
    }
}
