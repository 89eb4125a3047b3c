//! `mokapi.patch` and its `Delete` marker.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::host_object::{HostKind, HostObject};
use crate::runner::ds::object::{new_host_object, object_value, ObjectType};
use crate::runner::ds::object_property::PropertyMap;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::property::{get_property, own_keys};
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::EvalContext;

use super::is_plain_object;

const DELETE_CLASS: &str = "mokapi.Delete";

/// Marker value: a patch property set to it removes the key.
struct DeleteMarker;

impl HostObject for DeleteMarker {
    fn class_name(&self) -> &str {
        DELETE_CLASS
    }

    fn kind(&self) -> HostKind {
        HostKind::Struct
    }

    fn get(&self, _key: &str) -> Result<JsValue, JErrorType> {
        Ok(JsValue::Undefined)
    }

    fn has(&self, _key: &str) -> bool {
        false
    }

    fn keys(&self) -> Vec<String> {
        vec![]
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

pub(crate) fn delete_marker() -> JsValue {
    JsValue::Object(new_host_object(Box::new(DeleteMarker)))
}

fn is_delete(value: &JsValue) -> bool {
    match value {
        JsValue::Object(o) => matches!(&*o.borrow(), ObjectType::Host(h) if h.class_name() == DELETE_CLASS),
        _ => false,
    }
}

/// Returns `target` with `patch` applied. Objects merge key by key,
/// anything else is replaced. Neither argument is modified.
pub(crate) fn patch(ctx: &mut EvalContext, target: &JsValue, patch: &JsValue) -> ValueResult {
    if matches!(patch, JsValue::Undefined) {
        return Ok(target.clone());
    }
    if is_delete(patch) {
        return Ok(JsValue::Undefined);
    }
    if !(is_plain_object(target) && is_plain_object(patch)) {
        return Ok(patch.clone());
    }
    let mut merged = PropertyMap::new();
    for key in own_keys(target) {
        merged.insert(key.clone(), get_property(ctx, target, &key)?);
    }
    for key in own_keys(patch) {
        let change = get_property(ctx, patch, &key)?;
        if is_delete(&change) {
            merged.remove(&key);
            continue;
        }
        let value = match merged.get(&key) {
            Some(current) => {
                let current = current.clone();
                self::patch(ctx, &current, &change)?
            }
            None => strip_markers(ctx, &change)?,
        };
        merged.insert(key, value);
    }
    Ok(object_value(merged))
}

/// Copy of `value` without keys set to the marker.
fn strip_markers(ctx: &mut EvalContext, value: &JsValue) -> ValueResult {
    if !is_plain_object(value) {
        return Ok(value.clone());
    }
    let mut out = PropertyMap::new();
    for key in own_keys(value) {
        let v = get_property(ctx, value, &key)?;
        if !is_delete(&v) {
            let v = strip_markers(ctx, &v)?;
            out.insert(key, v);
        }
    }
    Ok(object_value(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::json::{js_to_json, json_to_js};
    use serde_json::json;

    fn apply(target: serde_json::Value, p: JsValue) -> serde_json::Value {
        let mut ctx = EvalContext::new();
        let out = patch(&mut ctx, &json_to_js(&target), &p).unwrap();
        js_to_json(&out).unwrap()
    }

    #[test]
    fn empty_patch_is_identity() {
        let x = json!({"a": 1, "b": {"c": [1, 2]}});
        assert_eq!(apply(x.clone(), json_to_js(&json!({}))), x);
    }

    #[test]
    fn nested_merge_and_replace() {
        let out = apply(
            json!({"a": 1, "b": {"c": 1, "d": 2}, "e": [1]}),
            json_to_js(&json!({"b": {"d": 3}, "e": [2, 3], "f": "new"})),
        );
        assert_eq!(out, json!({"a": 1, "b": {"c": 1, "d": 3}, "e": [2, 3], "f": "new"}));
    }

    #[test]
    fn delete_marker_removes_keys() {
        let mut props = PropertyMap::new();
        props.insert("a", delete_marker());
        let out = apply(json!({"a": 1, "b": 2}), object_value(props));
        assert_eq!(out, json!({"b": 2}));
    }
}
