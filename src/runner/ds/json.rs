//! Conversion between script values and `serde_json::Value`, the form every
//! value takes when it leaves the VM thread.

use std::collections::HashSet;

use serde_json::{Map, Number, Value};

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{array_value, object_value, ObjectType};
use crate::runner::ds::object_property::PropertyMap;
use crate::runner::ds::operations::type_conversion::date_to_iso_string;
use crate::runner::ds::value::{JsNumberType, JsValue};

pub fn json_to_js(value: &Value) -> JsValue {
    match value {
        Value::Null => JsValue::Null,
        Value::Bool(b) => JsValue::Boolean(*b),
        Value::Number(n) => number_to_js(n),
        Value::String(s) => JsValue::String(s.clone()),
        Value::Array(items) => array_value(items.iter().map(json_to_js).collect()),
        Value::Object(map) => {
            let mut props = PropertyMap::new();
            for (k, v) in map {
                props.insert(k.clone(), json_to_js(v));
            }
            object_value(props)
        }
    }
}

pub fn number_to_js(n: &Number) -> JsValue {
    if let Some(i) = n.as_i64() {
        JsValue::Number(JsNumberType::Integer(i))
    } else {
        JsValue::Number(JsNumberType::from_f64(n.as_f64().unwrap_or(f64::NAN)))
    }
}

pub fn f64_to_json(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// JSON semantics: functions and `undefined` are dropped from objects and
/// become `null` inside arrays. Cycles raise a `TypeError`.
pub fn js_to_json(value: &JsValue) -> Result<Value, JErrorType> {
    let mut seen = HashSet::new();
    Ok(js_to_json_inner(value, &mut seen)?.unwrap_or(Value::Null))
}

fn js_to_json_inner(value: &JsValue, seen: &mut HashSet<usize>) -> Result<Option<Value>, JErrorType> {
    Ok(Some(match value {
        JsValue::Undefined => return Ok(None),
        JsValue::Null => Value::Null,
        JsValue::Boolean(b) => Value::Bool(*b),
        JsValue::String(s) => Value::String(s.clone()),
        JsValue::Number(n) => match n {
            JsNumberType::Integer(i) => Value::Number(Number::from(*i)),
            other => f64_to_json(other.as_f64()),
        },
        JsValue::Object(o) => {
            let key = std::rc::Rc::as_ptr(o) as *const u8 as usize;
            if !seen.insert(key) {
                return Err(JErrorType::TypeError(
                    "Converting circular structure to JSON".to_string(),
                ));
            }
            let obj = o
                .try_borrow()
                .map_err(|_| JErrorType::TypeError("Converting circular structure to JSON".to_string()))?;
            let result = match &*obj {
                ObjectType::Function(_) => None,
                ObjectType::Array(a) => {
                    let mut items = Vec::with_capacity(a.elements.len());
                    for e in &a.elements {
                        items.push(js_to_json_inner(e, seen)?.unwrap_or(Value::Null));
                    }
                    Some(Value::Array(items))
                }
                ObjectType::Ordinary(ord) => {
                    let mut map = Map::new();
                    for (k, v) in ord.properties.iter() {
                        if let Some(j) = js_to_json_inner(v, seen)? {
                            map.insert(k.clone(), j);
                        }
                    }
                    Some(Value::Object(map))
                }
                ObjectType::Promise(_) => Some(Value::Object(Map::new())),
                ObjectType::RegExp(_) => Some(Value::Object(Map::new())),
                ObjectType::Date(t) => Some(if t.is_nan() {
                    Value::Null
                } else {
                    Value::String(date_to_iso_string(*t))
                }),
                ObjectType::Host(h) => Some(h.to_json()),
            };
            seen.remove(&key);
            return Ok(result);
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_nested_values_both_ways() {
        let src = json!({"a": 1, "b": [true, null, 2.5], "c": {"d": "x"}});
        let js = json_to_js(&src);
        assert_eq!(js_to_json(&js).unwrap(), src);
    }

    #[test]
    fn undefined_is_dropped_from_objects() {
        let mut props = PropertyMap::new();
        props.insert("a", JsValue::Undefined);
        props.insert("b", JsValue::from_i64(1));
        assert_eq!(js_to_json(&object_value(props)).unwrap(), json!({"b": 1}));
    }
}
