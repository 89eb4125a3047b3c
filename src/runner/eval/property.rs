//! Property access on every kind of value: own properties, the prototype
//! chain of script-constructed objects, built-in prototype methods and host
//! objects.

use std::rc::Rc;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function_object::FunctionKind;
use crate::runner::ds::object::{new_object, JsObjectType, ObjectType};
use crate::runner::ds::object_property::PropertyMap;
use crate::runner::ds::operations::type_conversion::to_array_index;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::EvalContext;

use super::types::ValueResult;

fn describe_base(base: &JsValue) -> &'static str {
    match base {
        JsValue::Undefined => "undefined",
        _ => "null",
    }
}

fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Character at a UTF-16 index, as scripts index strings.
pub fn string_index(s: &str, idx: usize) -> Option<String> {
    let units: Vec<u16> = s.encode_utf16().collect();
    let unit = *units.get(idx)?;
    Some(match char::decode_utf16([unit]).next() {
        Some(Ok(c)) => c.to_string(),
        _ => {
            // Half of a surrogate pair: return the whole character when possible.
            let end = (idx + 2).min(units.len());
            let start = idx.saturating_sub(1);
            String::from_utf16_lossy(&units[start..end])
        }
    })
}

pub fn get_property(ctx: &mut EvalContext, base: &JsValue, key: &str) -> ValueResult {
    match base {
        JsValue::Undefined | JsValue::Null => Err(JErrorType::TypeError(format!(
            "Cannot read properties of {} (reading '{}')",
            describe_base(base),
            key
        ))),
        JsValue::String(s) => {
            if key == "length" {
                return Ok(JsValue::from_i64(utf16_len(s) as i64));
            }
            if let Some(idx) = to_array_index(key) {
                return Ok(string_index(s, idx).map(JsValue::String).unwrap_or(JsValue::Undefined));
            }
            Ok(ctx.prototype_method("String", key).unwrap_or(JsValue::Undefined))
        }
        JsValue::Number(_) => Ok(ctx.prototype_method("Number", key).unwrap_or(JsValue::Undefined)),
        JsValue::Boolean(_) => Ok(ctx.prototype_method("Boolean", key).unwrap_or(JsValue::Undefined)),
        JsValue::Object(o) => get_object_property(ctx, o, key),
    }
}

fn get_object_property(ctx: &mut EvalContext, o: &JsObjectType, key: &str) -> ValueResult {
    let tag = {
        let obj = o.borrow();
        match &*obj {
            ObjectType::Ordinary(ord) => {
                if let Some(v) = ord.properties.get(key) {
                    return Ok(v.clone());
                }
                if let Some(proto) = ord.proto.clone() {
                    drop(obj);
                    let inherited = get_object_property(ctx, &proto, key)?;
                    if !matches!(inherited, JsValue::Undefined) {
                        return Ok(inherited);
                    }
                    return Ok(ctx.prototype_method("Object", key).unwrap_or(JsValue::Undefined));
                }
                "Object"
            }
            ObjectType::Array(a) => {
                if key == "length" {
                    return Ok(JsValue::from_i64(a.elements.len() as i64));
                }
                if let Some(idx) = to_array_index(key) {
                    return Ok(a.elements.get(idx).cloned().unwrap_or(JsValue::Undefined));
                }
                "Array"
            }
            ObjectType::Function(f) => {
                if let Some(v) = f.properties.get(key) {
                    return Ok(v.clone());
                }
                match key {
                    "name" => return Ok(JsValue::String(f.name.clone())),
                    "length" => {
                        let n = match &f.kind {
                            FunctionKind::Script(s) => s.data.params.len(),
                            _ => 0,
                        };
                        return Ok(JsValue::from_i64(n as i64));
                    }
                    "prototype" if f.is_constructor() && matches!(f.kind, FunctionKind::Script(_)) => {
                        drop(obj);
                        return Ok(JsValue::Object(function_prototype(o)));
                    }
                    _ => {}
                }
                "Function"
            }
            ObjectType::RegExp(r) => match key {
                "source" => return Ok(JsValue::String(r.source.clone())),
                "flags" => return Ok(JsValue::String(r.flags.clone())),
                "global" => return Ok(JsValue::Boolean(r.flags.contains('g'))),
                "ignoreCase" => return Ok(JsValue::Boolean(r.flags.contains('i'))),
                "multiline" => return Ok(JsValue::Boolean(r.flags.contains('m'))),
                "lastIndex" => return Ok(JsValue::from_i64(r.last_index as i64)),
                _ => "RegExp",
            },
            ObjectType::Host(h) => {
                let v = h.get(key)?;
                if !matches!(v, JsValue::Undefined) || h.has(key) {
                    return Ok(v);
                }
                obj.prototype_tag()
            }
            other => other.prototype_tag(),
        }
    };
    Ok(ctx.prototype_method(tag, key).unwrap_or(JsValue::Undefined))
}

/// `F.prototype` of a script constructor, created on first use.
pub fn function_prototype(f: &JsObjectType) -> JsObjectType {
    if let ObjectType::Function(func) = &*f.borrow() {
        if let Some(JsValue::Object(p)) = func.properties.get("prototype") {
            return p.clone();
        }
    }
    let proto = new_object(PropertyMap::new());
    if let Some(props) = f.borrow_mut().properties_mut() {
        props.insert("prototype", JsValue::Object(proto.clone()));
    }
    proto
}

pub fn put_property(_ctx: &mut EvalContext, base: &JsValue, key: &str, value: JsValue) -> Result<(), JErrorType> {
    let o = match base {
        JsValue::Undefined | JsValue::Null => {
            return Err(JErrorType::TypeError(format!(
                "Cannot set properties of {} (setting '{}')",
                describe_base(base),
                key
            )))
        }
        JsValue::Object(o) => o,
        _ => return Ok(()),
    };
    let mut obj = o.borrow_mut();
    match &mut *obj {
        ObjectType::Ordinary(ord) => {
            if !ord.frozen {
                ord.properties.insert(key, value);
            }
        }
        ObjectType::Array(a) => {
            if key == "length" {
                let len = value.as_f64().unwrap_or(f64::NAN);
                if !(len >= 0.0 && len.fract() == 0.0) {
                    return Err(JErrorType::RangeError("Invalid array length".to_string()));
                }
                a.elements.resize(len as usize, JsValue::Undefined);
            } else if let Some(idx) = to_array_index(key) {
                if idx >= a.elements.len() {
                    a.elements.resize(idx + 1, JsValue::Undefined);
                }
                a.elements[idx] = value;
            }
        }
        ObjectType::Function(f) => f.properties.insert(key, value),
        ObjectType::RegExp(r) => {
            if key == "lastIndex" {
                r.last_index = value.as_f64().map(|n| n.max(0.0) as usize).unwrap_or(0);
            }
        }
        ObjectType::Host(h) => h.set(key, value)?,
        ObjectType::Promise(_) | ObjectType::Date(_) => {}
    }
    Ok(())
}

pub fn delete_property(base: &JsValue, key: &str) -> Result<bool, JErrorType> {
    let o = match base {
        JsValue::Undefined | JsValue::Null => {
            return Err(JErrorType::TypeError(format!(
                "Cannot convert {} to object",
                describe_base(base)
            )))
        }
        JsValue::Object(o) => o,
        _ => return Ok(true),
    };
    let mut obj = o.borrow_mut();
    Ok(match &mut *obj {
        ObjectType::Ordinary(ord) => {
            if ord.frozen {
                false
            } else {
                ord.properties.remove(key);
                true
            }
        }
        ObjectType::Array(a) => {
            if let Some(idx) = to_array_index(key) {
                if idx < a.elements.len() {
                    a.elements[idx] = JsValue::Undefined;
                }
            }
            true
        }
        ObjectType::Function(f) => {
            f.properties.remove(key);
            true
        }
        ObjectType::Host(h) => h.delete(key)?,
        _ => true,
    })
}

/// The `in` operator.
pub fn has_property(ctx: &mut EvalContext, base: &JsValue, key: &str) -> Result<bool, JErrorType> {
    let o = match base {
        JsValue::Object(o) => o.clone(),
        other => {
            return Err(JErrorType::TypeError(format!(
                "Cannot use 'in' operator to search for '{}' in {}",
                key, other
            )))
        }
    };
    let proto = {
        let obj = o.borrow();
        match &*obj {
            ObjectType::Ordinary(ord) => {
                if ord.properties.contains_key(key) {
                    return Ok(true);
                }
                ord.proto.clone()
            }
            ObjectType::Array(a) => {
                if key == "length" {
                    return Ok(true);
                }
                if let Some(idx) = to_array_index(key) {
                    return Ok(idx < a.elements.len());
                }
                None
            }
            ObjectType::Function(f) => {
                if f.properties.contains_key(key) {
                    return Ok(true);
                }
                None
            }
            ObjectType::Host(h) => return Ok(h.has(key)),
            _ => None,
        }
    };
    if let Some(p) = proto {
        return has_property(ctx, &JsValue::Object(p), key);
    }
    let tag = o.borrow().prototype_tag();
    Ok(ctx.prototype_method(tag, key).is_some())
}

/// Own enumerable keys in iteration order.
pub fn own_keys(value: &JsValue) -> Vec<String> {
    match value {
        JsValue::String(s) => (0..utf16_len(s)).map(|i| i.to_string()).collect(),
        JsValue::Object(o) => match &*o.borrow() {
            ObjectType::Ordinary(ord) => ord.properties.keys().cloned().collect(),
            ObjectType::Array(a) => (0..a.elements.len()).map(|i| i.to_string()).collect(),
            ObjectType::Function(f) => f
                .properties
                .keys()
                .filter(|k| k.as_str() != "prototype")
                .cloned()
                .collect(),
            ObjectType::Host(h) => h.keys(),
            _ => vec![],
        },
        _ => vec![],
    }
}

/// Collects the values produced by iterating `value` (`for-of`, spread,
/// array destructuring).
pub fn iterate_to_vec(ctx: &mut EvalContext, value: &JsValue) -> Result<Vec<JsValue>, JErrorType> {
    match value {
        JsValue::String(s) => Ok(s.chars().map(|c| JsValue::String(c.to_string())).collect()),
        JsValue::Object(o) => {
            let length = {
                let obj = o.borrow();
                match &*obj {
                    ObjectType::Array(a) => return Ok(a.elements.clone()),
                    ObjectType::Host(h) if obj.is_array() => h.length().unwrap_or(0),
                    _ => {
                        return Err(JErrorType::TypeError(format!("{} is not iterable", value)))
                    }
                }
            };
            let mut out = Vec::with_capacity(length);
            for i in 0..length {
                out.push(get_object_property(ctx, o, &i.to_string())?);
            }
            Ok(out)
        }
        other => Err(JErrorType::TypeError(format!("{} is not iterable", other))),
    }
}

/// Copies own enumerable properties of `source` onto `target` (object spread
/// and `Object.assign`).
pub fn copy_own_properties(
    ctx: &mut EvalContext,
    target: &JsObjectType,
    source: &JsValue,
    exclude: &[String],
) -> Result<(), JErrorType> {
    if source.is_nullish() {
        return Ok(());
    }
    let target_value = JsValue::Object(target.clone());
    for key in own_keys(source) {
        if exclude.contains(&key) {
            continue;
        }
        let v = get_property(ctx, source, &key)?;
        put_property(ctx, &target_value, &key, v)?;
    }
    Ok(())
}

/// Walks the prototype chain of `value` looking for `proto`.
pub fn has_in_prototype_chain(value: &JsValue, proto: &JsObjectType) -> bool {
    let mut current = match value {
        JsValue::Object(o) => match &*o.borrow() {
            ObjectType::Ordinary(ord) => ord.proto.clone(),
            _ => None,
        },
        _ => None,
    };
    while let Some(p) = current {
        if Rc::ptr_eq(&p, proto) {
            return true;
        }
        current = match &*p.borrow() {
            ObjectType::Ordinary(ord) => ord.proto.clone(),
            _ => None,
        };
    }
    false
}

/// Creates an ordinary object inheriting from `proto`.
pub fn object_with_proto(proto: Option<JsObjectType>) -> JsObjectType {
    let obj = new_object(PropertyMap::new());
    if let ObjectType::Ordinary(ord) = &mut *obj.borrow_mut() {
        ord.proto = proto;
    }
    obj
}
