//! Object and Function built-ins.
//!
//! `Object.prototype` methods are the fallback for every value, so
//! `hasOwnProperty` and `toString` work on arrays, functions and host
//! objects alike.

use std::cell::RefCell;
use std::rc::Rc;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function_object::{FunctionKind, FunctionObject};
use crate::runner::ds::object::{array_value, new_object, ObjectType};
use crate::runner::ds::object_property::PropertyMap;
use crate::runner::ds::operations::type_conversion::{to_property_key, to_string};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::call_value;
use crate::runner::eval::property::{
    copy_own_properties, get_property, iterate_to_vec, object_with_proto, own_keys, put_property,
};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

use super::arg;

/// Register the Object and Function built-ins with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let object = BuiltInObject::new("Object")
        .with_constructor(object_constructor)
        .add_method("keys", object_keys)
        .add_method("values", object_values)
        .add_method("entries", object_entries)
        .add_method("assign", object_assign)
        .add_method("fromEntries", object_from_entries)
        .add_method("freeze", object_freeze)
        .add_method("isFrozen", object_is_frozen)
        .add_method("create", object_create)
        .add_method("getPrototypeOf", object_get_prototype_of)
        .add_method("defineProperty", object_define_property)
        .add_prototype_method("toString", object_to_string)
        .add_prototype_method("toLocaleString", object_to_string)
        .add_prototype_method("valueOf", object_value_of)
        .add_prototype_method("hasOwnProperty", object_has_own_property);

    let function = BuiltInObject::new("Function")
        .add_prototype_method("call", function_call)
        .add_prototype_method("apply", function_apply)
        .add_prototype_method("bind", function_bind)
        .add_prototype_method("toString", object_to_string);

    registry.register_object(object);
    registry.register_object(function);
}

fn require_object(value: &JsValue) -> Result<(), JErrorType> {
    if value.is_nullish() {
        return Err(JErrorType::TypeError(
            "Cannot convert undefined or null to object".to_string(),
        ));
    }
    Ok(())
}

fn object_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    match arg(&args, 0) {
        v @ JsValue::Object(_) => Ok(v),
        _ => Ok(JsValue::Object(new_object(PropertyMap::new()))),
    }
}

fn object_keys(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let target = arg(&args, 0);
    require_object(&target)?;
    Ok(array_value(own_keys(&target).into_iter().map(JsValue::String).collect()))
}

fn object_values(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let target = arg(&args, 0);
    require_object(&target)?;
    let mut values = Vec::new();
    for key in own_keys(&target) {
        values.push(get_property(ctx, &target, &key)?);
    }
    Ok(array_value(values))
}

fn object_entries(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let target = arg(&args, 0);
    require_object(&target)?;
    let mut entries = Vec::new();
    for key in own_keys(&target) {
        let v = get_property(ctx, &target, &key)?;
        entries.push(array_value(vec![JsValue::String(key), v]));
    }
    Ok(array_value(entries))
}

fn object_assign(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let target = match arg(&args, 0) {
        JsValue::Object(o) => o,
        other => {
            require_object(&other)?;
            return Ok(other);
        }
    };
    for source in args.iter().skip(1) {
        copy_own_properties(ctx, &target, source, &[])?;
    }
    Ok(JsValue::Object(target))
}

fn object_from_entries(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let entries = iterate_to_vec(ctx, &arg(&args, 0))?;
    let target = JsValue::Object(new_object(PropertyMap::new()));
    for entry in entries {
        let key = get_property(ctx, &entry, "0")?;
        let value = get_property(ctx, &entry, "1")?;
        put_property(ctx, &target, &to_property_key(&key), value)?;
    }
    Ok(target)
}

fn object_freeze(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let target = arg(&args, 0);
    if let JsValue::Object(o) = &target {
        if let ObjectType::Ordinary(ord) = &mut *o.borrow_mut() {
            ord.frozen = true;
        }
    }
    Ok(target)
}

fn object_is_frozen(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let frozen = match arg(&args, 0) {
        JsValue::Object(o) => match &*o.borrow() {
            ObjectType::Ordinary(ord) => ord.frozen,
            _ => false,
        },
        _ => true,
    };
    Ok(JsValue::Boolean(frozen))
}

fn object_create(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let proto = match arg(&args, 0) {
        JsValue::Object(o) => Some(o),
        JsValue::Null => None,
        other => {
            return Err(JErrorType::TypeError(format!(
                "Object prototype may only be an Object or null: {}",
                other
            )))
        }
    };
    let obj = object_with_proto(proto);
    let props = arg(&args, 1);
    if !props.is_nullish() {
        for key in own_keys(&props) {
            let descriptor = get_property(ctx, &props, &key)?;
            let value = get_property(ctx, &descriptor, "value")?;
            put_property(ctx, &JsValue::Object(obj.clone()), &key, value)?;
        }
    }
    Ok(JsValue::Object(obj))
}

fn object_get_prototype_of(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let target = arg(&args, 0);
    require_object(&target)?;
    if let JsValue::Object(o) = &target {
        if let ObjectType::Ordinary(ord) = &*o.borrow() {
            if let Some(p) = &ord.proto {
                return Ok(JsValue::Object(p.clone()));
            }
        }
    }
    Ok(JsValue::Null)
}

/// Only data descriptors are honoured; accessors are rejected.
fn object_define_property(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let target = arg(&args, 0);
    if !matches!(target, JsValue::Object(_)) {
        return Err(JErrorType::TypeError(
            "Object.defineProperty called on non-object".to_string(),
        ));
    }
    let key = to_property_key(&arg(&args, 1));
    let descriptor = arg(&args, 2);
    for accessor in ["get", "set"] {
        if !matches!(get_property(ctx, &descriptor, accessor)?, JsValue::Undefined) {
            return Err(JErrorType::TypeError(format!(
                "Property accessors are not supported: '{}'",
                key
            )));
        }
    }
    let value = get_property(ctx, &descriptor, "value")?;
    put_property(ctx, &target, &key, value)?;
    Ok(target)
}

fn object_to_string(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = match &this {
        JsValue::Undefined => "[object Undefined]".to_string(),
        JsValue::Null => "[object Null]".to_string(),
        JsValue::Object(o) => {
            let tag = {
                let obj = o.borrow();
                match &*obj {
                    ObjectType::Ordinary(ord)
                        if ord.class_name == "Object" && !ord.properties.contains_key("message") =>
                    {
                        Some("Object".to_string())
                    }
                    ObjectType::Host(h) if !obj.is_array() => Some(h.class_name().to_string()),
                    _ => None,
                }
            };
            match tag {
                Some(tag) => format!("[object {}]", tag),
                None => to_string(&this),
            }
        }
        other => to_string(other),
    };
    Ok(JsValue::String(s))
}

fn object_value_of(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(this)
}

fn object_has_own_property(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    require_object(&this)?;
    let key = to_property_key(&arg(&args, 0));
    let has = match &this {
        JsValue::Object(o) => match &*o.borrow() {
            ObjectType::Ordinary(ord) => ord.properties.contains_key(&key),
            ObjectType::Function(f) => f.properties.contains_key(&key),
            ObjectType::Array(a) => {
                key == "length" || key.parse::<usize>().map(|i| i < a.elements.len()).unwrap_or(false)
            }
            ObjectType::Host(h) => h.has(&key),
            _ => false,
        },
        other => own_keys(other).contains(&key),
    };
    Ok(JsValue::Boolean(has))
}

fn function_call(ctx: &mut EvalContext, this: JsValue, mut args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let this_arg = if args.is_empty() {
        JsValue::Undefined
    } else {
        args.remove(0)
    };
    call_value(ctx, &this, this_arg, args)
}

fn function_apply(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let list = match arg(&args, 1) {
        JsValue::Undefined | JsValue::Null => vec![],
        v => iterate_to_vec(ctx, &v)?,
    };
    call_value(ctx, &this, arg(&args, 0), list)
}

fn function_bind(_ctx: &mut EvalContext, this: JsValue, mut args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    if !this.is_callable() {
        return Err(JErrorType::TypeError(
            "Bind must be called on a function".to_string(),
        ));
    }
    let name = match &this {
        JsValue::Object(o) => match &*o.borrow() {
            ObjectType::Function(f) => format!("bound {}", f.name),
            _ => "bound".to_string(),
        },
        _ => "bound".to_string(),
    };
    let bound_this = if args.is_empty() {
        JsValue::Undefined
    } else {
        args.remove(0)
    };
    let kind = FunctionKind::Bound {
        target: this,
        this: bound_this,
        args,
    };
    Ok(JsValue::Object(Rc::new(RefCell::new(ObjectType::Function(
        FunctionObject::new(name, kind),
    )))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::object::object_value;

    #[test]
    fn test_keys_follow_insertion_order() {
        let mut ctx = EvalContext::with_core_builtins();
        let mut props = PropertyMap::new();
        props.insert("b", JsValue::from_i64(1));
        props.insert("a", JsValue::from_i64(2));
        let keys = object_keys(&mut ctx, JsValue::Undefined, vec![object_value(props)]).unwrap();
        assert_eq!(to_string(&keys), "b,a");
    }

    #[test]
    fn test_keys_of_null_is_type_error() {
        let mut ctx = EvalContext::with_core_builtins();
        let err = object_keys(&mut ctx, JsValue::Undefined, vec![JsValue::Null]).unwrap_err();
        assert_eq!(err.get_name(), "TypeError");
    }
}
