//! Error built-in objects.
//!
//! Provides the Error, TypeError, ReferenceError, SyntaxError and RangeError
//! constructors, and the conversion of interpreter errors into script values.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::new_object_with_class;
use crate::runner::ds::object_property::PropertyMap;
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext, NativeFn};

use super::arg;

const ERROR_TYPES: [(&str, NativeFn); 5] = [
    ("Error", error_constructor),
    ("TypeError", type_error_constructor),
    ("ReferenceError", reference_error_constructor),
    ("SyntaxError", syntax_error_constructor),
    ("RangeError", range_error_constructor),
];

/// Register all error types with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    for (name, constructor) in ERROR_TYPES {
        registry.register_object(BuiltInObject::new(name).with_constructor(constructor));
    }
}

/// Creates an error object the way `new <name>(message)` would.
pub fn create_error(name: &str, message: &str) -> JsValue {
    let mut props = PropertyMap::new();
    props.insert("name", JsValue::str(name));
    props.insert("message", JsValue::str(message));
    JsValue::Object(new_object_with_class(name, props))
}

/// The value a `catch` clause or a rejection handler observes.
pub fn error_to_value(error: JErrorType) -> JsValue {
    match error {
        JErrorType::Thrown(v) => v,
        other => create_error(other.get_name(), &other.get_message()),
    }
}

fn construct_error(name: &str, args: &[JsValue]) -> JsValue {
    let message = match arg(args, 0) {
        JsValue::Undefined => String::new(),
        other => to_string(&other),
    };
    let error = create_error(name, &message);
    if let (JsValue::Object(o), JsValue::Object(options)) = (&error, arg(args, 1)) {
        let cause = options
            .borrow()
            .properties()
            .and_then(|p| p.get("cause").cloned());
        if let (Some(cause), Some(props)) = (cause, o.borrow_mut().properties_mut()) {
            props.insert("cause", cause);
        }
    }
    error
}

fn error_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(construct_error("Error", &args))
}

fn type_error_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(construct_error("TypeError", &args))
}

fn reference_error_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(construct_error("ReferenceError", &args))
}

fn syntax_error_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(construct_error("SyntaxError", &args))
}

fn range_error_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(construct_error("RangeError", &args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpreter_errors_become_error_objects() {
        let v = error_to_value(JErrorType::TypeError("x is not a function".to_string()));
        assert_eq!(to_string(&v), "TypeError: x is not a function");
        let thrown = JsValue::from_i64(3);
        assert_eq!(error_to_value(JErrorType::Thrown(thrown.clone())), thrown);
    }
}
