//! JSON built-in object.
//!
//! Provides JSON.parse and JSON.stringify on top of `serde_json`.

use serde::Serialize;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::json::{js_to_json, json_to_js};
use crate::runner::ds::object::ObjectType;
use crate::runner::ds::operations::type_conversion::{to_number, to_string};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

use super::arg;

/// Register the JSON object with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let json = BuiltInObject::new("JSON")
        .add_method("parse", json_parse)
        .add_method("stringify", json_stringify);

    registry.register_object(json);
}

fn json_parse(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let text = to_string(&arg(&args, 0));
    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| JErrorType::SyntaxError(format!("JSON.parse: {}", e)))?;
    Ok(json_to_js(&value))
}

/// Pretty printing indent from the `space` argument: a count (capped at 10)
/// or a string (first 10 characters).
fn indent_of(space: &JsValue) -> Option<String> {
    let indent = match space {
        JsValue::Number(_) => " ".repeat(to_number(space).clamp(0.0, 10.0) as usize),
        JsValue::String(s) => s.chars().take(10).collect(),
        _ => return None,
    };
    if indent.is_empty() {
        None
    } else {
        Some(indent)
    }
}

pub fn stringify_value(value: &JsValue, indent: Option<&str>) -> Result<String, JErrorType> {
    let json = js_to_json(value)?;
    match indent {
        None => Ok(json.to_string()),
        Some(indent) => {
            let mut out = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
            let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
            json.serialize(&mut ser)
                .map_err(|e| JErrorType::TypeError(e.to_string()))?;
            String::from_utf8(out).map_err(|e| JErrorType::TypeError(e.to_string()))
        }
    }
}

fn json_stringify(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let value = arg(&args, 0);
    let skipped = match &value {
        JsValue::Undefined => true,
        JsValue::Object(o) => matches!(&*o.borrow(), ObjectType::Function(_)),
        _ => false,
    };
    if skipped {
        return Ok(JsValue::Undefined);
    }
    let indent = indent_of(&arg(&args, 2));
    Ok(JsValue::String(stringify_value(&value, indent.as_deref())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::object::object_value;
    use crate::runner::ds::object_property::PropertyMap;

    #[test]
    fn stringify_keeps_insertion_order_and_indents() {
        let mut props = PropertyMap::new();
        props.insert("b", JsValue::from_i64(1));
        props.insert("a", JsValue::Boolean(true));
        let v = object_value(props);
        assert_eq!(stringify_value(&v, None).unwrap(), r#"{"b":1,"a":true}"#);
        assert_eq!(
            stringify_value(&v, Some("  ")).unwrap(),
            "{\n  \"b\": 1,\n  \"a\": true\n}"
        );
    }
}
