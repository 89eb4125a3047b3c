//! Console built-in object.
//!
//! `console.*` calls become `log` records with target `script`.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::json::js_to_json;
use crate::runner::ds::object::ObjectType;
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

pub const LOG_TARGET: &str = "script";

/// Register the console object with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let console = BuiltInObject::new("console")
        .add_method("log", console_log)
        .add_method("debug", console_debug)
        .add_method("error", console_error)
        .add_method("warn", console_warn)
        .add_method("info", console_info);

    registry.register_object(console);
}

/// Format a JsValue for console output. Plain objects and arrays print as
/// JSON, everything else through `ToString`.
pub fn format_value(value: &JsValue) -> String {
    if let JsValue::Object(o) = value {
        let structured = matches!(&*o.borrow(), ObjectType::Array(_) | ObjectType::Host(_))
            || matches!(&*o.borrow(), ObjectType::Ordinary(ord) if !ord.class_name.ends_with("Error"));
        if structured {
            if let Ok(json) = js_to_json(value) {
                return json.to_string();
            }
        }
    }
    to_string(value)
}

/// Format all arguments for console output.
pub fn format_args(args: &[JsValue]) -> String {
    args.iter().map(format_value).collect::<Vec<_>>().join(" ")
}

fn console_log(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    log::info!(target: LOG_TARGET, "{}", format_args(&args));
    Ok(JsValue::Undefined)
}

fn console_debug(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    log::debug!(target: LOG_TARGET, "{}", format_args(&args));
    Ok(JsValue::Undefined)
}

fn console_error(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    log::error!(target: LOG_TARGET, "{}", format_args(&args));
    Ok(JsValue::Undefined)
}

fn console_warn(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    log::warn!(target: LOG_TARGET, "{}", format_args(&args));
    Ok(JsValue::Undefined)
}

fn console_info(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    log::info!(target: LOG_TARGET, "{}", format_args(&args));
    Ok(JsValue::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::object::array_value;

    #[test]
    fn formats_arrays_as_json_and_strings_verbatim() {
        let args = vec![
            JsValue::str("items"),
            array_value(vec![JsValue::from_i64(1), JsValue::str("a")]),
        ];
        assert_eq!(format_args(&args), "items [1,\"a\"]");
    }
}
