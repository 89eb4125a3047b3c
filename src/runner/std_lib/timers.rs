//! Timer globals: `setTimeout`, `setInterval` and their `clear*` pairs.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::to_number;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::EvalContext;

use super::arg;

pub fn register(registry: &mut BuiltInRegistry) {
    registry.register_function("setTimeout", set_timeout);
    registry.register_function("setInterval", set_interval);
    registry.register_function("clearTimeout", clear_timer);
    registry.register_function("clearInterval", clear_timer);
}

fn schedule(ctx: &mut EvalContext, args: Vec<JsValue>, repeat: bool) -> Result<JsValue, JErrorType> {
    let callback = arg(&args, 0);
    if !callback.is_callable() {
        return Err(JErrorType::TypeError(format!(
            "The \"callback\" argument must be of type function. Received {}",
            callback
        )));
    }
    let delay = to_number(&arg(&args, 1));
    let extra = args.into_iter().skip(2).collect();
    let id = ctx.set_timer(callback, delay, extra, repeat);
    Ok(JsValue::from_i64(id as i64))
}

fn set_timeout(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    schedule(ctx, args, false)
}

fn set_interval(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    schedule(ctx, args, true)
}

fn clear_timer(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let id = to_number(&arg(&args, 0));
    if id.is_finite() && id >= 1.0 {
        ctx.clear_timer(id as u64);
    }
    Ok(JsValue::Undefined)
}
