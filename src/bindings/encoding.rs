//! The `mokapi/encoding` module.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::arg;

use super::{function, object, script_error, type_error};

pub(crate) fn exports(_ctx: &mut EvalContext) -> ValueResult {
    let base64 = object(vec![
        ("encode", function("encode", encode)),
        ("decode", function("decode", decode)),
    ]);
    Ok(object(vec![("base64", base64)]))
}

fn text_arg(args: &[JsValue]) -> Result<String, JErrorType> {
    match arg(args, 0) {
        JsValue::String(s) => Ok(s),
        other => Err(type_error("input", &other, "String")),
    }
}

fn encode(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    Ok(JsValue::String(STANDARD.encode(text_arg(&args)?)))
}

fn decode(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let bytes = STANDARD
        .decode(text_arg(&args)?.trim())
        .map_err(|e| script_error(format!("invalid base64 input: {}", e)))?;
    Ok(JsValue::String(String::from_utf8_lossy(&bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_both_ways() {
        let mut ctx = EvalContext::new();
        let encoded = encode(&mut ctx, JsValue::Undefined, vec![JsValue::str("hello world")]).unwrap();
        assert_eq!(encoded.as_str(), Some("aGVsbG8gd29ybGQ="));
        let decoded = decode(&mut ctx, JsValue::Undefined, vec![encoded]).unwrap();
        assert_eq!(decoded.as_str(), Some("hello world"));
        assert!(decode(&mut ctx, JsValue::Undefined, vec![JsValue::str("%%")]).is_err());
    }
}
