//! Number and Boolean built-ins, plus the numeric global functions.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::{
    number_to_string, to_boolean, to_integer_or_infinity, to_number, to_string,
};
use crate::runner::ds::value::{JsNumberType, JsValue};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

use super::arg;

/// Register the Number and Boolean built-ins with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let number = BuiltInObject::new("Number")
        .with_constructor(number_constructor)
        .add_property("MAX_VALUE", JsValue::from_f64(f64::MAX))
        .add_property("MIN_VALUE", JsValue::from_f64(5e-324))
        .add_property("POSITIVE_INFINITY", JsValue::Number(JsNumberType::PositiveInfinity))
        .add_property("NEGATIVE_INFINITY", JsValue::Number(JsNumberType::NegativeInfinity))
        .add_property("NaN", JsValue::Number(JsNumberType::NaN))
        .add_property("MAX_SAFE_INTEGER", JsValue::from_i64(9_007_199_254_740_991))
        .add_property("MIN_SAFE_INTEGER", JsValue::from_i64(-9_007_199_254_740_991))
        .add_property("EPSILON", JsValue::from_f64(f64::EPSILON))
        .add_method("isNaN", number_is_nan)
        .add_method("isFinite", number_is_finite)
        .add_method("isInteger", number_is_integer)
        .add_method("isSafeInteger", number_is_safe_integer)
        .add_method("parseFloat", parse_float)
        .add_method("parseInt", parse_int)
        .add_prototype_method("toString", number_to_string_method)
        .add_prototype_method("toLocaleString", number_to_string_method)
        .add_prototype_method("valueOf", number_value_of)
        .add_prototype_method("toFixed", number_to_fixed)
        .add_prototype_method("toExponential", number_to_exponential)
        .add_prototype_method("toPrecision", number_to_precision);
    registry.register_object(number);

    let boolean = BuiltInObject::new("Boolean")
        .with_constructor(boolean_constructor)
        .add_prototype_method("toString", boolean_to_string)
        .add_prototype_method("valueOf", boolean_value_of);
    registry.register_object(boolean);
}

fn number_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(match args.first() {
        Some(v) => JsValue::from_f64(to_number(v)),
        None => JsValue::from_i64(0),
    })
}

fn boolean_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(args.first().map(to_boolean).unwrap_or(false)))
}

fn this_number(this: &JsValue, method: &str) -> Result<f64, JErrorType> {
    match this {
        JsValue::Number(n) => Ok(n.as_f64()),
        other => Err(JErrorType::TypeError(format!(
            "Number.prototype.{} requires that 'this' be a Number, got {}",
            method, other
        ))),
    }
}

fn number_arg(args: &[JsValue]) -> Option<f64> {
    match args.first() {
        Some(JsValue::Number(n)) => Some(n.as_f64()),
        _ => None,
    }
}

fn number_is_nan(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(number_arg(&args).map_or(false, f64::is_nan)))
}

fn number_is_finite(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(number_arg(&args).map_or(false, f64::is_finite)))
}

fn number_is_integer(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(
        number_arg(&args).map_or(false, |n| n.is_finite() && n.fract() == 0.0),
    ))
}

fn number_is_safe_integer(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(number_arg(&args).map_or(false, |n| {
        n.is_finite() && n.fract() == 0.0 && n.abs() <= 9_007_199_254_740_991.0
    })))
}

/// Global `isNaN`: coerces its argument first.
pub fn global_is_nan(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(to_number(&arg(&args, 0)).is_nan()))
}

pub fn global_is_finite(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(to_number(&arg(&args, 0)).is_finite()))
}

/// Longest prefix of `s` that reads as a decimal literal.
pub fn parse_float_prefix(s: &str) -> f64 {
    let s = s.trim_start();
    for (prefix, value) in [
        ("Infinity", f64::INFINITY),
        ("+Infinity", f64::INFINITY),
        ("-Infinity", f64::NEG_INFINITY),
    ] {
        if s.starts_with(prefix) {
            return value;
        }
    }
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || &s[digits_start..end] == "." {
        return f64::NAN;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    s[..end].parse().unwrap_or(f64::NAN)
}

pub fn parse_int_radix(s: &str, radix: Option<u32>) -> f64 {
    let mut s = s.trim();
    let mut sign = 1.0;
    if let Some(rest) = s.strip_prefix('-') {
        sign = -1.0;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }
    let mut radix = radix.unwrap_or(10);
    let lower = s.to_ascii_lowercase();
    if (radix == 16 || radix == 0) && lower.starts_with("0x") {
        s = &s[2..];
        radix = 16;
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let mut value = 0.0f64;
    let mut any = false;
    for c in s.chars() {
        match c.to_digit(radix) {
            Some(d) => {
                value = value * radix as f64 + d as f64;
                any = true;
            }
            None => break,
        }
    }
    if any {
        sign * value
    } else {
        f64::NAN
    }
}

pub fn parse_float(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::from_f64(parse_float_prefix(&to_string(&arg(&args, 0)))))
}

pub fn parse_int(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let radix = match arg(&args, 1) {
        JsValue::Undefined => None,
        r => Some(to_integer_or_infinity(&r) as u32),
    };
    Ok(JsValue::from_f64(parse_int_radix(&to_string(&arg(&args, 0)), radix)))
}

fn to_radix_string(n: f64, radix: u32) -> String {
    if !n.is_finite() || radix == 10 {
        return number_to_string(n);
    }
    let negative = n < 0.0;
    let n = n.abs();
    let mut int_part = n.trunc();
    let mut digits = Vec::new();
    loop {
        let d = (int_part % radix as f64) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap_or('0'));
        int_part = (int_part / radix as f64).trunc();
        if int_part < 1.0 {
            break;
        }
    }
    let mut out: String = digits.into_iter().rev().collect();
    let mut frac = n.fract();
    if frac > 0.0 {
        out.push('.');
        for _ in 0..20 {
            frac *= radix as f64;
            let d = frac.trunc() as u32;
            out.push(std::char::from_digit(d, radix).unwrap_or('0'));
            frac = frac.fract();
            if frac == 0.0 {
                break;
            }
        }
    }
    if negative {
        format!("-{}", out)
    } else {
        out
    }
}

fn number_to_string_method(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let n = this_number(&this, "toString")?;
    let radix = match arg(&args, 0) {
        JsValue::Undefined => 10,
        r => to_integer_or_infinity(&r) as i64,
    };
    if !(2..=36).contains(&radix) {
        return Err(JErrorType::RangeError(
            "toString() radix must be between 2 and 36".to_string(),
        ));
    }
    Ok(JsValue::String(to_radix_string(n, radix as u32)))
}

fn number_value_of(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::from_f64(this_number(&this, "valueOf")?))
}

fn digits_arg(args: &[JsValue], min: f64, max: f64, method: &str) -> Result<Option<usize>, JErrorType> {
    match arg(args, 0) {
        JsValue::Undefined => Ok(None),
        v => {
            let d = to_integer_or_infinity(&v);
            if d < min || d > max {
                return Err(JErrorType::RangeError(format!(
                    "{}() argument must be between {} and {}",
                    method, min, max
                )));
            }
            Ok(Some(d as usize))
        }
    }
}

fn number_to_fixed(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let n = this_number(&this, "toFixed")?;
    let digits = digits_arg(&args, 0.0, 100.0, "toFixed")?.unwrap_or(0);
    if !n.is_finite() || n.abs() >= 1e21 {
        return Ok(JsValue::String(number_to_string(n)));
    }
    Ok(JsValue::String(format!("{:.*}", digits, n)))
}

/// `1.5e3` becomes `1.5e+3`.
fn js_exponent(formatted: String) -> String {
    match formatted.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
        _ => formatted,
    }
}

fn number_to_exponential(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let n = this_number(&this, "toExponential")?;
    if !n.is_finite() {
        return Ok(JsValue::String(number_to_string(n)));
    }
    let formatted = match digits_arg(&args, 0.0, 100.0, "toExponential")? {
        Some(d) => format!("{:.*e}", d, n),
        None => format!("{:e}", n),
    };
    Ok(JsValue::String(js_exponent(formatted)))
}

fn number_to_precision(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let n = this_number(&this, "toPrecision")?;
    let precision = match digits_arg(&args, 1.0, 100.0, "toPrecision")? {
        Some(p) => p,
        None => return Ok(JsValue::String(number_to_string(n))),
    };
    if !n.is_finite() {
        return Ok(JsValue::String(number_to_string(n)));
    }
    let exp_form = format!("{:.*e}", precision - 1, n);
    let exponent: i32 = exp_form
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);
    if exponent < -6 || exponent >= precision as i32 {
        return Ok(JsValue::String(js_exponent(exp_form)));
    }
    let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
    Ok(JsValue::String(format!("{:.*}", decimals, n)))
}

fn this_boolean(this: &JsValue) -> Result<bool, JErrorType> {
    match this {
        JsValue::Boolean(b) => Ok(*b),
        other => Err(JErrorType::TypeError(format!(
            "Boolean.prototype method requires that 'this' be a Boolean, got {}",
            other
        ))),
    }
}

fn boolean_to_string(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(this_boolean(&this)?.to_string()))
}

fn boolean_value_of(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(this_boolean(&this)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_reads_the_longest_prefix() {
        assert_eq!(parse_int_radix("42px", None), 42.0);
        assert_eq!(parse_int_radix("  -0x1F", None), -31.0);
        assert_eq!(parse_int_radix("101", Some(2)), 5.0);
        assert!(parse_int_radix("px", None).is_nan());
    }

    #[test]
    fn parse_float_reads_the_longest_prefix() {
        assert_eq!(parse_float_prefix("3.25kg"), 3.25);
        assert_eq!(parse_float_prefix("1e3x"), 1000.0);
        assert_eq!(parse_float_prefix("2e"), 2.0);
        assert!(parse_float_prefix(".").is_nan());
    }

    #[test]
    fn radix_strings() {
        assert_eq!(to_radix_string(255.0, 16), "ff");
        assert_eq!(to_radix_string(-5.0, 2), "-101");
        assert_eq!(to_radix_string(0.5, 2), "0.1");
    }
}
