//! Math built-in object.
//!
//! Provides mathematical constants and functions.

use rand::Rng;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::{to_int32, to_number, to_uint32};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext, NativeFn};

/// Functions of one number argument mapped straight onto `f64` methods.
macro_rules! unary_math {
    ($($name:ident => $op:expr),* $(,)?) => {
        $(
            fn $name(
                _ctx: &mut EvalContext,
                _this: JsValue,
                args: Vec<JsValue>,
            ) -> Result<JsValue, JErrorType> {
                let op: fn(f64) -> f64 = $op;
                Ok(JsValue::from_f64(op(first(&args))))
            }
        )*
    };
}

unary_math! {
    math_abs => f64::abs,
    math_floor => f64::floor,
    math_ceil => f64::ceil,
    math_round => js_round,
    math_trunc => f64::trunc,
    math_sign => js_sign,
    math_sqrt => f64::sqrt,
    math_cbrt => f64::cbrt,
    math_exp => f64::exp,
    math_expm1 => f64::exp_m1,
    math_log => f64::ln,
    math_log10 => f64::log10,
    math_log2 => f64::log2,
    math_log1p => f64::ln_1p,
    math_sin => f64::sin,
    math_cos => f64::cos,
    math_tan => f64::tan,
    math_asin => f64::asin,
    math_acos => f64::acos,
    math_atan => f64::atan,
    math_sinh => f64::sinh,
    math_cosh => f64::cosh,
    math_tanh => f64::tanh,
    math_asinh => f64::asinh,
    math_acosh => f64::acosh,
    math_atanh => f64::atanh,
    math_fround => fround,
}

const FUNCTIONS: [(&str, NativeFn); 34] = [
    ("abs", math_abs),
    ("floor", math_floor),
    ("ceil", math_ceil),
    ("round", math_round),
    ("trunc", math_trunc),
    ("sign", math_sign),
    ("sqrt", math_sqrt),
    ("cbrt", math_cbrt),
    ("exp", math_exp),
    ("expm1", math_expm1),
    ("log", math_log),
    ("log10", math_log10),
    ("log2", math_log2),
    ("log1p", math_log1p),
    ("sin", math_sin),
    ("cos", math_cos),
    ("tan", math_tan),
    ("asin", math_asin),
    ("acos", math_acos),
    ("atan", math_atan),
    ("sinh", math_sinh),
    ("cosh", math_cosh),
    ("tanh", math_tanh),
    ("asinh", math_asinh),
    ("acosh", math_acosh),
    ("atanh", math_atanh),
    ("fround", math_fround),
    ("atan2", math_atan2),
    ("pow", math_pow),
    ("min", math_min),
    ("max", math_max),
    ("hypot", math_hypot),
    ("random", math_random),
    ("imul", math_imul),
];

/// Register the Math object with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let mut math = BuiltInObject::new("Math")
        .add_property("E", JsValue::from_f64(std::f64::consts::E))
        .add_property("LN10", JsValue::from_f64(std::f64::consts::LN_10))
        .add_property("LN2", JsValue::from_f64(std::f64::consts::LN_2))
        .add_property("LOG10E", JsValue::from_f64(std::f64::consts::LOG10_E))
        .add_property("LOG2E", JsValue::from_f64(std::f64::consts::LOG2_E))
        .add_property("PI", JsValue::from_f64(std::f64::consts::PI))
        .add_property("SQRT1_2", JsValue::from_f64(std::f64::consts::FRAC_1_SQRT_2))
        .add_property("SQRT2", JsValue::from_f64(std::f64::consts::SQRT_2))
        .add_method("clz32", math_clz32);
    for (name, f) in FUNCTIONS {
        math = math.add_method(name, f);
    }

    registry.register_object(math);
}

fn first(args: &[JsValue]) -> f64 {
    args.first().map(to_number).unwrap_or(f64::NAN)
}

/// Rounds half up, towards positive infinity.
fn js_round(n: f64) -> f64 {
    if !n.is_finite() || n.fract() == 0.0 {
        return n;
    }
    (n + 0.5).floor()
}

fn js_sign(n: f64) -> f64 {
    if n.is_nan() || n == 0.0 {
        n
    } else {
        n.signum()
    }
}

fn fround(n: f64) -> f64 {
    n as f32 as f64
}

fn math_atan2(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let y = first(&args);
    let x = args.get(1).map(to_number).unwrap_or(f64::NAN);
    Ok(JsValue::from_f64(y.atan2(x)))
}

fn math_pow(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let base = first(&args);
    let exponent = args.get(1).map(to_number).unwrap_or(f64::NAN);
    Ok(JsValue::from_f64(base.powf(exponent)))
}

fn math_min(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let mut result = f64::INFINITY;
    for n in args.iter().map(to_number) {
        if n.is_nan() {
            return Ok(JsValue::from_f64(f64::NAN));
        }
        result = result.min(n);
    }
    Ok(JsValue::from_f64(result))
}

fn math_max(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let mut result = f64::NEG_INFINITY;
    for n in args.iter().map(to_number) {
        if n.is_nan() {
            return Ok(JsValue::from_f64(f64::NAN));
        }
        result = result.max(n);
    }
    Ok(JsValue::from_f64(result))
}

fn math_hypot(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let sum: f64 = args.iter().map(to_number).map(|n| n * n).sum();
    Ok(JsValue::from_f64(sum.sqrt()))
}

fn math_random(
    _ctx: &mut EvalContext,
    _this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::from_f64(rand::thread_rng().gen::<f64>()))
}

fn math_clz32(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let n = args.first().map(to_uint32).unwrap_or(0);
    Ok(JsValue::from_i64(n.leading_zeros() as i64))
}

fn math_imul(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let a = args.first().map(to_int32).unwrap_or(0);
    let b = args.get(1).map(to_int32).unwrap_or(0);
    Ok(JsValue::from_i64(a.wrapping_mul(b) as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_goes_towards_positive_infinity_on_halves() {
        assert_eq!(js_round(2.5), 3.0);
        assert_eq!(js_round(-2.5), -2.0);
        assert_eq!(js_round(-2.6), -3.0);
    }
}
