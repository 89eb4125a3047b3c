use std::rc::Rc;

use crate::runner::ds::object::ObjectType;
use crate::runner::ds::operations::type_conversion::{to_number, to_string};
use crate::runner::ds::value::JsValue;

pub fn strict_equals(a: &JsValue, b: &JsValue) -> bool {
    match (a, b) {
        (JsValue::Number(x), JsValue::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// `SameValueZero`: like `===` but NaN equals NaN.
pub fn same_value_zero(a: &JsValue, b: &JsValue) -> bool {
    match (a, b) {
        (JsValue::Number(x), JsValue::Number(y)) => {
            let (x, y) = (x.as_f64(), y.as_f64());
            (x.is_nan() && y.is_nan()) || x == y
        }
        _ => a == b,
    }
}

fn to_primitive(v: &JsValue) -> JsValue {
    match v {
        JsValue::Object(o) => {
            if let ObjectType::Date(t) = &*o.borrow() {
                return JsValue::from_f64(*t);
            }
            JsValue::String(to_string(v))
        }
        other => other.clone(),
    }
}

pub fn loose_equals(a: &JsValue, b: &JsValue) -> bool {
    match (a, b) {
        (JsValue::Undefined | JsValue::Null, JsValue::Undefined | JsValue::Null) => true,
        (JsValue::Undefined | JsValue::Null, _) | (_, JsValue::Undefined | JsValue::Null) => false,
        (JsValue::Object(x), JsValue::Object(y)) => Rc::ptr_eq(x, y),
        (JsValue::Number(_), JsValue::String(_))
        | (JsValue::String(_), JsValue::Number(_))
        | (JsValue::Boolean(_), _)
        | (_, JsValue::Boolean(_)) => to_number(a) == to_number(b),
        (JsValue::Object(_), _) => loose_equals(&to_primitive(a), b),
        (_, JsValue::Object(_)) => loose_equals(a, &to_primitive(b)),
        _ => strict_equals(a, b),
    }
}

/// Abstract relational comparison `a < b`. `None` means undefined (NaN involved).
pub fn less_than(a: &JsValue, b: &JsValue) -> Option<bool> {
    let pa = to_primitive(a);
    let pb = to_primitive(b);
    if let (JsValue::String(x), JsValue::String(y)) = (&pa, &pb) {
        return Some(x < y);
    }
    let (x, y) = (to_number(&pa), to_number(&pb));
    if x.is_nan() || y.is_nan() {
        None
    } else {
        Some(x < y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_equality_coerces() {
        assert!(loose_equals(&JsValue::from_i64(1), &JsValue::str("1")));
        assert!(loose_equals(&JsValue::Null, &JsValue::Undefined));
        assert!(!loose_equals(&JsValue::Null, &JsValue::from_i64(0)));
        assert!(loose_equals(&JsValue::Boolean(true), &JsValue::from_i64(1)));
    }

    #[test]
    fn strict_equality_compares_numbers_by_value() {
        assert!(strict_equals(&JsValue::from_f64(2.0), &JsValue::from_i64(2)));
        assert!(!strict_equals(&JsValue::from_f64(f64::NAN), &JsValue::from_f64(f64::NAN)));
        assert!(same_value_zero(&JsValue::from_f64(f64::NAN), &JsValue::from_f64(f64::NAN)));
    }
}
