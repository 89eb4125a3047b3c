use chrono::{TimeZone, Utc};

use crate::runner::ds::object::ObjectType;
use crate::runner::ds::value::{JsNumberType, JsValue};

pub const TYPE_STR_UNDEFINED: &str = "undefined";
pub const TYPE_STR_NULL: &str = "null";
pub const TYPE_STR_BOOLEAN: &str = "boolean";
pub const TYPE_STR_STRING: &str = "string";
pub const TYPE_STR_NUMBER: &str = "number";
pub const TYPE_STR_OBJECT: &str = "object";
pub const TYPE_STR_FUNCTION: &str = "function";

/// Result of `typeof`.
pub fn get_type(value: &JsValue) -> &'static str {
    match value {
        JsValue::Undefined => TYPE_STR_UNDEFINED,
        JsValue::Null => TYPE_STR_OBJECT,
        JsValue::Boolean(_) => TYPE_STR_BOOLEAN,
        JsValue::String(_) => TYPE_STR_STRING,
        JsValue::Number(_) => TYPE_STR_NUMBER,
        JsValue::Object(o) => {
            if o.borrow().is_callable() {
                TYPE_STR_FUNCTION
            } else {
                TYPE_STR_OBJECT
            }
        }
    }
}

pub fn to_boolean(value: &JsValue) -> bool {
    match value {
        JsValue::Undefined | JsValue::Null => false,
        JsValue::Boolean(b) => *b,
        JsValue::String(s) => !s.is_empty(),
        JsValue::Number(n) => {
            let f = n.as_f64();
            !(f == 0.0 || f.is_nan())
        }
        JsValue::Object(_) => true,
    }
}

pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    let lower = t.to_ascii_lowercase();
    let radix = |prefix: &str, r: u32| {
        u64::from_str_radix(&t[prefix.len()..], r)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN)
    };
    if lower.starts_with("0x") {
        return radix("0x", 16);
    }
    if lower.starts_with("0o") {
        return radix("0o", 8);
    }
    if lower.starts_with("0b") {
        return radix("0b", 2);
    }
    match t {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => {
            // Rust accepts "inf"/"nan" spellings that scripts must not.
            if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
                f64::NAN
            } else {
                t.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
    }
}

pub fn to_number(value: &JsValue) -> f64 {
    match value {
        JsValue::Undefined => f64::NAN,
        JsValue::Null => 0.0,
        JsValue::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        JsValue::String(s) => string_to_number(s),
        JsValue::Number(n) => n.as_f64(),
        JsValue::Object(o) => match &*o.borrow() {
            ObjectType::Date(t) => *t,
            ObjectType::Array(a) => match a.elements.len() {
                0 => 0.0,
                1 => to_number(&a.elements[0]),
                _ => f64::NAN,
            },
            _ => f64::NAN,
        },
    }
}

pub fn to_integer_or_infinity(value: &JsValue) -> f64 {
    let n = to_number(value);
    if n.is_nan() {
        0.0
    } else {
        n.trunc()
    }
}

pub fn to_int32(value: &JsValue) -> i32 {
    f64_to_int32(to_number(value))
}

pub fn f64_to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    let m = n.trunc().rem_euclid(4_294_967_296.0);
    if m >= 2_147_483_648.0 {
        (m - 4_294_967_296.0) as i32
    } else {
        m as i32
    }
}

pub fn to_uint32(value: &JsValue) -> u32 {
    let n = to_number(value);
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

/// Number formatting following the ECMAScript `Number::toString` rules.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n < 0.0 {
        return format!("-{}", number_to_string(-n));
    }
    if n.fract() == 0.0 && n < 1e21 {
        return format!("{:.0}", n);
    }
    // Shortest round-trip digits and exponent from the `{:e}` form.
    let exp_form = format!("{:e}", n);
    let (mantissa, exponent) = match exp_form.split_once('e') {
        Some(parts) => parts,
        None => return exp_form,
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let k = digits.len() as i32;
    let point = exponent + 1;
    if k <= point && point <= 21 {
        format!("{}{}", digits, "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        format!("{}.{}", &digits[..point as usize], &digits[point as usize..])
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let sign = if point - 1 < 0 { "-" } else { "+" };
        if k == 1 {
            format!("{}e{}{}", digits, sign, (point - 1).abs())
        } else {
            format!("{}.{}e{}{}", &digits[..1], &digits[1..], sign, (point - 1).abs())
        }
    }
}

pub fn date_to_iso_string(t: f64) -> String {
    match Utc.timestamp_millis_opt(t as i64).single() {
        Some(d) => d.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        None => "Invalid Date".to_string(),
    }
}

/// `ToString` for primitives and the default object conversions.
pub fn to_string(value: &JsValue) -> String {
    match value {
        JsValue::Undefined => TYPE_STR_UNDEFINED.to_string(),
        JsValue::Null => TYPE_STR_NULL.to_string(),
        JsValue::Boolean(b) => b.to_string(),
        JsValue::String(s) => s.clone(),
        JsValue::Number(n) => match n {
            JsNumberType::Integer(i) => i.to_string(),
            other => number_to_string(other.as_f64()),
        },
        JsValue::Object(o) => {
            let obj = match o.try_borrow() {
                Ok(obj) => obj,
                Err(_) => return String::new(),
            };
            match &*obj {
                ObjectType::Array(a) => a
                    .elements
                    .iter()
                    .map(|e| if e.is_nullish() { String::new() } else { to_string(e) })
                    .collect::<Vec<_>>()
                    .join(","),
                ObjectType::Function(f) => format!("function {}() {{ [native code] }}", f.name),
                ObjectType::RegExp(r) => format!("/{}/{}", r.source, r.flags),
                ObjectType::Date(t) => {
                    if t.is_nan() {
                        "Invalid Date".to_string()
                    } else {
                        date_to_iso_string(*t)
                    }
                }
                ObjectType::Ordinary(ord) => {
                    let is_error = ord.properties.contains_key("message")
                        && (ord.class_name.ends_with("Error") || ord.properties.contains_key("name"));
                    if is_error {
                        let name = ord
                            .properties
                            .get("name")
                            .map(to_string)
                            .unwrap_or_else(|| ord.class_name.clone());
                        let msg = ord.properties.get("message").map(to_string).unwrap_or_default();
                        if msg.is_empty() {
                            name
                        } else {
                            format!("{}: {}", name, msg)
                        }
                    } else {
                        "[object Object]".to_string()
                    }
                }
                ObjectType::Promise(_) => "[object Promise]".to_string(),
                ObjectType::Host(h) => match h.kind() {
                    crate::runner::ds::host_object::HostKind::Sequence => {
                        match h.to_json() {
                            serde_json::Value::Array(items) => items
                                .iter()
                                .map(|v| match v {
                                    serde_json::Value::String(s) => s.clone(),
                                    serde_json::Value::Null => String::new(),
                                    other => other.to_string(),
                                })
                                .collect::<Vec<_>>()
                                .join(","),
                            other => other.to_string(),
                        }
                    }
                    _ => format!("[object {}]", h.class_name()),
                },
            }
        }
    }
}

/// Property key for a computed member access.
pub fn to_property_key(value: &JsValue) -> String {
    to_string(value)
}

/// Parses a canonical array index (`"0"`, `"12"`, not `"01"`).
pub fn to_array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<usize>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_numbers_like_scripts_expect() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(-2.5), "-2.5");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1.5e-7), "1.5e-7");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(123456.789), "123456.789");
        assert_eq!(number_to_string(f64::NAN), "NaN");
    }

    #[test]
    fn converts_strings_to_numbers() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number("0x1f"), 31.0);
        assert_eq!(string_to_number(""), 0.0);
        assert!(string_to_number("abc").is_nan());
        assert!(string_to_number("inf").is_nan());
    }

    #[test]
    fn recognizes_array_indices() {
        assert_eq!(to_array_index("3"), Some(3));
        assert_eq!(to_array_index("03"), None);
        assert_eq!(to_array_index("x"), None);
    }
}
