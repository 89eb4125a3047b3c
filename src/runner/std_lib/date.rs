//! Date built-in. All calendar accessors use UTC.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::ObjectType;
use crate::runner::ds::operations::type_conversion::{date_to_iso_string, to_number, to_string};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::is_construct_call;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext, NativeFn};

use super::arg;

/// Largest magnitude of a time value: 100,000,000 days either side of the epoch.
const MAX_TIME: f64 = 8.64e15;

const GETTERS: [(&str, NativeFn); 9] = [
    ("getFullYear", date_get_full_year),
    ("getMonth", date_get_month),
    ("getDate", date_get_date),
    ("getDay", date_get_day),
    ("getHours", date_get_hours),
    ("getMinutes", date_get_minutes),
    ("getSeconds", date_get_seconds),
    ("getMilliseconds", date_get_milliseconds),
    ("getTimezoneOffset", date_get_timezone_offset),
];

/// Register the Date built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let mut date = BuiltInObject::new("Date")
        .with_constructor(date_constructor)
        .add_method("now", date_now)
        .add_method("parse", date_parse)
        .add_method("UTC", date_utc)
        .add_prototype_method("getTime", date_get_time)
        .add_prototype_method("valueOf", date_get_time)
        .add_prototype_method("toISOString", date_to_iso)
        .add_prototype_method("toJSON", date_to_json)
        .add_prototype_method("toString", date_to_string)
        .add_prototype_method("toUTCString", date_to_utc_string);
    for (name, getter) in GETTERS {
        date = date.add_prototype_method(name, getter);
        if name != "getTimezoneOffset" {
            date = date.add_prototype_method(name.replacen("get", "getUTC", 1), getter);
        }
    }

    registry.register_object(date);
}

pub fn date_value(ms: f64) -> JsValue {
    let t = if ms.is_finite() && ms.abs() <= MAX_TIME {
        ms.trunc()
    } else {
        f64::NAN
    };
    JsValue::Object(Rc::new(RefCell::new(ObjectType::Date(t))))
}

pub fn now_millis() -> f64 {
    Utc::now().timestamp_millis() as f64
}

/// Accepts RFC 3339, RFC 2822, `YYYY-MM-DD` and `YYYY-MM-DDTHH:MM[:SS]`
/// (UTC when no offset is given).
pub fn parse_date_string(s: &str) -> f64 {
    let s = s.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return d.timestamp_millis() as f64;
    }
    if let Ok(d) = DateTime::parse_from_rfc2822(s) {
        return d.timestamp_millis() as f64;
    }
    for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(d) = NaiveDateTime::parse_from_str(s, layout) {
            return d.and_utc().timestamp_millis() as f64;
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(d) = d.and_hms_opt(0, 0, 0) {
            return d.and_utc().timestamp_millis() as f64;
        }
    }
    f64::NAN
}

/// Time value from calendar fields; the month is zero based and overflowing
/// fields carry into the next unit.
fn make_time(fields: &[f64]) -> f64 {
    if fields.iter().any(|f| !f.is_finite()) {
        return f64::NAN;
    }
    let field = |i: usize, default: f64| fields.get(i).copied().unwrap_or(default).trunc();
    let mut year = field(0, f64::NAN);
    if (0.0..=99.0).contains(&year) {
        year += 1900.0;
    }
    let months = year * 12.0 + field(1, 0.0);
    let (y, m) = (months.div_euclid(12.0) as i32, months.rem_euclid(12.0) as u32);
    let first = match NaiveDate::from_ymd_opt(y, m + 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)) {
        Some(d) => d.and_utc().timestamp_millis() as f64,
        None => return f64::NAN,
    };
    first
        + (field(2, 1.0) - 1.0) * 86_400_000.0
        + field(3, 0.0) * 3_600_000.0
        + field(4, 0.0) * 60_000.0
        + field(5, 0.0) * 1000.0
        + field(6, 0.0)
}

fn date_constructor(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    if !is_construct_call(ctx) {
        return Ok(JsValue::String(date_to_iso_string(now_millis())));
    }
    let t = match args.len() {
        0 => now_millis(),
        1 => match &args[0] {
            JsValue::String(s) => parse_date_string(s),
            JsValue::Object(o) => match &*o.borrow() {
                ObjectType::Date(t) => *t,
                _ => parse_date_string(&to_string(&args[0])),
            },
            other => to_number(other),
        },
        _ => make_time(&args.iter().map(to_number).collect::<Vec<_>>()),
    };
    Ok(date_value(t))
}

fn date_now(
    _ctx: &mut EvalContext,
    _this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::from_f64(now_millis()))
}

fn date_parse(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::from_f64(parse_date_string(&to_string(&arg(&args, 0)))))
}

fn date_utc(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::from_f64(make_time(
        &args.iter().map(to_number).collect::<Vec<_>>(),
    )))
}

fn time_value(this: &JsValue) -> Result<f64, JErrorType> {
    match this {
        JsValue::Object(o) => match &*o.borrow() {
            ObjectType::Date(t) => Ok(*t),
            _ => Err(JErrorType::TypeError("this is not a Date object.".to_string())),
        },
        _ => Err(JErrorType::TypeError("this is not a Date object.".to_string())),
    }
}

fn utc_fields(this: &JsValue) -> Result<Option<DateTime<Utc>>, JErrorType> {
    let t = time_value(this)?;
    if t.is_nan() {
        return Ok(None);
    }
    Ok(Utc.timestamp_millis_opt(t as i64).single())
}

fn field_getter(this: &JsValue, f: fn(&DateTime<Utc>) -> i64) -> Result<JsValue, JErrorType> {
    Ok(match utc_fields(this)? {
        Some(d) => JsValue::from_i64(f(&d)),
        None => JsValue::from_f64(f64::NAN),
    })
}

fn date_get_time(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::from_f64(time_value(&this)?))
}

fn date_to_iso(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let t = time_value(&this)?;
    if t.is_nan() {
        return Err(JErrorType::RangeError("Invalid time value".to_string()));
    }
    Ok(JsValue::String(date_to_iso_string(t)))
}

fn date_to_json(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let t = time_value(&this)?;
    Ok(if t.is_nan() {
        JsValue::Null
    } else {
        JsValue::String(date_to_iso_string(t))
    })
}

fn date_to_string(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(match utc_fields(&this)? {
        Some(d) => d.format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)").to_string(),
        None => "Invalid Date".to_string(),
    }))
}

fn date_to_utc_string(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(match utc_fields(&this)? {
        Some(d) => d.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        None => "Invalid Date".to_string(),
    }))
}

fn date_get_full_year(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    field_getter(&this, |d| d.year() as i64)
}

fn date_get_month(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    field_getter(&this, |d| d.month0() as i64)
}

fn date_get_date(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    field_getter(&this, |d| d.day() as i64)
}

fn date_get_day(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    field_getter(&this, |d| d.weekday().num_days_from_sunday() as i64)
}

fn date_get_hours(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    field_getter(&this, |d| d.hour() as i64)
}

fn date_get_minutes(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    field_getter(&this, |d| d.minute() as i64)
}

fn date_get_seconds(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    field_getter(&this, |d| d.second() as i64)
}

fn date_get_milliseconds(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    field_getter(&this, |d| d.timestamp_subsec_millis() as i64)
}

fn date_get_timezone_offset(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    field_getter(&this, |_| 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_layouts() {
        assert_eq!(parse_date_string("1970-01-02"), 86_400_000.0);
        assert_eq!(parse_date_string("1970-01-01T00:00:01Z"), 1000.0);
        assert_eq!(parse_date_string("1970-01-01T01:00:00+01:00"), 0.0);
        assert!(parse_date_string("yesterday").is_nan());
    }

    #[test]
    fn calendar_fields_carry_over() {
        assert_eq!(make_time(&[2020.0, 12.0, 1.0]), parse_date_string("2021-01-01"));
        assert_eq!(make_time(&[2020.0, 0.0, 32.0]), parse_date_string("2020-02-01"));
    }
}
