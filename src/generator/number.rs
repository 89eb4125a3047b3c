use serde_json::Value;

use super::merge::lcm_f64;
use super::schema::{Schema, SchemaType};
use super::session::Session;
use super::GeneratorError;

/// Half-width of the range used when a bound is missing.
const DEFAULT_WINDOW: f64 = 1_000_000.0;
/// Offset applied to exclusive float bounds.
const EPSILON: f64 = 1e-15;

struct Range {
    lo: f64,
    lo_exclusive: bool,
    hi: f64,
    hi_exclusive: bool,
}

fn range(schema: &Schema) -> Result<Range, GeneratorError> {
    let (mut lo, lo_exclusive) = schema.lower_bound().unwrap_or((f64::NAN, false));
    let (mut hi, hi_exclusive) = schema.upper_bound().unwrap_or((f64::NAN, false));
    match (lo.is_nan(), hi.is_nan()) {
        (true, true) => {
            lo = -DEFAULT_WINDOW;
            hi = DEFAULT_WINDOW;
        }
        (true, false) => lo = hi - DEFAULT_WINDOW,
        (false, true) => hi = lo + DEFAULT_WINDOW,
        (false, false) => {}
    }
    if schema.format.as_deref() == Some("int32") {
        lo = lo.max(i32::MIN as f64);
        hi = hi.min(i32::MAX as f64);
    }
    if lo > hi || (lo == hi && (lo_exclusive || hi_exclusive)) {
        return Err(GeneratorError::InvalidRange {
            field: "minimum",
            message: format!("minimum ({}) must not exceed maximum ({})", lo, hi),
        });
    }
    Ok(Range {
        lo,
        lo_exclusive,
        hi,
        hi_exclusive,
    })
}

pub fn integer(session: &mut Session<'_>, schema: &Schema) -> Result<Value, GeneratorError> {
    let r = range(schema)?;
    let lo = if r.lo_exclusive { r.lo.floor() + 1.0 } else { r.lo.ceil() };
    let hi = if r.hi_exclusive { r.hi.ceil() - 1.0 } else { r.hi.floor() };
    if lo > hi {
        return Err(GeneratorError::InvalidRange {
            field: "minimum",
            message: format!("no integer between {} and {}", r.lo, r.hi),
        });
    }
    let value = match schema.multiple_of {
        Some(m) => {
            let step = if m.fract() == 0.0 { m } else { lcm_f64(m, 1.0) };
            let first = (lo / step).ceil();
            let last = (hi / step).floor();
            if first > last {
                return Err(GeneratorError::Unsatisfiable(format!(
                    "no multiple of {} between {} and {}",
                    m, lo, hi
                )));
            }
            session.rng.int_range(first as i64, last as i64) as f64 * step
        }
        None => session.rng.int_range(lo as i64, hi as i64) as f64,
    };
    Ok(Value::from(value as i64))
}

pub fn float(session: &mut Session<'_>, schema: &Schema) -> Result<Value, GeneratorError> {
    let r = range(schema)?;
    let mut value = match schema.multiple_of {
        Some(m) => {
            let mut first = (r.lo / m).ceil();
            if r.lo_exclusive && first * m <= r.lo {
                first += 1.0;
            }
            let mut last = (r.hi / m).floor();
            if r.hi_exclusive && last * m >= r.hi {
                last -= 1.0;
            }
            if first > last {
                return Err(GeneratorError::Unsatisfiable(format!(
                    "no multiple of {} between {} and {}",
                    m, r.lo, r.hi
                )));
            }
            let k = session.rng.int_range(first as i64, last as i64) as f64;
            round_to(k * m, decimals(m))
        }
        None => {
            let mut v = r.lo + session.rng.float() * (r.hi - r.lo);
            if r.lo_exclusive && v <= r.lo {
                v = step_toward(r.lo, true);
            }
            if r.hi_exclusive && v >= r.hi {
                v = step_toward(r.hi, false);
            }
            v
        }
    };
    if excludes_integer(schema) && value.fract() == 0.0 {
        let room_up = r.hi - value;
        let room_down = value - r.lo;
        value = if room_up > 0.0 {
            value + (room_up / 2.0).min(0.5)
        } else if room_down > 0.0 {
            value - (room_down / 2.0).min(0.5)
        } else {
            value
        };
    }
    Ok(float_value(value))
}

/// `not: {type: integer}` on a numeric schema.
fn excludes_integer(schema: &Schema) -> bool {
    match &schema.not {
        Some(not) => not.types.as_deref() == Some(&[SchemaType::Integer][..]),
        None => false,
    }
}

fn step_toward(x: f64, up: bool) -> f64 {
    let shifted = if up { x + EPSILON } else { x - EPSILON };
    if shifted != x {
        return shifted;
    }
    if x == 0.0 {
        let tiny = f64::from_bits(1);
        return if up { tiny } else { -tiny };
    }
    let bits = x.to_bits();
    f64::from_bits(if (x > 0.0) == up { bits + 1 } else { bits - 1 })
}

fn decimals(m: f64) -> i32 {
    let text = format!("{}", m);
    text.split_once('.').map(|(_, frac)| frac.len() as i32).unwrap_or(0)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn float_value(v: f64) -> Value {
    serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepping_off_exclusive_bounds() {
        assert!(step_toward(1.0, true) > 1.0);
        assert!(step_toward(1.0e9, false) < 1.0e9);
        assert!(step_toward(0.0, true) > 0.0);
    }

    #[test]
    fn rounding_multiples() {
        assert_eq!(decimals(0.25), 2);
        assert_eq!(round_to(3.0 * 0.1, decimals(0.1)), 0.3);
    }
}
