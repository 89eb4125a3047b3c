use base64::Engine;
use serde_json::Value;

use super::fakers::{internet, time};
use super::pattern::PatternSampler;
use super::schema::Schema;
use super::session::Session;
use super::GeneratorError;

const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const SPECIAL: &str = "!#$%&*+-./:;<=>?@^_~";
/// Tries of a format generator before falling back to a minimal value.
const FORMAT_ATTEMPTS: usize = 10;
/// Weights of lower-case, upper-case, digits, space and special chars.
const CATEGORY_WEIGHTS: [f64; 5] = [5.0, 3.0, 0.5, 0.1, 0.1];

pub fn generate(session: &mut Session<'_>, schema: &Schema) -> Result<Value, GeneratorError> {
    let (min, max) = (schema.min_length, schema.max_length);
    if let (Some(a), Some(b)) = (min, max) {
        if a > b {
            return Err(GeneratorError::InvalidRange {
                field: "minLength",
                message: format!("minLength ({}) must not exceed maxLength ({})", a, b),
            });
        }
    }
    if let Some(pattern) = &schema.pattern {
        let sampler = PatternSampler::new(pattern)?;
        return sampler
            .sample_len(&mut session.rng, min, max)
            .map(Value::String)
            .ok_or_else(|| {
                GeneratorError::Unsatisfiable(format!(
                    "cannot generate string for pattern '{}' within length bounds",
                    pattern
                ))
            });
    }
    if let Some(format) = &schema.format {
        let fits = |s: &str| {
            let len = s.chars().count();
            min.map(|m| len >= m).unwrap_or(true) && max.map(|m| len <= m).unwrap_or(true)
        };
        let mut generated = false;
        for _ in 0..FORMAT_ATTEMPTS {
            match format_value(session, format, schema)? {
                Some(s) if fits(&s) => return Ok(Value::String(s)),
                Some(_) => generated = true,
                None => break,
            }
        }
        if generated {
            if let Some(s) = fitted_format_value(session, format, min, max) {
                return Ok(Value::String(s));
            }
            if is_checked_format(format) {
                return Err(GeneratorError::Unsatisfiable(format!(
                    "cannot generate string with format '{}' within length bounds",
                    format
                )));
            }
        }
    }
    let (lo, hi) = match (min, max) {
        (None, None) => (5, 15),
        (Some(a), None) => (a, a + 10),
        (None, Some(b)) => (b.min(1), b),
        (Some(a), Some(b)) => (a, b),
    };
    let len = session.rng.usize_range(lo, hi);
    Ok(Value::String(random_text(session, len)))
}

/// Characters drawn by category weight.
pub fn random_text(session: &mut Session<'_>, len: usize) -> String {
    let mut out = String::with_capacity(len);
    for _ in 0..len {
        let set = match session.rng.weighted(&CATEGORY_WEIGHTS) {
            0 => LOWER,
            1 => UPPER,
            2 => DIGITS,
            3 => " ",
            _ => SPECIAL,
        };
        out.push(pick_char(session, set));
    }
    out
}

pub fn pick_char(session: &mut Session<'_>, set: &str) -> char {
    let chars: Vec<char> = set.chars().collect();
    *session.rng.pick(&chars).unwrap_or(&'a')
}

pub fn random_from(session: &mut Session<'_>, set: &str, len: usize) -> String {
    (0..len).map(|_| pick_char(session, set)).collect()
}

fn password(session: &mut Session<'_>, schema: &Schema) -> String {
    let lo = schema.min_length.unwrap_or(8).max(1);
    let hi = schema.max_length.unwrap_or(lo.max(16)).max(lo);
    let len = session.rng.usize_range(lo, hi);
    let alphabet = format!("{}{}{}{}", LOWER, UPPER, DIGITS, SPECIAL);
    random_from(session, &alphabet, len)
}

/// Formats whose values are checked on validation, so random text never fits.
fn is_checked_format(format: &str) -> bool {
    matches!(
        format,
        "date" | "date-time" | "time" | "email" | "uuid" | "uri" | "url" | "hostname" | "ipv4" | "ipv6"
    )
}

/// Shortest shape of a format stretched to the length bounds, for formats
/// where one exists.
fn fitted_format_value(session: &mut Session<'_>, format: &str, min: Option<usize>, max: Option<usize>) -> Option<String> {
    let shortest = match format {
        "email" => 6,
        "uri" | "url" => 5,
        "hostname" | "binary" => 1,
        _ => return None,
    };
    let len = min.unwrap_or(0).max(shortest);
    if max.map(|m| len > m).unwrap_or(false) {
        return None;
    }
    match format {
        "email" => Some(format!("{}@b.io", random_from(session, LOWER, len - 5))),
        "uri" | "url" => Some(format!("urn:{}", random_from(session, LOWER, len - 4))),
        "hostname" if len <= 63 => Some(random_from(session, LOWER, len)),
        "binary" => Some(random_from(session, &format!("{}{}{}", LOWER, UPPER, DIGITS), len)),
        _ => None,
    }
}

/// Value for a `format`; `None` for formats without a dedicated generator.
pub fn format_value(session: &mut Session<'_>, format: &str, schema: &Schema) -> Result<Option<String>, GeneratorError> {
    if format.contains('{') {
        return session.template(format);
    }
    let value = match format {
        "date" => time::random_datetime(session, 1970, 2030).format("%Y-%m-%d").to_string(),
        "date-time" => time::rfc3339(&time::random_datetime(session, 1970, 2030)),
        "time" => time::random_datetime(session, 2000, 2000).format("%H:%M:%SZ").to_string(),
        "duration" => {
            let days = session.rng.int_range(0, 30);
            let hours = session.rng.int_range(0, 23);
            let minutes = session.rng.int_range(1, 59);
            format!("P{}DT{}H{}M", days, hours, minutes)
        }
        "email" => internet::email(session, None, None),
        "uuid" => internet::uuid(session),
        "uri" | "url" => internet::url(session),
        "hostname" => internet::domain(session),
        "ipv4" => internet::ipv4(session),
        "ipv6" => internet::ipv6(session),
        "password" => password(session, schema),
        "byte" => {
            let bytes: [u8; 12] = session.rng.bytes();
            base64::engine::general_purpose::STANDARD.encode(bytes)
        }
        "binary" => random_from(session, &format!("{}{}{}", LOWER, UPPER, DIGITS), 16),
        _ => return Ok(None),
    };
    Ok(Some(value))
}
