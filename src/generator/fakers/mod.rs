//! The built-in faker catalog.
//!
//! Every domain module contributes its nodes; [`default_tree`] hangs them
//! under a single root. Sibling order matters: the first child that
//! consumes the path tokens and accepts the schema wins.

pub mod address;
pub mod commerce;
pub mod data;
pub mod internet;
pub mod misc;
pub mod person;
pub mod time;

use serde_json::Value;

use super::number;
use super::schema::{Schema, SchemaType};
use super::session::Session;
use super::tree::{FakeError, FakeRequest, Node, NodeRef};

pub fn default_tree() -> NodeRef {
    let mut children = Vec::new();
    children.extend(person::nodes());
    children.extend(internet::nodes());
    children.extend(address::nodes());
    children.extend(commerce::nodes());
    children.extend(time::nodes());
    children.extend(misc::nodes());
    Node::branch("root", children)
}

/// The single concrete type requested, if the schema names one.
pub(crate) fn wanted(request: &FakeRequest) -> Option<SchemaType> {
    request.schema().non_null_types().first().copied()
}

pub(crate) fn any(_: &FakeRequest) -> bool {
    true
}

pub(crate) fn is_string(request: &FakeRequest) -> bool {
    request.schema().allows_type(SchemaType::String)
}

pub(crate) fn is_integer(request: &FakeRequest) -> bool {
    matches!(wanted(request), Some(SchemaType::Integer) | Some(SchemaType::Number))
}

pub(crate) fn is_number(request: &FakeRequest) -> bool {
    request.schema().allows_type(SchemaType::Number) || request.schema().allows_type(SchemaType::Integer)
}

pub(crate) fn is_string_or_integer(request: &FakeRequest) -> bool {
    is_string(request) || is_integer(request)
}

pub(crate) fn pick(session: &mut Session<'_>, items: &[&'static str]) -> &'static str {
    session.rng.pick(items).copied().unwrap_or_default()
}

pub(crate) fn text(s: impl Into<String>) -> Result<Value, FakeError> {
    Ok(Value::String(s.into()))
}

/// Random digits, the first one non-zero.
pub(crate) fn digits(session: &mut Session<'_>, len: usize) -> String {
    (0..len)
        .map(|i| {
            let lo = if i == 0 { 1 } else { 0 };
            char::from(b'0' + session.rng.int_range(lo, 9) as u8)
        })
        .collect()
}

/// Copy of the request schema with `lo..=hi` filled in where the schema
/// leaves a side open.
fn bounded(request: &FakeRequest, lo: f64, hi: f64) -> Schema {
    let mut schema = request.schema().clone();
    let lower = schema.lower_bound();
    let upper = schema.upper_bound();
    if lower.is_none() {
        schema.minimum = Some(match upper {
            Some((u, _)) if u < lo => u - (hi - lo),
            _ => lo,
        });
    }
    if upper.is_none() {
        schema.maximum = Some(match lower {
            Some((l, _)) if l > hi => l + (hi - lo),
            _ => hi,
        });
    }
    schema
}

/// Integer in `lo..=hi` unless the schema bounds say otherwise.
pub(crate) fn integer_in(session: &mut Session<'_>, request: &FakeRequest, lo: i64, hi: i64) -> Result<Value, FakeError> {
    let schema = bounded(request, lo as f64, hi as f64);
    Ok(number::integer(session, &schema)?)
}

/// Number in `lo..=hi`, rounded to `decimals` when the schema has no
/// `multipleOf`. Integer schemas get an integer.
pub(crate) fn number_in(
    session: &mut Session<'_>,
    request: &FakeRequest,
    lo: f64,
    hi: f64,
    decimals: i32,
) -> Result<Value, FakeError> {
    if wanted(request) == Some(SchemaType::Integer) {
        return integer_in(session, request, lo.ceil() as i64, hi.floor() as i64);
    }
    let schema = bounded(request, lo, hi);
    let value = number::float(session, &schema)?;
    if schema.multiple_of.is_some() {
        return Ok(value);
    }
    let raw = value.as_f64().unwrap_or(lo);
    let factor = 10f64.powi(decimals);
    let rounded = (raw * factor).round() / factor;
    if session.validates(&number::float_value(rounded), &schema) {
        Ok(number::float_value(rounded))
    } else {
        Ok(value)
    }
}

/// String when the schema asks for one, else the number `n`.
pub(crate) fn string_or_number(request: &FakeRequest, s: String, n: i64) -> Result<Value, FakeError> {
    match wanted(request) {
        Some(SchemaType::Integer) | Some(SchemaType::Number) => Ok(Value::from(n)),
        _ => text(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::context::tokenize;

    #[test]
    fn root_holds_every_domain() {
        let root = default_tree();
        for name in ["firstname", "email", "city", "currency", "createdat", "color", "pet", "file"] {
            assert!(root.find_by_name(name).is_some(), "missing {}", name);
        }
    }

    #[test]
    fn camel_case_paths_tokenize_onto_node_names() {
        let tokens = tokenize(&["petName".to_string()]);
        assert_eq!(tokens, vec!["pet", "name"]);
    }
}
