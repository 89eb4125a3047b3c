use std::sync::Arc;

use serde_json::Value;

use super::merge::merge;
use super::schema::{json_equal, BoolOrSchema, Schema, SchemaRef};
use super::session::Session;
use super::GeneratorError;

/// Draws per item while looking for a value not yet in the array.
const UNIQUE_RETRIES: usize = 10;

pub fn build(session: &mut Session<'_>, path: &[String], schema: &Schema) -> Result<Value, GeneratorError> {
    if let (Some(a), Some(b)) = (schema.min_items, schema.max_items) {
        if a > b {
            return Err(GeneratorError::InvalidRange {
                field: "minItems",
                message: format!("minItems ({}) must not exceed maxItems ({})", a, b),
            });
        }
    }
    let min_contains = match &schema.contains {
        Some(_) => schema.min_contains.unwrap_or(1),
        None => 0,
    };
    if let Some(max) = schema.max_items {
        if min_contains > max {
            return Err(GeneratorError::InvalidRange {
                field: "minContains",
                message: format!("minContains ({}) must not exceed maxItems ({})", min_contains, max),
            });
        }
    }
    if let (Some(a), Some(b)) = (schema.min_contains, schema.max_contains) {
        if a > b {
            return Err(GeneratorError::InvalidRange {
                field: "minContains",
                message: format!("minContains ({}) must not exceed maxContains ({})", a, b),
            });
        }
    }

    let config = session.config;
    let mut min = schema.min_items.unwrap_or(config.default_min_items).max(min_contains);
    let mut max = schema.max_items.unwrap_or_else(|| config.default_max_items.max(min));
    if matches!(schema.items, Some(BoolOrSchema::Bool(false))) {
        max = max.min(schema.prefix_items.len());
    }
    if min > max {
        if schema.min_items.is_some() {
            return Err(GeneratorError::Unsatisfiable(format!(
                "array needs at least {} items but allows at most {}",
                min, max
            )));
        }
        min = max;
    }
    let len = session.rng.usize_range(min, max);

    let rest = schema
        .items
        .as_ref()
        .and_then(|i| i.schema())
        .or_else(|| schema.unevaluated_items.as_ref().and_then(|u| u.schema()))
        .cloned();
    let contains = match &schema.contains {
        Some(c) => Some(session.resolve(c)?),
        None => None,
    };
    let contains_from = len.saturating_sub(min_contains);

    let mut items: Vec<Value> = Vec::with_capacity(len);
    for i in 0..len {
        let base = schema.prefix_items.get(i).cloned().or_else(|| rest.clone());
        let item_schema = match (&contains, i >= contains_from) {
            (Some(c), true) => Some(match &base {
                Some(b) => {
                    let resolved = session.resolve(b)?;
                    Arc::new(merge(&resolved, c)?)
                }
                None => c.clone(),
            }),
            _ => base,
        };
        match next_item(session, path, item_schema.as_ref(), &items, schema.unique_items) {
            Ok(v) => items.push(v),
            Err(GeneratorError::Recursion(_)) if i >= min => break,
            Err(e) => return Err(e),
        }
    }

    if let (Some(c), Some(max_contains)) = (&contains, schema.max_contains) {
        limit_contains(session, path, schema, &mut items, c, max_contains, contains_from, rest.as_ref())?;
    }

    if schema.shuffle_items {
        session.rng.shuffle(&mut items);
    }
    Ok(Value::Array(items))
}

fn next_item(
    session: &mut Session<'_>,
    path: &[String],
    schema: Option<&SchemaRef>,
    items: &[Value],
    unique: bool,
) -> Result<Value, GeneratorError> {
    let tries = if unique { UNIQUE_RETRIES } else { 1 };
    for _ in 0..tries {
        let snapshot = session.context.snapshot();
        let value = session.generate(path, schema);
        session.context.restore(snapshot);
        let value = value?;
        if !unique || !items.iter().any(|v| json_equal(v, &value)) {
            return Ok(value);
        }
    }
    Err(GeneratorError::UniqueItems)
}

/// Replaces surplus `contains` matches outside the reserved slots.
#[allow(clippy::too_many_arguments)]
fn limit_contains(
    session: &mut Session<'_>,
    path: &[String],
    schema: &Schema,
    items: &mut [Value],
    contains: &SchemaRef,
    max_contains: usize,
    reserved_from: usize,
    rest: Option<&SchemaRef>,
) -> Result<(), GeneratorError> {
    let mut count = items.iter().filter(|v| session.validates(v, contains)).count();
    for i in 0..reserved_from.min(items.len()) {
        if count <= max_contains {
            break;
        }
        if !session.validates(&items[i], contains) {
            continue;
        }
        let item_schema = schema.prefix_items.get(i).or(rest).cloned();
        for _ in 0..UNIQUE_RETRIES {
            let others: Vec<Value> = items.iter().enumerate().filter(|(j, _)| *j != i).map(|(_, v)| v.clone()).collect();
            let v = next_item(session, path, item_schema.as_ref(), &others, schema.unique_items)?;
            if !session.validates(&v, contains) {
                items[i] = v;
                count -= 1;
                break;
            }
        }
    }
    if count > max_contains {
        return Err(GeneratorError::Unsatisfiable(format!(
            "cannot keep contains matches at or below maxContains ({})",
            max_contains
        )));
    }
    Ok(())
}
