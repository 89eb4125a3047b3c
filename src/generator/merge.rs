//! Intersection of schemas for `allOf`.

use std::sync::Arc;

use super::schema::{json_equal, BoolOrSchema, Exclusive, Schema, SchemaRef, SchemaType};
use super::GeneratorError;

type Merged = Result<Schema, GeneratorError>;

pub fn merge(a: &Schema, b: &Schema) -> Merged {
    if a.never || b.never {
        return Ok(Schema {
            never: true,
            ..Default::default()
        });
    }
    let mut r = a.clone();

    r.reference = a.reference.clone().or_else(|| b.reference.clone());
    r.types = merge_types(&a.types, &b.types)?;

    r.enum_values = match (&a.enum_values, &b.enum_values) {
        (Some(x), Some(y)) => {
            let common: Vec<_> = x.iter().filter(|v| y.iter().any(|w| json_equal(v, w))).cloned().collect();
            if common.is_empty() {
                return Err(GeneratorError::Unsatisfiable("allOf: enums have no common value".to_string()));
            }
            Some(common)
        }
        (x, y) => x.clone().or_else(|| y.clone()),
    };
    r.const_value = match (&a.const_value, &b.const_value) {
        (Some(x), Some(y)) if !json_equal(x, y) => {
            return Err(GeneratorError::Unsatisfiable(format!("allOf: const {} conflicts with {}", x, y)))
        }
        (x, y) => x.clone().or_else(|| y.clone()),
    };
    r.default = a.default.clone().or_else(|| b.default.clone());

    merge_lower(&mut r, a, b);
    merge_upper(&mut r, a, b);
    r.multiple_of = match (a.multiple_of, b.multiple_of) {
        (Some(x), Some(y)) => Some(lcm_f64(x, y)),
        (x, y) => x.or(y),
    };

    r.min_length = tight_max(a.min_length, b.min_length);
    r.max_length = tight_min(a.max_length, b.max_length);
    r.pattern = a.pattern.clone().filter(|p| !p.is_empty()).or_else(|| b.pattern.clone());
    r.format = a.format.clone().filter(|f| !f.is_empty()).or_else(|| b.format.clone());

    r.items = merge_bool_or_schema(&a.items, &b.items)?;
    r.unevaluated_items = merge_bool_or_schema(&a.unevaluated_items, &b.unevaluated_items)?;
    r.contains = merge_optional(&a.contains, &b.contains)?;
    r.prefix_items = merge_prefix(&a.prefix_items, &b.prefix_items)?;
    r.min_items = tight_max(a.min_items, b.min_items);
    r.max_items = tight_min(a.max_items, b.max_items);
    r.min_contains = tight_max(a.min_contains, b.min_contains);
    r.max_contains = tight_min(a.max_contains, b.max_contains);
    r.unique_items = a.unique_items || b.unique_items;
    r.shuffle_items = a.shuffle_items || b.shuffle_items;

    r.properties = match (&a.properties, &b.properties) {
        (Some(x), Some(y)) => Some(merge_keyed(x, y)?),
        (x, y) => x.clone().or_else(|| y.clone()),
    };
    r.pattern_properties = merge_keyed(&a.pattern_properties, &b.pattern_properties)?;
    r.additional_properties = merge_bool_or_schema(&a.additional_properties, &b.additional_properties)?;
    r.property_names = merge_optional(&a.property_names, &b.property_names)?;
    for name in &b.required {
        if !r.required.contains(name) {
            r.required.push(name.clone());
        }
    }
    r.min_properties = tight_max(a.min_properties, b.min_properties);
    r.max_properties = tight_min(a.max_properties, b.max_properties);
    r.dependent_required.extend(b.dependent_required.iter().cloned());
    r.dependent_schemas.extend(b.dependent_schemas.iter().cloned());

    r.all_of.extend(b.all_of.iter().cloned());
    if r.any_of.is_empty() {
        r.any_of = b.any_of.clone();
    }
    if r.one_of.is_empty() {
        r.one_of = b.one_of.clone();
    }
    r.not = match (&a.not, &b.not) {
        // not A and not B == not (A or B)
        (Some(x), Some(y)) => Some(Arc::new(Schema {
            any_of: vec![x.clone(), y.clone()],
            ..Default::default()
        })),
        (x, y) => x.clone().or_else(|| y.clone()),
    };
    if r.if_schema.is_none() {
        r.if_schema = b.if_schema.clone();
        r.then_schema = b.then_schema.clone();
        r.else_schema = b.else_schema.clone();
    }

    r.xml = a.xml.clone().or_else(|| b.xml.clone());
    r.title = a.title.clone().or_else(|| b.title.clone());
    if r.examples.is_empty() {
        r.examples = b.examples.clone();
    }
    r.example = a.example.clone().or_else(|| b.example.clone());
    Ok(r)
}

fn merge_types(a: &Option<Vec<SchemaType>>, b: &Option<Vec<SchemaType>>) -> Result<Option<Vec<SchemaType>>, GeneratorError> {
    let (x, y) = match (a, b) {
        (Some(x), Some(y)) => (x, y),
        (x, y) => return Ok(x.clone().or_else(|| y.clone())),
    };
    let mut common = Vec::new();
    for t in x {
        let shared = match t {
            SchemaType::Number if y.contains(&SchemaType::Integer) && !y.contains(&SchemaType::Number) => {
                Some(SchemaType::Integer)
            }
            SchemaType::Integer if y.contains(&SchemaType::Number) || y.contains(&SchemaType::Integer) => {
                Some(SchemaType::Integer)
            }
            other if y.contains(other) => Some(*other),
            _ => None,
        };
        if let Some(s) = shared {
            if !common.contains(&s) {
                common.push(s);
            }
        }
    }
    if common.is_empty() {
        return Err(GeneratorError::NoSharedTypes);
    }
    Ok(Some(common))
}

fn merge_lower(r: &mut Schema, a: &Schema, b: &Schema) {
    let bound = match (a.lower_bound(), b.lower_bound()) {
        (Some(x), Some(y)) => Some(if x.0 > y.0 || (x.0 == y.0 && x.1) { x } else { y }),
        (x, y) => x.or(y),
    };
    if let Some((value, exclusive)) = bound {
        r.minimum = Some(value);
        r.exclusive_minimum = if exclusive { Some(Exclusive::Flag(true)) } else { None };
    }
}

fn merge_upper(r: &mut Schema, a: &Schema, b: &Schema) {
    let bound = match (a.upper_bound(), b.upper_bound()) {
        (Some(x), Some(y)) => Some(if x.0 < y.0 || (x.0 == y.0 && x.1) { x } else { y }),
        (x, y) => x.or(y),
    };
    if let Some((value, exclusive)) = bound {
        r.maximum = Some(value);
        r.exclusive_maximum = if exclusive { Some(Exclusive::Flag(true)) } else { None };
    }
}

fn tight_max(a: Option<usize>, b: Option<usize>) -> Option<usize> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    }
}

fn tight_min(a: Option<usize>, b: Option<usize>) -> Option<usize> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    }
}

fn merge_refs(a: &SchemaRef, b: &SchemaRef) -> Result<SchemaRef, GeneratorError> {
    if Arc::ptr_eq(a, b) {
        return Ok(a.clone());
    }
    Ok(Arc::new(merge(a, b)?))
}

fn merge_optional(a: &Option<SchemaRef>, b: &Option<SchemaRef>) -> Result<Option<SchemaRef>, GeneratorError> {
    match (a, b) {
        (Some(x), Some(y)) => Ok(Some(merge_refs(x, y)?)),
        (x, y) => Ok(x.clone().or_else(|| y.clone())),
    }
}

fn merge_bool_or_schema(a: &Option<BoolOrSchema>, b: &Option<BoolOrSchema>) -> Result<Option<BoolOrSchema>, GeneratorError> {
    Ok(match (a, b) {
        (Some(BoolOrSchema::Bool(false)), _) | (_, Some(BoolOrSchema::Bool(false))) => Some(BoolOrSchema::Bool(false)),
        (Some(BoolOrSchema::Schema(x)), Some(BoolOrSchema::Schema(y))) => Some(BoolOrSchema::Schema(merge_refs(x, y)?)),
        (Some(BoolOrSchema::Schema(x)), _) | (_, Some(BoolOrSchema::Schema(x))) => Some(BoolOrSchema::Schema(x.clone())),
        (x, y) => x.clone().or_else(|| y.clone()),
    })
}

fn merge_prefix(a: &[SchemaRef], b: &[SchemaRef]) -> Result<Vec<SchemaRef>, GeneratorError> {
    let mut out = Vec::with_capacity(a.len().max(b.len()));
    for i in 0.. {
        out.push(match (a.get(i), b.get(i)) {
            (Some(x), Some(y)) => merge_refs(x, y)?,
            (Some(x), None) | (None, Some(x)) => x.clone(),
            (None, None) => break,
        });
    }
    Ok(out)
}

fn merge_keyed(a: &[(String, SchemaRef)], b: &[(String, SchemaRef)]) -> Result<Vec<(String, SchemaRef)>, GeneratorError> {
    let mut out: Vec<(String, SchemaRef)> = a.to_vec();
    for (key, schema) in b {
        match out.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = merge_refs(&entry.1, schema)?,
            None => out.push((key.clone(), schema.clone())),
        }
    }
    Ok(out)
}

/// Rational form `num/den` of a decimal, with `den` a power of ten.
fn to_fraction(x: f64) -> (u128, u128) {
    let mut den: u128 = 1;
    let mut scaled = x;
    while scaled.fract().abs() > 1e-9 && den < 1_000_000_000_000 {
        scaled *= 10.0;
        den *= 10;
    }
    (scaled.round().abs() as u128, den)
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn lcm(a: u128, b: u128) -> u128 {
    if a == 0 || b == 0 {
        return 0;
    }
    a / gcd(a, b) * b
}

/// Least common multiple of two positive decimals.
pub fn lcm_f64(a: f64, b: f64) -> f64 {
    let (an, ad) = to_fraction(a);
    let (bn, bd) = to_fraction(b);
    let den = lcm(ad, bd);
    let x = an * (den / ad);
    let y = bn * (den / bd);
    let l = lcm(x, y);
    if l == 0 {
        return a.max(b);
    }
    l as f64 / den as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::schema::parse_schema;
    use serde_json::json;

    fn s(v: serde_json::Value) -> Schema {
        parse_schema(&v).unwrap()
    }

    #[test]
    fn lcm_over_rationals() {
        assert_eq!(lcm_f64(4.0, 6.0), 12.0);
        assert!((lcm_f64(0.5, 0.75) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn tightest_bounds_and_type_intersection() {
        let m = merge(
            &s(json!({"type": ["number", "string"], "minimum": 1, "maximum": 10})),
            &s(json!({"type": "integer", "exclusiveMinimum": 3, "maximum": 7})),
        )
        .unwrap();
        assert_eq!(m.types, Some(vec![SchemaType::Integer]));
        assert_eq!(m.lower_bound(), Some((3.0, true)));
        assert_eq!(m.upper_bound(), Some((7.0, false)));
    }

    #[test]
    fn disjoint_types_fail() {
        let err = merge(&s(json!({"type": "string"})), &s(json!({"type": "integer"}))).unwrap_err();
        assert_eq!(err.to_string(), "allOf: no shared types");
    }

    #[test]
    fn properties_merge_per_key_and_required_unions() {
        let m = merge(
            &s(json!({"properties": {"a": {"type": "string"}}, "required": ["a"]})),
            &s(json!({"properties": {"a": {"maxLength": 3}, "b": {}}, "required": ["b", "a"]})),
        )
        .unwrap();
        let props = m.properties.unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].1.max_length, Some(3));
        assert_eq!(m.required, vec!["a", "b"]);
    }
}
