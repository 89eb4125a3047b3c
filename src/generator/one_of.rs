//! Narrowing a `oneOf` branch so its values stay out of the siblings.

use std::sync::Arc;

use super::schema::{json_equal, Schema, SchemaRef, SchemaType};

/// Types of a schema that constrains nothing but its type.
fn bare_types(schema: &Schema) -> Option<Vec<SchemaType>> {
    let types = schema.types.clone()?;
    let mut rest = schema.clone();
    rest.types = None;
    rest.title = None;
    rest.description = None;
    rest.examples.clear();
    rest.example = None;
    rest.xml = None;
    rest.default = None;
    if rest.is_unconstrained() {
        Some(types)
    } else {
        None
    }
}

fn add_not(schema: &mut Schema, excluded: Schema) {
    let excluded = Arc::new(excluded);
    schema.not = Some(match schema.not.take() {
        Some(existing) => Arc::new(Schema {
            any_of: vec![existing, excluded],
            ..Default::default()
        }),
        None => excluded,
    });
}

/// `branch` minus whatever another branch admits in full. `None` when
/// nothing is left.
pub fn subtract(branch: &SchemaRef, others: &[&SchemaRef]) -> Option<SchemaRef> {
    let mut result = (**branch).clone();
    let mut changed = false;
    for other in others {
        if let Some(excluded) = bare_types(other) {
            let mut types = result.types.clone().unwrap_or_else(|| SchemaType::ALL.to_vec());
            for t in excluded {
                if t == SchemaType::Integer && types.contains(&SchemaType::Number) {
                    add_not(&mut result, Schema::of_type(SchemaType::Integer));
                }
                types.retain(|x| *x != t);
                if t == SchemaType::Number {
                    types.retain(|x| *x != SchemaType::Integer);
                }
            }
            if types.is_empty() {
                return None;
            }
            result.types = Some(types);
            changed = true;
            continue;
        }
        let admitted: Option<Vec<_>> = match (&other.const_value, &other.enum_values) {
            (Some(c), _) => Some(vec![c.clone()]),
            (None, Some(values)) => Some(values.clone()),
            _ => None,
        };
        if let (Some(admitted), Some(values)) = (admitted, &mut result.enum_values) {
            values.retain(|v| !admitted.iter().any(|a| json_equal(a, v)));
            if values.is_empty() {
                return None;
            }
            changed = true;
        }
    }
    if changed {
        Some(Arc::new(result))
    } else {
        Some(branch.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::schema::parse_schema;
    use serde_json::json;

    fn r(v: serde_json::Value) -> SchemaRef {
        Arc::new(parse_schema(&v).unwrap())
    }

    #[test]
    fn number_loses_integer() {
        let number = r(json!({"type": "number"}));
        let integer = r(json!({"type": "integer"}));
        let narrowed = subtract(&number, &[&integer]).unwrap();
        assert_eq!(narrowed.types, Some(vec![SchemaType::Number]));
        assert_eq!(narrowed.not.as_ref().unwrap().types, Some(vec![SchemaType::Integer]));
    }

    #[test]
    fn fully_covered_branch_is_dropped() {
        let integer = r(json!({"type": "integer"}));
        let number = r(json!({"type": "number"}));
        assert!(subtract(&integer, &[&number]).is_none());
    }

    #[test]
    fn enum_values_of_siblings_are_removed() {
        let a = r(json!({"enum": ["x", "y"]}));
        let b = r(json!({"const": "x"}));
        let narrowed = subtract(&a, &[&b]).unwrap();
        assert_eq!(narrowed.enum_values, Some(vec![json!("y")]));
    }
}
