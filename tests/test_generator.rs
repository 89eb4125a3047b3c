//! Tests for schema-driven data generation.

extern crate mokapi_engine;

use mokapi_engine::config::GeneratorConfig;
use mokapi_engine::generator::fakers::data::{FEMALE_FIRST_NAMES, LAST_NAMES, MALE_FIRST_NAMES};
use mokapi_engine::generator::schema::{validate, SchemaSet};
use mokapi_engine::generator::{Generator, GeneratorError, Request};
use serde_json::{json, Value};

fn generator(seed: u64) -> Generator {
    Generator::new(GeneratorConfig::default().with_seed(seed))
}

fn fake(seed: u64, schema: Value) -> Value {
    generator(seed).generate(Request::for_schema(schema).unwrap()).unwrap()
}

fn try_fake(seed: u64, schema: Value) -> Result<Value, GeneratorError> {
    generator(seed).generate(Request::for_schema(schema).unwrap())
}

fn assert_valid(value: &Value, schema: Value) {
    let set = SchemaSet::from_value(schema).unwrap();
    if let Err(e) = validate(value, set.root(), Some(&set)) {
        panic!("{} does not validate: {}", value, e);
    }
}

// ============================================================================
// Schema keywords
// ============================================================================

mod schema_tests {
    use super::*;

    #[test]
    fn test_string_is_string() {
        let value = fake(11, json!({"type": "string"}));
        assert!(value.is_string());
    }

    #[test]
    fn test_enum_picks_a_member() {
        let value = fake(11, json!({"enum": [123, "foo"]}));
        assert!(value == json!(123) || value == json!("foo"));
    }

    #[test]
    fn test_const() {
        assert_eq!(fake(11, json!({"const": "foo"})), json!("foo"));
    }

    #[test]
    fn test_multiple_of() {
        let value = fake(11, json!({"type": "integer", "multipleOf": 3}));
        assert_eq!(value.as_i64().unwrap() % 3, 0);
    }

    #[test]
    fn test_required_properties_are_present() {
        let schema = json!({
            "type": "object",
            "properties": {"foo": {"type": "string"}},
            "required": ["foo"]
        });
        let value = fake(1234567, schema.clone());
        assert!(value["foo"].is_string());
        assert_valid(&value, schema);
    }

    #[test]
    fn test_pattern() {
        let pattern = "^[A-Z]{3}-\\d{2}$";
        let value = fake(5, json!({"type": "string", "pattern": pattern}));
        let re = regex::Regex::new(pattern).unwrap();
        assert!(re.is_match(value.as_str().unwrap()), "{}", value);
    }

    #[test]
    fn test_unique_items_within_bounds() {
        let schema = json!({
            "type": "array",
            "minItems": 2,
            "maxItems": 4,
            "uniqueItems": true,
            "items": {"type": "integer", "minimum": 0, "maximum": 100}
        });
        let value = fake(3, schema.clone());
        let items = value.as_array().unwrap();
        assert!((2..=4).contains(&items.len()));
        assert_valid(&value, schema);
    }

    #[test]
    fn test_all_of_merges() {
        let schema = json!({
            "allOf": [
                {"type": "object", "properties": {"id": {"type": "integer", "minimum": 1}}, "required": ["id"]},
                {"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]}
            ]
        });
        let value = fake(9, schema.clone());
        assert!(value["id"].as_i64().unwrap() >= 1);
        assert!(value["name"].is_string());
        assert_valid(&value, schema);
    }

    #[test]
    fn test_refs_are_followed() {
        let schema = json!({
            "type": "object",
            "properties": {"pet": {"$ref": "#/definitions/Pet"}},
            "required": ["pet"],
            "definitions": {
                "Pet": {"type": "object", "properties": {"age": {"type": "integer", "minimum": 0, "maximum": 20}}, "required": ["age"]}
            }
        });
        let value = fake(2, schema);
        let age = value["pet"]["age"].as_i64().unwrap();
        assert!((0..=20).contains(&age));
    }

    #[test]
    fn test_invalid_length_range() {
        let request = Request::for_schema(json!({"type": "string", "minLength": 5, "maxLength": 2})).unwrap();
        assert!(generator(1).generate(request).is_err());
    }

    #[test]
    fn test_invalid_type_is_rejected_on_ingest() {
        let err = Request::for_schema(json!({"type": 123})).unwrap_err();
        assert_eq!(err.to_string(), "unexpected type for 'type': Integer");
    }
}

// ============================================================================
// Determinism and the faker tree
// ============================================================================

mod faker_tree_tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let schema = json!({"type": "object", "properties": {"a": {"type": "string"}, "b": {"type": "number"}}});
        let a = generator(42);
        let b = generator(42);
        for _ in 0..3 {
            let x = a.generate(Request::for_schema(schema.clone()).unwrap()).unwrap();
            let y = b.generate(Request::for_schema(schema.clone()).unwrap()).unwrap();
            assert_eq!(x, y);
        }
    }

    #[test]
    fn test_person_names_come_from_the_person_leaves() {
        let schema = json!({
            "type": "object",
            "properties": {"firstname": {"type": "string"}, "lastname": {"type": "string"}},
            "required": ["firstname", "lastname"]
        });
        let request = Request::for_schema(schema).unwrap().with_path(["person"]);
        let value = generator(1234567).generate(request).unwrap();
        let first = value["firstname"].as_str().unwrap();
        let last = value["lastname"].as_str().unwrap();
        assert!(FEMALE_FIRST_NAMES.contains(&first) || MALE_FIRST_NAMES.contains(&first), "{}", first);
        assert!(LAST_NAMES.contains(&last), "{}", last);
    }

    #[test]
    fn test_named_path_without_schema() {
        let value = generator(8).generate(Request::new().with_path(["email"])).unwrap();
        assert!(value.as_str().unwrap().contains('@'), "{}", value);
    }

    #[test]
    fn test_find_node() {
        let g = generator(1);
        let node = g.find_node("firstname").unwrap();
        assert_eq!(node.name(), "firstname");
        assert!(node.is_leaf());
        assert!(g.find_node("does-not-exist").is_none());
    }
}

// ============================================================================
// Keywords, validated across seeds
// ============================================================================

mod keyword_table_tests {
    use super::*;

    const SEEDS: u64 = 20;

    fn assert_always_valid(cases: &[(&str, Value)]) {
        for (name, schema) in cases {
            for seed in 0..SEEDS {
                let value = match try_fake(seed, schema.clone()) {
                    Ok(v) => v,
                    Err(e) => panic!("{} (seed {}): {}", name, seed, e),
                };
                let set = SchemaSet::from_value(schema.clone()).unwrap();
                if let Err(e) = validate(&value, set.root(), Some(&set)) {
                    panic!("{} (seed {}): {} does not validate: {}", name, seed, value, e);
                }
            }
        }
    }

    #[test]
    fn test_composition() {
        assert_always_valid(&[
            ("oneOf", json!({"oneOf": [{"type": "integer"}, {"type": "string", "maxLength": 5}]})),
            ("oneOf overlapping", json!({"oneOf": [{"type": "integer"}, {"type": "number"}]})),
            (
                "anyOf",
                json!({"anyOf": [
                    {"type": "string", "format": "email"},
                    {"type": "integer", "minimum": 10, "maximum": 20}
                ]}),
            ),
            ("not", json!({"not": {"type": "integer"}})),
            (
                "if/then/else",
                json!({
                    "type": "object",
                    "properties": {"kind": {"enum": ["a", "b"]}},
                    "required": ["kind"],
                    "if": {"properties": {"kind": {"const": "a"}}},
                    "then": {"properties": {"size": {"type": "integer", "minimum": 1}}, "required": ["size"]},
                    "else": {"properties": {"label": {"type": "string"}}, "required": ["label"]}
                }),
            ),
        ]);
    }

    #[test]
    fn test_object_keywords() {
        assert_always_valid(&[
            (
                "dependentRequired",
                json!({
                    "type": "object",
                    "properties": {"card": {"type": "string"}, "billing": {"type": "string"}},
                    "dependentRequired": {"card": ["billing"]}
                }),
            ),
            (
                "dependentSchemas",
                json!({
                    "type": "object",
                    "properties": {"card": {"type": "string"}},
                    "dependentSchemas": {
                        "card": {"properties": {"cvv": {"type": "integer", "minimum": 100, "maximum": 999}}, "required": ["cvv"]}
                    }
                }),
            ),
            (
                "patternProperties",
                json!({
                    "type": "object",
                    "patternProperties": {"^x-[a-z]{3}$": {"type": "integer"}},
                    "additionalProperties": false,
                    "maxProperties": 1
                }),
            ),
            (
                "propertyNames",
                json!({
                    "type": "object",
                    "propertyNames": {"pattern": "^[a-z]{4}$"},
                    "minProperties": 2,
                    "maxProperties": 3
                }),
            ),
        ]);
    }

    #[test]
    fn test_array_keywords() {
        assert_always_valid(&[
            (
                "contains",
                json!({
                    "type": "array",
                    "items": {"type": "integer", "minimum": 0, "maximum": 100},
                    "contains": {"type": "integer", "minimum": 90},
                    "minContains": 2,
                    "maxContains": 3,
                    "maxItems": 6
                }),
            ),
            (
                "prefixItems",
                json!({
                    "type": "array",
                    "prefixItems": [{"type": "string"}, {"type": "integer"}],
                    "items": false
                }),
            ),
            (
                "x-shuffleItems",
                json!({
                    "type": "array",
                    "items": {"type": "integer"},
                    "contains": {"const": 7},
                    "minItems": 3,
                    "maxItems": 3,
                    "x-shuffleItems": true
                }),
            ),
        ]);
    }

    #[test]
    fn test_shuffle_moves_reserved_items() {
        let schema = json!({
            "type": "array",
            "items": {"type": "integer"},
            "contains": {"const": 7},
            "minItems": 3,
            "maxItems": 3,
            "x-shuffleItems": true
        });
        let moved = (0..SEEDS).any(|seed| fake(seed, schema.clone())[2] != json!(7));
        assert!(moved);
    }

    #[test]
    fn test_scalar_keywords() {
        assert_always_valid(&[
            ("nullable", json!({"type": "string", "nullable": true, "maxLength": 4})),
            ("exclusive number", json!({"type": "number", "exclusiveMinimum": 1, "exclusiveMaximum": 2})),
            ("email with maxLength", json!({"type": "string", "format": "email", "maxLength": 12})),
            ("hostname with maxLength", json!({"type": "string", "format": "hostname", "maxLength": 3})),
        ]);
    }

    #[test]
    fn test_exclusive_integer_bounds() {
        let schema = json!({"type": "integer", "exclusiveMinimum": 1, "exclusiveMaximum": 3});
        for seed in 0..SEEDS {
            assert_eq!(fake(seed, schema.clone()), json!(2));
        }
    }

    #[test]
    fn test_fixed_length_format_out_of_bounds() {
        let err = try_fake(1, json!({"type": "string", "format": "uuid", "maxLength": 10})).unwrap_err();
        assert!(matches!(err, GeneratorError::Unsatisfiable(_)), "{:?}", err);
        assert!(err.to_string().contains("format 'uuid'"), "{}", err);
    }
}

// ============================================================================
// Recursive schemas
// ============================================================================

mod recursion_tests {
    use super::*;

    #[test]
    fn test_required_recursion_with_sibling_keyword() {
        let schema = json!({
            "$defs": {
                "node": {
                    "type": "object",
                    "properties": {"child": {"$ref": "#/$defs/node", "type": "object"}},
                    "required": ["child"]
                }
            },
            "$ref": "#/$defs/node"
        });
        let err = try_fake(1, schema).unwrap_err();
        assert!(matches!(err, GeneratorError::Recursion(_)), "{:?}", err);
    }

    #[test]
    fn test_nullable_recursion_ends_in_null() {
        let schema = json!({
            "$defs": {
                "node": {
                    "type": ["object", "null"],
                    "properties": {"child": {"$ref": "#/$defs/node", "type": ["object", "null"]}},
                    "required": ["child"]
                }
            },
            "$ref": "#/$defs/node"
        });
        for seed in 0..10 {
            let value = fake(seed, schema.clone());
            let mut node = &value;
            let mut depth = 0;
            while !node.is_null() {
                node = &node["child"];
                depth += 1;
                assert!(depth <= 4, "{}", value);
            }
            assert_valid(&value, schema.clone());
        }
    }
}
