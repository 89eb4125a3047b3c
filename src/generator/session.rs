use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::GeneratorConfig;
use crate::event_loop::ScriptCallback;

use super::context::{tokenize, Context};
use super::rng::Random;
use super::schema::{validate, Schema, SchemaError, SchemaRef, SchemaSet, SchemaType};
use super::tree::{self, FakeError, FakeRequest, NodeRef};
use super::{array, merge, number, object, one_of, string, GeneratorError, ScriptInvoker};

/// Nesting below which unconstrained schemas may still become containers.
const MAX_FREE_CONTAINER_DEPTH: usize = 3;

/// State of one generation call.
pub struct Session<'g> {
    pub rng: Random,
    pub context: Context,
    pub(crate) config: &'g GeneratorConfig,
    refs: Option<&'g SchemaSet>,
    tree: NodeRef,
    invoker: &'g mut dyn ScriptInvoker,
    stack: Vec<usize>,
    depth: usize,
    /// Merged `$ref` + siblings per source schema, so that a recursive
    /// reference resolves to the same `Arc` at every level.
    merged: RefCell<HashMap<usize, (SchemaRef, SchemaRef)>>,
}

impl<'g> Session<'g> {
    pub(crate) fn new(
        rng: Random,
        context: Context,
        config: &'g GeneratorConfig,
        refs: Option<&'g SchemaSet>,
        tree: NodeRef,
        invoker: &'g mut dyn ScriptInvoker,
    ) -> Self {
        Session {
            rng,
            context,
            config,
            refs,
            tree,
            invoker,
            stack: vec![],
            depth: 0,
            merged: RefCell::new(HashMap::new()),
        }
    }

    pub(crate) fn call_script(&mut self, callback: &ScriptCallback, args: Vec<Value>) -> Result<Value, GeneratorError> {
        self.invoker.call(callback, args)
    }

    pub fn validates(&self, value: &Value, schema: &Schema) -> bool {
        validate(value, schema, self.refs).is_ok()
    }

    pub(crate) fn check(&self, value: &Value, schema: &Schema) -> Result<(), GeneratorError> {
        validate(value, schema, self.refs).map_err(GeneratorError::from)
    }

    /// Follows `$ref`. A reference with sibling keywords resolves to the
    /// merge of target and siblings.
    pub(crate) fn resolve(&self, schema: &SchemaRef) -> Result<SchemaRef, GeneratorError> {
        let mut current = schema.clone();
        for _ in 0..32 {
            let reference = match &current.reference {
                Some(r) => r.clone(),
                None => return Ok(current),
            };
            let refs = self
                .refs
                .ok_or_else(|| SchemaError::UnresolvedRef(reference.clone()))?;
            let target = refs.resolve(&reference)?;
            let mut rest = (*current).clone();
            rest.reference = None;
            current = if rest.is_unconstrained() {
                target
            } else {
                self.merge_reference(&current, &target, &rest)?
            };
        }
        Err(GeneratorError::Unsatisfiable("reference chain too long".to_string()))
    }

    fn merge_reference(
        &self,
        source: &SchemaRef,
        target: &SchemaRef,
        rest: &Schema,
    ) -> Result<SchemaRef, GeneratorError> {
        let key = Arc::as_ptr(source) as usize;
        if let Some((_, merged)) = self.merged.borrow().get(&key) {
            return Ok(merged.clone());
        }
        let target = self.resolve(target)?;
        let merged = Arc::new(merge::merge(&target, rest)?);
        // The source is kept alive next to its merge so the key cannot be reused.
        self.merged
            .borrow_mut()
            .insert(key, (source.clone(), merged.clone()));
        Ok(merged)
    }

    /// Runs the resolution pipeline for one value.
    pub fn generate(&mut self, path: &[String], schema: Option<&SchemaRef>) -> Result<Value, GeneratorError> {
        let schema = match schema {
            Some(s) => self.resolve(s)?,
            None => return self.unguided(path),
        };
        let key = Arc::as_ptr(&schema) as usize;
        let entered = self.stack.iter().filter(|k| **k == key).count();
        if entered > self.config.recursion_depth {
            if schema.is_nullable() {
                return Ok(Value::Null);
            }
            return Err(GeneratorError::Recursion(path.join(".")));
        }
        self.stack.push(key);
        self.depth += 1;
        let result = self.generate_resolved(path, &schema);
        self.depth -= 1;
        self.stack.pop();
        result
    }

    pub(crate) fn generate_resolved(&mut self, path: &[String], schema: &SchemaRef) -> Result<Value, GeneratorError> {
        if schema.never {
            return Err(GeneratorError::Unsatisfiable(format!(
                "no value allowed at '{}'",
                path.join(".")
            )));
        }

        if let Some(last) = path.last() {
            if let Some(previous) = self.context.get(last) {
                if self.validates(previous, schema) {
                    return Ok(previous.clone());
                }
            }
        }

        if let Some(c) = &schema.const_value {
            return Ok(c.clone());
        }
        if let Some(values) = &schema.enum_values {
            if let Some(choice) = self.rng.pick(values).cloned() {
                if let Some(last) = path.last() {
                    self.context.set(last, choice.clone());
                }
                return Ok(choice);
            }
        }

        if schema.is_nullable() {
            if schema.non_null_types().is_empty() {
                return Ok(Value::Null);
            }
            if self.rng.chance(self.config.nullable_probability) {
                return Ok(Value::Null);
            }
        }

        if !schema.all_of.is_empty() {
            return self.all_of(path, schema);
        }
        if !schema.any_of.is_empty() {
            return self.any_of(path, schema);
        }
        if !schema.one_of.is_empty() {
            return self.one_of(path, schema);
        }

        let schema = self.narrow_type(schema);

        if schema.allows_type(SchemaType::Object) && has_object_body(&schema) {
            return object::build(self, path, &schema);
        }
        if schema.is_array_like() {
            return array::build(self, path, &schema);
        }

        if !path.is_empty() {
            if let Some(value) = self.fake(path, Some(&schema))? {
                return Ok(value);
            }
        }
        self.schema_only(path, &schema)
    }

    /// Picks one of several non-null types, so later steps see a single one.
    fn narrow_type(&mut self, schema: &SchemaRef) -> SchemaRef {
        let types = schema.non_null_types();
        if types.len() <= 1 {
            return schema.clone();
        }
        let chosen = *self.rng.pick(&types).unwrap_or(&types[0]);
        let mut narrowed = (**schema).clone();
        narrowed.types = Some(vec![chosen]);
        Arc::new(narrowed)
    }

    /// Value for a path without any schema: a faker if one matches,
    /// otherwise a random value.
    fn unguided(&mut self, path: &[String]) -> Result<Value, GeneratorError> {
        if !path.is_empty() {
            if let Some(value) = self.fake(path, None)? {
                return Ok(value);
            }
        }
        self.schema_only(path, &Arc::new(Schema::default()))
    }

    /// Asks the faker tree. `None` when no leaf matches, the leaf declines
    /// or its value does not validate.
    pub(crate) fn fake(&mut self, path: &[String], schema: Option<&SchemaRef>) -> Result<Option<Value>, GeneratorError> {
        let request = FakeRequest {
            path: path.to_vec(),
            tokens: tokenize(path),
            schema: schema.cloned(),
        };
        let root = self.tree.clone();
        let node = match tree::resolve(&root, self, &request)? {
            Some(n) => n,
            None => return Ok(None),
        };
        match node.fake(self, &request) {
            Ok(value) => match schema {
                Some(s) if !self.validates(&value, s) => {
                    log::trace!("faker '{}' produced an invalid value for {}", node.name(), s);
                    Ok(None)
                }
                _ => Ok(Some(value)),
            },
            Err(FakeError::NotSupported) => Ok(None),
            Err(FakeError::Failed(e)) => Err(e),
        }
    }

    /// Node that `path` resolves to, without running it.
    pub(crate) fn lookup(&mut self, path: &[String], schema: Option<&SchemaRef>) -> Result<Option<NodeRef>, GeneratorError> {
        let request = FakeRequest {
            path: path.to_vec(),
            tokens: tokenize(path),
            schema: schema.cloned(),
        };
        let root = self.tree.clone();
        tree::resolve(&root, self, &request)
    }

    /// Expands `{name}` placeholders of a format template with faker output.
    pub(crate) fn template(&mut self, template: &str) -> Result<Option<String>, GeneratorError> {
        let mut out = String::new();
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            let close = match rest[open..].find('}') {
                Some(c) => open + c,
                None => break,
            };
            out.push_str(&rest[..open]);
            let name = rest[open + 1..close].trim();
            let schema = Arc::new(Schema::of_type(SchemaType::String));
            match self.fake(&[name.to_string()], Some(&schema))? {
                Some(Value::String(s)) => out.push_str(&s),
                Some(other) => out.push_str(&other.to_string()),
                None => return Ok(None),
            }
            rest = &rest[close + 1..];
        }
        out.push_str(rest);
        Ok(Some(out))
    }

    fn choose_type(&mut self, schema: &Schema) -> SchemaType {
        if schema.types.is_some() {
            let types = schema.non_null_types();
            return match self.rng.pick(&types) {
                Some(t) => *t,
                None => SchemaType::Null,
            };
        }
        if schema.pattern.is_some() || schema.format.is_some() || schema.min_length.is_some() || schema.max_length.is_some() {
            return SchemaType::String;
        }
        if schema.minimum.is_some()
            || schema.maximum.is_some()
            || schema.exclusive_minimum.is_some()
            || schema.exclusive_maximum.is_some()
            || schema.multiple_of.is_some()
        {
            return SchemaType::Number;
        }
        if schema.is_array_like() || schema.min_items.is_some() || schema.max_items.is_some() {
            return SchemaType::Array;
        }
        if schema.is_object_like() || !schema.required.is_empty() || schema.min_properties.is_some() {
            return SchemaType::Object;
        }
        let free: &[SchemaType] = if self.depth > MAX_FREE_CONTAINER_DEPTH {
            &[SchemaType::String, SchemaType::Number, SchemaType::Integer, SchemaType::Boolean]
        } else {
            &[
                SchemaType::String,
                SchemaType::Number,
                SchemaType::Integer,
                SchemaType::Boolean,
                SchemaType::Array,
                SchemaType::Object,
            ]
        };
        *self.rng.pick(free).unwrap_or(&SchemaType::String)
    }

    /// Value by type alone, retried until it validates.
    pub(crate) fn schema_only(&mut self, path: &[String], schema: &SchemaRef) -> Result<Value, GeneratorError> {
        let limit = self.config.attempt_limit;
        let mut cause = String::new();
        for _ in 0..limit {
            let t = self.choose_type(schema);
            let value = match t {
                SchemaType::Null => Value::Null,
                SchemaType::Boolean => Value::Bool(self.rng.chance(0.5)),
                SchemaType::Integer => number::integer(self, schema)?,
                SchemaType::Number => number::float(self, schema)?,
                SchemaType::String => string::generate(self, schema)?,
                SchemaType::Array => array::build(self, path, schema)?,
                SchemaType::Object => object::build(self, path, schema)?,
            };
            match validate(&value, schema, self.refs) {
                Ok(()) => return Ok(value),
                Err(e) => cause = e.to_string(),
            }
        }
        Err(GeneratorError::AttemptLimit { limit, cause })
    }

    fn base_without(&self, schema: &Schema, clear: fn(&mut Schema)) -> Schema {
        let mut base = schema.clone();
        clear(&mut base);
        base
    }

    fn all_of(&mut self, path: &[String], schema: &SchemaRef) -> Result<Value, GeneratorError> {
        let mut merged = self.base_without(schema, |s| s.all_of.clear());
        let mut members = Vec::with_capacity(schema.all_of.len());
        for member in &schema.all_of {
            let member = self.resolve(member)?;
            merged = merge::merge(&merged, &member)?;
            members.push(member);
        }
        let merged = Arc::new(merged);
        let limit = self.config.attempt_limit;
        let mut cause = String::new();
        for _ in 0..limit {
            let value = self.generate_resolved(path, &merged)?;
            match members.iter().try_for_each(|m| self.check(&value, m)) {
                Ok(()) => return Ok(value),
                Err(e) => cause = e.to_string(),
            }
        }
        Err(GeneratorError::AttemptLimit { limit, cause })
    }

    fn any_of(&mut self, path: &[String], schema: &SchemaRef) -> Result<Value, GeneratorError> {
        let base = self.base_without(schema, |s| s.any_of.clear());
        let mut order: Vec<usize> = (0..schema.any_of.len()).collect();
        self.rng.shuffle(&mut order);
        let mut cause = String::from("no branch of 'anyOf' produced a value");
        for i in order {
            let branch = self.resolve(&schema.any_of[i])?;
            let merged = match merge::merge(&base, &branch) {
                Ok(m) => Arc::new(m),
                Err(e) => {
                    cause = e.to_string();
                    continue;
                }
            };
            match self.generate_resolved(path, &merged) {
                Ok(value) => match self.check(&value, schema) {
                    Ok(()) => return Ok(value),
                    Err(e) => cause = e.to_string(),
                },
                Err(e) => cause = e.to_string(),
            }
        }
        Err(GeneratorError::Unsatisfiable(format!("anyOf: {}", cause)))
    }

    fn one_of(&mut self, path: &[String], schema: &SchemaRef) -> Result<Value, GeneratorError> {
        let base = self.base_without(schema, |s| s.one_of.clear());
        let branches = schema
            .one_of
            .iter()
            .map(|b| self.resolve(b))
            .collect::<Result<Vec<_>, _>>()?;
        let start = self.rng.index(branches.len());
        let mut cause = String::from("all branches overlap");
        for k in 0..branches.len() {
            let i = (start + k) % branches.len();
            let others: Vec<&SchemaRef> = branches
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, b)| b)
                .collect();
            let candidate = match one_of::subtract(&branches[i], &others) {
                Some(c) => c,
                None => continue,
            };
            let merged = match merge::merge(&base, &candidate) {
                Ok(m) => Arc::new(m),
                Err(e) => {
                    cause = e.to_string();
                    continue;
                }
            };
            for _ in 0..3 {
                match self.generate_resolved(path, &merged) {
                    Ok(value) => match self.check(&value, schema) {
                        Ok(()) => return Ok(value),
                        Err(e) => cause = e.to_string(),
                    },
                    Err(e) => {
                        cause = e.to_string();
                        break;
                    }
                }
            }
        }
        Err(GeneratorError::Unsatisfiable(format!("oneOf: {}", cause)))
    }
}

fn has_object_body(schema: &Schema) -> bool {
    schema.properties.is_some()
        || !schema.pattern_properties.is_empty()
        || schema.additional_properties.as_ref().and_then(|a| a.schema()).is_some()
}
