use serde_json::{Map, Value};

use super::context::{normalize, Context};
use super::fakers::data::NOUNS;
use super::pattern::PatternSampler;
use super::schema::{BoolOrSchema, Schema, SchemaRef};
use super::session::Session;
use super::GeneratorError;

/// Keys tried before giving up on finding an unused extra property name.
const KEY_RETRIES: usize = 10;

pub fn build(session: &mut Session<'_>, path: &[String], schema: &Schema) -> Result<Value, GeneratorError> {
    if let (Some(a), Some(b)) = (schema.min_properties, schema.max_properties) {
        if a > b {
            return Err(GeneratorError::InvalidRange {
                field: "minProperties",
                message: format!("minProperties ({}) must not exceed maxProperties ({})", a, b),
            });
        }
    }
    let limit = session.config.attempt_limit;
    let mut cause = String::new();
    for _ in 0..limit {
        let snapshot = session.context.snapshot();
        // nested objects start a fresh sibling scope
        if !path.is_empty() {
            session.context = Context::new();
        }
        let result = build_once(session, path, schema);
        session.context.restore(snapshot);
        match result {
            Ok(map) => {
                let value = Value::Object(map);
                match session.check(&value, schema) {
                    Ok(()) => return Ok(value),
                    Err(e) => cause = e.to_string(),
                }
            }
            Err(e @ GeneratorError::InvalidRange { .. })
            | Err(e @ GeneratorError::Schema(_))
            | Err(e @ GeneratorError::Recursion(_))
            | Err(e @ GeneratorError::DependencyCycle(_))
            | Err(e @ GeneratorError::Script { .. }) => return Err(e),
            Err(e) => cause = e.to_string(),
        }
    }
    Err(GeneratorError::AttemptLimit { limit, cause })
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    Pending,
    Active,
    Done,
}

struct Builder<'a, 's, 'g> {
    session: &'s mut Session<'g>,
    path: &'a [String],
    schema: &'a Schema,
    props: Vec<(String, SchemaRef)>,
    out: Map<String, Value>,
}

fn child_path(path: &[String], name: &str) -> Vec<String> {
    let mut p = path.to_vec();
    p.push(name.to_string());
    p
}

impl<'a, 's, 'g> Builder<'a, 's, 'g> {
    fn property_schema(&self, name: &str) -> Option<SchemaRef> {
        if let Some(s) = self.schema.property(name) {
            return Some(s.clone());
        }
        for (pattern, s) in &self.schema.pattern_properties {
            if regex::Regex::new(pattern).map(|re| re.is_match(name)).unwrap_or(false) {
                return Some(s.clone());
            }
        }
        self.schema.additional_properties.as_ref().and_then(|a| a.schema()).cloned()
    }

    fn put(&mut self, name: &str, schema: Option<&SchemaRef>, required: bool) -> Result<(), GeneratorError> {
        let path = child_path(self.path, name);
        match self.session.generate(&path, schema) {
            Ok(v) => {
                self.session.context.set(name, v.clone());
                self.out.insert(name.to_string(), v);
                Ok(())
            }
            Err(GeneratorError::Recursion(_)) if !required => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Generates declared property `i` after the earlier-declared or
    /// later-declared siblings its faker depends on.
    fn visit(&mut self, i: usize, included: &[bool], state: &mut [Visit]) -> Result<(), GeneratorError> {
        match state[i] {
            Visit::Done => return Ok(()),
            Visit::Active => return Err(GeneratorError::DependencyCycle(self.props[i].0.clone())),
            Visit::Pending => {}
        }
        state[i] = Visit::Active;
        let (name, schema) = self.props[i].clone();
        let resolved = self.session.resolve(&schema)?;
        let path = child_path(self.path, &name);
        if let Some(node) = self.session.lookup(&path, Some(&resolved))? {
            for dep in node.depends_on() {
                let dep = normalize(dep);
                let j = self.props.iter().position(|(n, _)| normalize(n) == dep);
                if let Some(j) = j {
                    if j != i && included[j] {
                        self.visit(j, included, state)?;
                    }
                }
            }
        }
        let required = self.schema.is_required(&name);
        self.put(&name, Some(&schema), required)?;
        state[i] = Visit::Done;
        Ok(())
    }

    fn declared(&mut self) -> Result<(), GeneratorError> {
        let p = self.session.config.optional_properties;
        let mut included: Vec<bool> = self
            .props
            .iter()
            .map(|(name, _)| self.schema.is_required(name))
            .collect();
        for flag in included.iter_mut() {
            if !*flag {
                *flag = self.session.rng.chance(p);
            }
        }
        for (trigger, deps) in &self.schema.dependent_required {
            let triggered = self.props.iter().position(|(n, _)| n == trigger).map(|i| included[i]).unwrap_or(false);
            if triggered {
                for dep in deps {
                    if let Some(j) = self.props.iter().position(|(n, _)| n == dep) {
                        included[j] = true;
                    }
                }
            }
        }
        let mut state = vec![Visit::Pending; self.props.len()];
        for i in 0..self.props.len() {
            if included[i] {
                self.visit(i, &included, &mut state)?;
            }
        }
        Ok(())
    }

    fn room(&self) -> usize {
        self.schema
            .max_properties
            .map(|m| m.saturating_sub(self.out.len()))
            .unwrap_or(usize::MAX)
    }

    fn pattern_properties(&mut self) -> Result<(), GeneratorError> {
        for (pattern, schema) in self.schema.pattern_properties.clone() {
            let sampler = PatternSampler::new(&pattern)?;
            let count = self.session.rng.usize_range(1, 2).min(self.room());
            for _ in 0..count {
                for _ in 0..KEY_RETRIES {
                    let key = sampler.sample(&mut self.session.rng);
                    if !self.out.contains_key(&key) && self.schema.property(&key).is_none() {
                        self.put(&key, Some(&schema), false)?;
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn extra_key(&mut self) -> Result<Option<String>, GeneratorError> {
        let sampler = match self.schema.property_names.as_ref().and_then(|n| n.pattern.clone()) {
            Some(p) => Some(PatternSampler::new(&p)?),
            None => None,
        };
        for attempt in 0..KEY_RETRIES {
            let key = match &sampler {
                Some(s) => s.sample(&mut self.session.rng),
                None => {
                    let noun = self.session.rng.pick(NOUNS).copied().unwrap_or("field");
                    if attempt < KEY_RETRIES / 2 {
                        noun.to_string()
                    } else {
                        format!("{}{}", noun, self.session.rng.int_range(1, 99))
                    }
                }
            };
            let taken = self.out.contains_key(&key) || self.schema.property(&key).is_some();
            let allowed = match &self.schema.property_names {
                Some(names) => self.session.validates(&Value::String(key.clone()), names),
                None => true,
            };
            if !taken && allowed {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    fn fill_minimum(&mut self) -> Result<(), GeneratorError> {
        let min = self.schema.min_properties.unwrap_or(0);
        let missing: Vec<(String, SchemaRef)> = self
            .props
            .iter()
            .filter(|(n, _)| !self.out.contains_key(n))
            .cloned()
            .collect();
        for (name, schema) in missing {
            if self.out.len() >= min {
                break;
            }
            self.put(&name, Some(&schema), false)?;
        }

        let additional = self.schema.additional_properties.clone();
        if matches!(additional, Some(BoolOrSchema::Bool(false))) {
            return Ok(());
        }
        let free_form = self.props.is_empty() && self.schema.pattern_properties.is_empty();
        let target = if free_form {
            let extra = self.session.rng.usize_range(1, 3);
            min.max(extra)
        } else {
            min
        };
        let target = target.min(self.schema.max_properties.unwrap_or(usize::MAX));
        let value_schema = additional.as_ref().and_then(|a| a.schema()).cloned();
        while self.out.len() < target {
            match self.extra_key()? {
                Some(key) => self.put(&key, value_schema.as_ref(), false)?,
                None => break,
            }
        }
        Ok(())
    }

    fn required_rest(&mut self) -> Result<(), GeneratorError> {
        for name in self.schema.required.clone() {
            if !self.out.contains_key(&name) {
                let schema = self.property_schema(&name);
                self.put(&name, schema.as_ref(), true)?;
            }
        }
        Ok(())
    }

    /// Merges the output of a sub-schema into the object; `overwrite`
    /// decides who wins on shared keys.
    fn apply(&mut self, schema: &SchemaRef, overwrite: bool) -> Result<(), GeneratorError> {
        let resolved = self.session.resolve(schema)?;
        let sub = build_once(self.session, self.path, &resolved)?;
        for (k, v) in sub {
            if overwrite || !self.out.contains_key(&k) {
                self.out.insert(k, v);
            }
        }
        Ok(())
    }

    fn conditionals(&mut self) -> Result<(), GeneratorError> {
        if let Some(condition) = &self.schema.if_schema {
            let current = Value::Object(self.out.clone());
            let branch = if self.session.validates(&current, condition) {
                self.schema.then_schema.clone()
            } else {
                self.schema.else_schema.clone()
            };
            if let Some(branch) = branch {
                self.apply(&branch, true)?;
            }
        }
        for (trigger, deps) in self.schema.dependent_required.clone() {
            if self.out.contains_key(&trigger) {
                for dep in deps {
                    if !self.out.contains_key(&dep) {
                        let schema = self.property_schema(&dep);
                        self.put(&dep, schema.as_ref(), true)?;
                    }
                }
            }
        }
        for (trigger, schema) in self.schema.dependent_schemas.clone() {
            if self.out.contains_key(&trigger) {
                self.apply(&schema, false)?;
            }
        }
        Ok(())
    }

    fn trim(&mut self) {
        let max = match self.schema.max_properties {
            Some(m) => m,
            None => return,
        };
        while self.out.len() > max {
            let victim = self
                .out
                .keys()
                .rev()
                .find(|k| !self.schema.is_required(k))
                .cloned();
            match victim {
                Some(k) => {
                    self.out.shift_remove(&k);
                }
                None => break,
            }
        }
    }
}

fn build_once(session: &mut Session<'_>, path: &[String], schema: &Schema) -> Result<Map<String, Value>, GeneratorError> {
    let props = schema.properties.clone().unwrap_or_default();
    let mut b = Builder {
        session,
        path,
        schema,
        props,
        out: Map::new(),
    };
    b.declared()?;
    b.required_rest()?;
    b.pattern_properties()?;
    b.fill_minimum()?;
    b.conditionals()?;
    b.trim();
    Ok(b.out)
}
