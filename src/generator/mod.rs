//! Schema- and name-driven synthetic data.
//!
//! A [`Generator`] owns the faker tree and a master random source. Each
//! call to [`Generator::generate`] runs one [`Session`](session::Session):
//! the request's schema is walked by the resolution pipeline, object and
//! array builders descend into children, and named fields are handed to the
//! faker tree, whose leaves produce domain values (names, addresses, dates,
//! ids, ...). Every produced value is checked against its schema; a faker
//! whose output does not validate falls back to schema-only generation.

mod array;
mod context;
pub mod fakers;
mod merge;
mod number;
mod object;
mod one_of;
mod pattern;
mod rng;
pub mod schema;
mod session;
mod string;
pub mod tree;

pub use context::{normalize, tokenize, Context};
pub use rng::Random;
pub use session::Session;
pub use tree::{FakeError, Node, NodeRef, ScriptNode};

use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;
use thiserror::Error;

use crate::config::GeneratorConfig;
use crate::event_loop::ScriptCallback;
use crate::runner::plugin::types::EvalContext;

use self::schema::{SchemaError, SchemaRef, SchemaSet, ValidationError};

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("invalid {field}: {message}")]
    InvalidRange { field: &'static str, message: String },

    #[error("allOf: no shared types")]
    NoSharedTypes,

    #[error("unsatisfiable schema: {0}")]
    Unsatisfiable(String),

    #[error("reached attempt limit ({limit}) caused by: {cause}")]
    AttemptLimit { limit: usize, cause: String },

    #[error("recursion in schema detected at '{0}'")]
    Recursion(String),

    #[error("cannot fill array with unique items")]
    UniqueItems,

    #[error("dependency cycle between fields: {0}")]
    DependencyCycle(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("script faker '{node}' failed: {message}")]
    Script { node: String, message: String },
}

/// One generation call: where the value lives and what it must satisfy.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub path: Vec<String>,
    pub schema: Option<Arc<SchemaSet>>,
    pub context: Context,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path<S: Into<String>>(mut self, path: impl IntoIterator<Item = S>) -> Self {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_schema(mut self, schema: SchemaSet) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    /// Request for a schema given as JSON.
    pub fn for_schema(schema: Value) -> Result<Self, SchemaError> {
        Ok(Self::new().with_schema(SchemaSet::from_value(schema)?))
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}

/// Calls script-defined faker functions during generation.
pub trait ScriptInvoker {
    fn call(&mut self, callback: &ScriptCallback, args: Vec<Value>) -> Result<Value, GeneratorError>;
}

/// Invoker for callers outside any VM: every call goes through the owning
/// loop.
pub struct Detached;

impl ScriptInvoker for Detached {
    fn call(&mut self, callback: &ScriptCallback, args: Vec<Value>) -> Result<Value, GeneratorError> {
        callback.call(args).map_err(|e| GeneratorError::Script {
            node: callback.name().to_string(),
            message: e.to_string(),
        })
    }
}

impl ScriptInvoker for EvalContext {
    fn call(&mut self, callback: &ScriptCallback, args: Vec<Value>) -> Result<Value, GeneratorError> {
        callback.call_in(self, args).map_err(|e| GeneratorError::Script {
            node: callback.name().to_string(),
            message: e.to_string(),
        })
    }
}

pub struct Generator {
    config: RwLock<GeneratorConfig>,
    rng: Mutex<Random>,
    tree: NodeRef,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => Random::seeded(seed),
            None => Random::from_entropy(),
        };
        Generator {
            config: RwLock::new(config),
            rng: Mutex::new(rng),
            tree: fakers::default_tree(),
        }
    }

    pub fn config(&self) -> GeneratorConfig {
        match self.config.read() {
            Ok(c) => c.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Restarts the random sequence; equal seeds give equal results for
    /// equal call sequences.
    pub fn set_seed(&self, seed: u64) {
        if let Ok(mut rng) = self.rng.lock() {
            *rng = Random::seeded(seed);
        }
        if let Ok(mut c) = self.config.write() {
            c.seed = Some(seed);
        }
    }

    pub fn set_optional_properties(&self, probability: f64) {
        if let Ok(mut c) = self.config.write() {
            *c = c.clone().with_optional_properties(probability);
        }
    }

    /// Root of the faker tree.
    pub fn tree(&self) -> NodeRef {
        self.tree.clone()
    }

    pub fn find_node(&self, name: &str) -> Option<NodeRef> {
        if self.tree.name().eq_ignore_ascii_case(name) {
            return Some(self.tree.clone());
        }
        self.tree.find_by_name(name)
    }

    pub fn generate(&self, request: Request) -> Result<Value, GeneratorError> {
        self.generate_with(request, &mut Detached)
    }

    pub fn generate_with(&self, request: Request, invoker: &mut dyn ScriptInvoker) -> Result<Value, GeneratorError> {
        let seed = match self.rng.lock() {
            Ok(mut rng) => rng.next_u64(),
            Err(poisoned) => poisoned.into_inner().next_u64(),
        };
        let config = self.config();
        let Request { path, schema, context } = request;
        let root: Option<SchemaRef> = schema.as_ref().map(|s| s.root().clone());
        let mut session = Session::new(
            Random::seeded(seed),
            context,
            &config,
            schema.as_deref(),
            self.tree.clone(),
            invoker,
        );
        let value = session.generate(&path, root.as_ref())?;
        log::debug!("generated value for path {:?}", path);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn generator(seed: u64) -> Generator {
        Generator::new(GeneratorConfig::default().with_seed(seed))
    }

    #[test]
    fn equal_seeds_equal_values() {
        let schema = json!({"type": "object", "properties": {"id": {"type": "integer"}, "tag": {"type": "string"}}});
        let a = generator(11).generate(Request::for_schema(schema.clone()).unwrap()).unwrap();
        let b = generator(11).generate(Request::for_schema(schema).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn const_and_enum_fast_paths() {
        let g = generator(11);
        assert_eq!(g.generate(Request::for_schema(json!({"const": "foo"})).unwrap()).unwrap(), json!("foo"));
        let v = g.generate(Request::for_schema(json!({"enum": [123, "foo"]})).unwrap()).unwrap();
        assert!(v == json!(123) || v == json!("foo"));
    }

    #[test]
    fn find_node_by_name() {
        let g = generator(1);
        assert!(g.find_node("firstname").is_some());
        assert!(g.find_node("no-such-node").is_none());
    }
}
