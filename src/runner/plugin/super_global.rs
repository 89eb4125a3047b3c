//! Super-global environment, the bottom of the scope chain.
//!
//! When a name is not found in the lexical chain the evaluation context asks
//! this environment. It remembers values it already materialized and knows
//! which resolver owns which name:
//!
//! ```text
//! Math.abs(-5)
//!   1. local / outer / global scope -> not found
//!   2. super-global cache           -> miss
//!   3. resolvers in order           -> CorePluginResolver claims "Math"
//!   4. resolve + cache
//! ```
//!
//! Resolution itself is driven by [`EvalContext`](super::types::EvalContext)
//! because a resolver may need the context while this environment is borrowed.

use std::collections::HashMap;
use std::rc::Rc;

use crate::runner::ds::value::JsValue;
use crate::runner::plugin::resolver::PluginResolver;

pub struct SuperGlobalEnvironment {
    /// Registered plugin resolvers, queried in order.
    resolvers: Vec<Rc<dyn PluginResolver>>,
    /// Already-resolved bindings.
    cache: HashMap<String, JsValue>,
}

impl SuperGlobalEnvironment {
    pub fn new() -> Self {
        SuperGlobalEnvironment {
            resolvers: Vec::new(),
            cache: HashMap::new(),
        }
    }

    /// Register a resolver. Resolvers are queried in registration order.
    pub fn add_resolver(&mut self, resolver: Rc<dyn PluginResolver>) {
        log::trace!("registering super-global resolver '{}'", resolver.name());
        self.resolvers.push(resolver);
    }

    pub fn cached(&self, name: &str) -> Option<JsValue> {
        self.cache.get(name).cloned()
    }

    pub fn store(&mut self, name: &str, value: JsValue) {
        self.cache.insert(name.to_string(), value);
    }

    /// First resolver that claims `name`.
    pub fn find_resolver(&self, name: &str) -> Option<Rc<dyn PluginResolver>> {
        self.resolvers
            .iter()
            .find(|r| r.has_binding(name))
            .cloned()
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.cache.contains_key(name) || self.resolvers.iter().any(|r| r.has_binding(name))
    }
}

impl Default for SuperGlobalEnvironment {
    fn default() -> Self {
        Self::new()
    }
}
