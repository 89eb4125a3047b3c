//! Built-in registry: the standard library objects, their prototype
//! methods and the global functions.

use std::collections::HashMap;

use super::types::{BuiltInFn, BuiltInObject, NativeFn};
use crate::runner::std_lib::register_core_builtins;

/// Tag whose prototype methods every object inherits.
const ROOT_PROTOTYPE: &str = "Object";

/// Registry for built-in objects.
pub struct BuiltInRegistry {
    objects: HashMap<String, BuiltInObject>,
    /// Free functions such as `parseInt`.
    functions: HashMap<String, BuiltInFn>,
}

impl BuiltInRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        BuiltInRegistry {
            objects: HashMap::new(),
            functions: HashMap::new(),
        }
    }

    /// Create a registry with the core standard library.
    pub fn with_core() -> Self {
        let mut registry = Self::new();
        register_core_builtins(&mut registry);
        log::trace!(
            "core registry ready with {} objects and {} functions",
            registry.objects.len(),
            registry.functions.len()
        );
        registry
    }

    pub fn register_object(&mut self, obj: BuiltInObject) {
        self.objects.insert(obj.name.clone(), obj);
    }

    pub fn register_function(&mut self, name: &str, func: NativeFn) {
        self.functions.insert(name.to_string(), BuiltInFn::Native(func));
    }

    pub fn get_object(&self, name: &str) -> Option<&BuiltInObject> {
        self.objects.get(name)
    }

    /// Prototype method for an object tag, falling back to `Object.prototype`.
    pub fn get_prototype_method(&self, tag: &str, method: &str) -> Option<BuiltInFn> {
        self.objects
            .get(tag)
            .and_then(|obj| obj.prototype_methods.get(method))
            .or_else(|| {
                self.objects
                    .get(ROOT_PROTOTYPE)
                    .and_then(|obj| obj.prototype_methods.get(method))
            })
            .cloned()
    }

    pub fn get_function(&self, name: &str) -> Option<&BuiltInFn> {
        self.functions.get(name)
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.objects.contains_key(name) || self.functions.contains_key(name)
    }
}

impl Default for BuiltInRegistry {
    fn default() -> Self {
        Self::with_core()
    }
}
