//! Serves the objects of a [`BuiltInRegistry`] through the super-global scope.

use std::rc::Rc;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::resolver::PluginResolver;
use crate::runner::plugin::types::EvalContext;

/// Special values that live in the global scope but are not registry objects.
const GLOBAL_CONSTANTS: [&str; 3] = ["undefined", "NaN", "Infinity"];

pub struct CorePluginResolver {
    registry: Rc<BuiltInRegistry>,
}

impl CorePluginResolver {
    pub fn new(registry: Rc<BuiltInRegistry>) -> Self {
        CorePluginResolver { registry }
    }

    pub fn registry(&self) -> &BuiltInRegistry {
        &self.registry
    }
}

impl PluginResolver for CorePluginResolver {
    fn has_binding(&self, name: &str) -> bool {
        self.registry.has_name(name) || GLOBAL_CONSTANTS.contains(&name)
    }

    fn resolve(&self, name: &str, _ctx: &mut EvalContext) -> Result<JsValue, JErrorType> {
        match name {
            "undefined" => return Ok(JsValue::Undefined),
            "NaN" => return Ok(JsValue::from_f64(f64::NAN)),
            "Infinity" => return Ok(JsValue::from_f64(f64::INFINITY)),
            _ => {}
        }
        if let Some(obj) = self.registry.get_object(name) {
            return Ok(obj.materialize());
        }
        if let Some(f) = self.registry.get_function(name) {
            return Ok(f.to_function_value(name));
        }
        Err(JErrorType::ReferenceError(format!("{} is not defined", name)))
    }

    fn name(&self) -> &str {
        "core"
    }
}
