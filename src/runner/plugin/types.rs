//! Core types for the plugin architecture and the evaluation context that
//! native functions receive.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function_object::{FunctionKind, FunctionObject};
use crate::runner::ds::lex_env::Environment;
use crate::runner::ds::object::{JsObjectType, ObjectType};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::jobs::JobQueue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::resolver::PluginResolver;
use crate::runner::plugin::super_global::SuperGlobalEnvironment;

/// Default limit for nested script calls before a `RangeError` is raised.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

pub type SharedSuperGlobal = Rc<RefCell<SuperGlobalEnvironment>>;

/// Execution context of one VM: scope chain, built-ins, job queues and
/// host-installed extensions. It lives on the thread that owns the VM.
pub struct EvalContext {
    pub global_env: Rc<Environment>,
    pub lex_env: Rc<Environment>,
    pub var_env: Rc<Environment>,
    pub this_value: JsValue,
    super_global: SharedSuperGlobal,
    registry: Rc<BuiltInRegistry>,
    pub(crate) call_depth: usize,
    pub max_call_depth: usize,
    /// Set while a native function runs as a constructor.
    pub(crate) is_construct_call: bool,
    pub(crate) jobs: JobQueue,
    method_cache: HashMap<(&'static str, String), JsValue>,
    extensions: HashMap<TypeId, Rc<dyn Any>>,
}

impl EvalContext {
    pub fn new() -> Self {
        let global_env = Environment::new_global();
        EvalContext {
            lex_env: global_env.clone(),
            var_env: global_env.clone(),
            global_env,
            this_value: JsValue::Undefined,
            super_global: Rc::new(RefCell::new(SuperGlobalEnvironment::new())),
            registry: Rc::new(BuiltInRegistry::new()),
            call_depth: 0,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            is_construct_call: false,
            jobs: JobQueue::new(),
            method_cache: HashMap::new(),
            extensions: HashMap::new(),
        }
    }

    /// Context with the core standard library resolvable.
    pub fn with_core_builtins() -> Self {
        let mut ctx = EvalContext::new();
        ctx.install_core_builtins(BuiltInRegistry::with_core());
        ctx
    }

    /// Installs a registry and the resolver that serves its objects.
    pub fn install_core_builtins(&mut self, registry: BuiltInRegistry) {
        let registry = Rc::new(registry);
        self.registry = registry.clone();
        self.method_cache.clear();
        self.add_resolver(Box::new(
            crate::runner::plugin::core_resolver::CorePluginResolver::new(registry),
        ));
    }

    pub fn add_resolver(&mut self, resolver: Box<dyn PluginResolver>) {
        self.super_global.borrow_mut().add_resolver(Rc::from(resolver));
    }

    pub fn registry(&self) -> &BuiltInRegistry {
        &self.registry
    }

    /// Looks a name up through the scope chain, then the super-global scope.
    pub fn get_binding(&mut self, name: &str) -> Result<JsValue, JErrorType> {
        if let Some(v) = self.lex_env.get_binding(name) {
            return Ok(v);
        }
        match self.resolve_super_global(name)? {
            Some(v) => Ok(v),
            None => Err(JErrorType::ReferenceError(format!("{} is not defined", name))),
        }
    }

    pub fn has_binding(&self, name: &str) -> bool {
        self.lex_env.has_binding(name) || self.super_global.borrow().has_name(name)
    }

    /// Assigns to an existing binding or creates a global one.
    pub fn set_binding(&mut self, name: &str, value: JsValue) -> Result<(), JErrorType> {
        if !self.lex_env.set_mutable_binding(name, value.clone())? {
            self.global_env.declare(name, value, true);
        }
        Ok(())
    }

    pub(crate) fn resolve_super_global(&mut self, name: &str) -> Result<Option<JsValue>, JErrorType> {
        let (cached, resolver) = {
            let sg = self.super_global.borrow();
            (sg.cached(name), sg.find_resolver(name))
        };
        if cached.is_some() {
            return Ok(cached);
        }
        match resolver {
            Some(resolver) => {
                let value = resolver.resolve(name, self)?;
                self.super_global.borrow_mut().store(name, value.clone());
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Method inherited from a built-in prototype, e.g. `Array.prototype.map`.
    pub fn prototype_method(&mut self, tag: &'static str, name: &str) -> Option<JsValue> {
        if let Some(v) = self.method_cache.get(&(tag, name.to_string())) {
            return Some(v.clone());
        }
        let f = self.registry.get_prototype_method(tag, name)?;
        let value = f.to_function_value(name);
        self.method_cache.insert((tag, name.to_string()), value.clone());
        Some(value)
    }

    /// Attaches a per-VM service (module registry, host handle, ...).
    pub fn set_extension<T: Any>(&mut self, value: Rc<T>) {
        self.extensions.insert(TypeId::of::<T>(), value);
    }

    pub fn extension<T: Any>(&self) -> Option<Rc<T>> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.clone().downcast::<T>().ok())
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Function signature for built-in methods.
/// Native functions receive the evaluation context, `this` value, and arguments.
pub type NativeFn =
    fn(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType>;

/// Built-in function - either compiled-in or plugin-provided.
#[derive(Clone)]
pub enum BuiltInFn {
    /// Direct function pointer - zero overhead for compiled-in functions.
    Native(NativeFn),

    /// Plugin-provided function - small vtable indirection cost.
    Plugin(Rc<dyn Fn(&mut EvalContext, JsValue, Vec<JsValue>) -> Result<JsValue, JErrorType>>),
}

impl BuiltInFn {
    pub fn call(
        &self,
        ctx: &mut EvalContext,
        this: JsValue,
        args: Vec<JsValue>,
    ) -> Result<JsValue, JErrorType> {
        match self {
            BuiltInFn::Native(f) => f(ctx, this, args),
            BuiltInFn::Plugin(f) => f(ctx, this, args),
        }
    }

    /// Wraps the function in a script-callable function object.
    pub fn to_function_value(&self, name: &str) -> JsValue {
        JsValue::Object(self.to_function_object(name))
    }

    pub fn to_function_object(&self, name: &str) -> JsObjectType {
        let kind = match self {
            BuiltInFn::Native(f) => FunctionKind::Native(*f),
            BuiltInFn::Plugin(f) => FunctionKind::Closure(f.clone()),
        };
        Rc::new(RefCell::new(ObjectType::Function(FunctionObject::new(name, kind))))
    }
}

/// Built-in object definition.
/// Represents a script built-in object like Array, Object, String, etc.
pub struct BuiltInObject {
    /// Name of the object (e.g., "Array", "Object", "Math").
    pub name: String,

    /// Static methods, e.g. `Object.keys`.
    pub methods: HashMap<String, BuiltInFn>,

    /// Methods inherited by instances, e.g. `Array.prototype.push`.
    pub prototype_methods: HashMap<String, BuiltInFn>,

    /// Static properties.
    pub properties: Vec<(String, JsValue)>,

    /// Constructor function, if this object is constructable.
    pub constructor: Option<BuiltInFn>,
}

impl BuiltInObject {
    pub fn new(name: impl Into<String>) -> Self {
        BuiltInObject {
            name: name.into(),
            methods: HashMap::new(),
            prototype_methods: HashMap::new(),
            properties: Vec::new(),
            constructor: None,
        }
    }

    pub fn add_method(mut self, name: impl Into<String>, func: NativeFn) -> Self {
        self.methods.insert(name.into(), BuiltInFn::Native(func));
        self
    }

    pub fn add_prototype_method(mut self, name: impl Into<String>, func: NativeFn) -> Self {
        self.prototype_methods.insert(name.into(), BuiltInFn::Native(func));
        self
    }

    pub fn add_property(mut self, name: impl Into<String>, value: JsValue) -> Self {
        self.properties.push((name.into(), value));
        self
    }

    pub fn with_constructor(mut self, constructor: NativeFn) -> Self {
        self.constructor = Some(BuiltInFn::Native(constructor));
        self
    }

    /// Builds the script-visible value: a function when constructable,
    /// a plain object otherwise. Static members become own properties.
    pub fn materialize(&self) -> JsValue {
        let obj = match &self.constructor {
            Some(c) => c.to_function_object(&self.name),
            None => crate::runner::ds::object::new_object_with_class(
                &self.name,
                Default::default(),
            ),
        };
        {
            let mut o = obj.borrow_mut();
            if let Some(props) = o.properties_mut() {
                let mut names: Vec<&String> = self.methods.keys().collect();
                names.sort();
                for name in names {
                    props.insert(name.clone(), self.methods[name].to_function_value(name));
                }
                for (k, v) in &self.properties {
                    props.insert(k.clone(), v.clone());
                }
            }
        }
        JsValue::Object(obj)
    }
}
