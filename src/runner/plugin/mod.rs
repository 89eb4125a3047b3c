//! Plugin architecture and super-global scope.
//!
//! Built-ins are not preloaded into the global environment. Instead the
//! **super-global scope** sits below the global scope and resolves names on
//! first use:
//!
//! ```text
//! Variable lookup order:
//! 1. Local scope (function/block)
//! 2. Outer scopes (lexical chain)
//! 3. Global scope
//! 4. Super-global scope  <- standard library and host globals live here
//! ```
//!
//! - [`PluginResolver`]: provides named values lazily
//! - [`SuperGlobalEnvironment`]: holds resolvers and caches what they produced
//! - [`CorePluginResolver`]: serves the [`BuiltInRegistry`]
//!
//! Host capabilities (`mokapi`, `setTimeout`, `require`, `fetch`, ...) are a
//! second resolver installed by the runtime, so local variables can shadow
//! any of them.
//!
//! ## Example: custom resolver
//!
//! ```
//! use mokapi_engine::runner::plugin::resolver::PluginResolver;
//! use mokapi_engine::runner::plugin::types::EvalContext;
//! use mokapi_engine::runner::ds::value::JsValue;
//! use mokapi_engine::runner::ds::error::JErrorType;
//!
//! struct Answer;
//!
//! impl PluginResolver for Answer {
//!     fn has_binding(&self, name: &str) -> bool {
//!         name == "ANSWER"
//!     }
//!
//!     fn resolve(&self, _name: &str, _ctx: &mut EvalContext) -> Result<JsValue, JErrorType> {
//!         Ok(JsValue::from_i64(42))
//!     }
//!
//!     fn name(&self) -> &str { "answer" }
//! }
//!
//! let mut ctx = EvalContext::new();
//! ctx.add_resolver(Box::new(Answer));
//! assert_eq!(ctx.get_binding("ANSWER").unwrap(), JsValue::from_i64(42));
//! ```

pub mod core_resolver;
pub mod registry;
pub mod resolver;
pub mod super_global;
pub mod types;

pub use core_resolver::CorePluginResolver;
pub use registry::BuiltInRegistry;
pub use resolver::PluginResolver;
pub use super_global::SuperGlobalEnvironment;
pub use types::{BuiltInFn, BuiltInObject, EvalContext, NativeFn};
