//! Plugin resolver trait for lazy resolution of super-global names.
//!
//! Resolvers provide objects (like `Math`, `console`, `mokapi`) that are
//! available in every scope without being declared. Objects are resolved
//! lazily, only when script code actually references them.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::EvalContext;

/// A provider of named super-global values.
///
/// Resolvers are queried in registration order when a name lookup reaches the
/// super-global scope. The first resolver that claims a name wins.
pub trait PluginResolver {
    /// Does this resolver provide a binding with the given name?
    ///
    /// This must be cheap and must not materialize the value.
    fn has_binding(&self, name: &str) -> bool;

    /// Materialize the value for the given name.
    ///
    /// Called only after `has_binding` returns `true`. The result is cached
    /// by the super-global environment, so this runs at most once per name
    /// per context.
    fn resolve(&self, name: &str, ctx: &mut EvalContext) -> Result<JsValue, JErrorType>;

    /// Human-readable name for this resolver (for logging).
    fn name(&self) -> &str;
}
