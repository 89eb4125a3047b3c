//! Standard library built-in objects.
//!
//! Each submodule registers one family of built-ins with the
//! [`BuiltInRegistry`](crate::runner::plugin::registry::BuiltInRegistry):
//! constructors and static members as objects, instance methods as
//! prototype methods keyed by the object tag of their receiver.

pub mod array;
pub mod console;
pub mod core;
pub mod date;
pub mod error;
pub mod json;
pub mod math;
pub mod number;
pub mod object;
pub mod promise;
pub mod regexp;
pub mod string;
pub mod timers;

pub use self::core::register_core_builtins;

use crate::runner::ds::value::JsValue;

/// Argument at `index`, `undefined` when missing.
pub(crate) fn arg(args: &[JsValue], index: usize) -> JsValue {
    args.get(index).cloned().unwrap_or(JsValue::Undefined)
}
