//! Registers the whole standard library with a [`BuiltInRegistry`].

use crate::runner::plugin::registry::BuiltInRegistry;

use super::{array, console, date, error, json, math, number, object, promise, regexp, string, timers};

/// Register all core built-in objects and global functions.
pub fn register_core_builtins(registry: &mut BuiltInRegistry) {
    object::register(registry);
    array::register(registry);
    string::register(registry);
    number::register(registry);
    math::register(registry);
    json::register(registry);
    error::register(registry);
    console::register(registry);
    promise::register(registry);
    regexp::register(registry);
    date::register(registry);
    timers::register(registry);

    registry.register_function("parseInt", number::parse_int);
    registry.register_function("parseFloat", number::parse_float);
    registry.register_function("isNaN", number::global_is_nan);
    registry.register_function("isFinite", number::global_is_finite);
}
