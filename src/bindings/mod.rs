//! Script-visible API: native modules and host globals.
//!
//! [`install`] wires a VM to its [`Host`]: the `mokapi*` native modules are
//! registered with the VM's module registry and `require`, `fetch` and
//! `open` become globals. Option objects are checked field by field; a
//! mismatch raises `unexpected type for '<field>': got <Kind>, expected
//! <Expected>`.

mod date;
mod encoding;
mod faker;
mod globals;
mod http;
mod kafka;
mod ldap;
mod marshal;
mod mokapi;
mod open;
mod patch;
mod shared;
mod smtp;

pub use self::date::format_go_layout;
pub use self::marshal::{marshal, MarshalError};
pub use self::open::resolve_refs;

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;

use crate::generator::schema::ValueKind;
use crate::host::{Host, HostError};
use crate::modules::ModuleRegistry;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::json::js_to_json;
use crate::runner::ds::object::{object_value, ObjectType};
use crate::runner::ds::object_property::PropertyMap;
use crate::runner::ds::value::{JsNumberType, JsValue};
use crate::runner::eval::function::closure_value;
use crate::runner::eval::property::get_property;
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::error::create_error;

/// Native module names and the factories behind them.
const NATIVE_MODULES: &[(&str, fn(&mut EvalContext) -> ValueResult)] = &[
    ("mokapi", mokapi::exports),
    ("mokapi/faker", faker::exports),
    ("mokapi/http", http::exports),
    ("mokapi/kafka", kafka::exports),
    ("mokapi/ldap", ldap::exports),
    ("mokapi/smtp", smtp::exports),
    ("mokapi/encoding", encoding::exports),
    ("faker", faker::exports),
    ("http", http::exports),
    ("kafka", kafka::exports),
    ("ldap", ldap::exports),
    ("smtp", smtp::exports),
];

/// Per-VM state the bindings read through [`EvalContext::extension`].
pub struct HostBinding {
    pub host: Arc<dyn Host>,
    /// Directory `open` and the global `require` resolve against.
    pub base_dir: PathBuf,
}

/// Attaches `host` to `ctx` and registers the native modules with
/// `registry`.
pub fn install(ctx: &mut EvalContext, host: Arc<dyn Host>, registry: &ModuleRegistry, base_dir: PathBuf) {
    for (name, factory) in NATIVE_MODULES {
        registry.register_native(name, *factory);
    }
    let warn_host = host.clone();
    ctx.set_warn_handler(Rc::new(move |message: &str| warn_host.warn(message)));
    ctx.add_resolver(Box::new(globals::GlobalsResolver::new(base_dir.clone())));
    ctx.set_extension(Rc::new(HostBinding { host, base_dir }));
}

pub(crate) fn binding(ctx: &EvalContext) -> Result<Rc<HostBinding>, JErrorType> {
    ctx.extension::<HostBinding>()
        .ok_or_else(|| JErrorType::ReferenceError("no host attached to this runtime".to_string()))
}

pub(crate) fn host(ctx: &EvalContext) -> Result<Arc<dyn Host>, JErrorType> {
    Ok(binding(ctx)?.host.clone())
}

/// Kind name of a script value as used in type-mismatch errors.
pub fn value_kind(value: &JsValue) -> ValueKind {
    match value {
        JsValue::Number(JsNumberType::Integer(_)) => ValueKind::Integer,
        JsValue::Number(n) => {
            let f = n.as_f64();
            if f.is_finite() && f.fract() == 0.0 {
                ValueKind::Integer
            } else {
                ValueKind::Number
            }
        }
        JsValue::String(_) => ValueKind::String,
        JsValue::Boolean(_) => ValueKind::Boolean,
        JsValue::Object(o) => {
            if o.borrow().is_array() {
                ValueKind::Array
            } else {
                ValueKind::Object
            }
        }
        JsValue::Undefined | JsValue::Null => ValueKind::Unknown,
    }
}

pub(crate) fn type_error(field: &str, got: &JsValue, expected: &str) -> JErrorType {
    JErrorType::TypeError(format!(
        "unexpected type for '{}': got {}, expected {}",
        field,
        value_kind(got),
        expected
    ))
}

pub(crate) fn host_error(e: HostError) -> JErrorType {
    JErrorType::Thrown(create_error("Error", &e.to_string()))
}

pub(crate) fn script_error(message: impl AsRef<str>) -> JErrorType {
    JErrorType::Thrown(create_error("Error", message.as_ref()))
}

/// True for ordinary objects, false for arrays, functions and host objects.
pub(crate) fn is_plain_object(value: &JsValue) -> bool {
    match value {
        JsValue::Object(o) => matches!(&*o.borrow(), ObjectType::Ordinary(_)),
        _ => false,
    }
}

/// `options[key]`, or undefined when `options` is nullish.
pub(crate) fn option(ctx: &mut EvalContext, options: &JsValue, key: &str) -> ValueResult {
    if options.is_nullish() {
        return Ok(JsValue::Undefined);
    }
    get_property(ctx, options, key)
}

/// Checks that an options argument is an object or absent.
pub(crate) fn expect_options(field: &str, options: &JsValue) -> Result<(), JErrorType> {
    match options {
        JsValue::Undefined | JsValue::Null => Ok(()),
        JsValue::Object(o) if !o.borrow().is_array() && !o.borrow().is_callable() => Ok(()),
        other => Err(type_error(field, other, "Object")),
    }
}

pub(crate) fn string_option(
    ctx: &mut EvalContext,
    options: &JsValue,
    key: &str,
) -> Result<Option<String>, JErrorType> {
    match option(ctx, options, key)? {
        JsValue::Undefined | JsValue::Null => Ok(None),
        JsValue::String(s) => Ok(Some(s)),
        other => Err(type_error(key, &other, "String")),
    }
}

pub(crate) fn to_json(value: &JsValue) -> Result<Value, JErrorType> {
    js_to_json(value)
}

/// Builds an object from name/value pairs.
pub(crate) fn object(entries: Vec<(&str, JsValue)>) -> JsValue {
    let mut properties = PropertyMap::new();
    for (name, value) in entries {
        properties.insert(name, value);
    }
    object_value(properties)
}

pub(crate) fn function<F>(name: &str, f: F) -> JsValue
where
    F: Fn(&mut EvalContext, JsValue, Vec<JsValue>) -> ValueResult + 'static,
{
    closure_value(name, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::object::array_value;

    #[test]
    fn kinds_of_values() {
        assert_eq!(value_kind(&JsValue::from_i64(3)), ValueKind::Integer);
        assert_eq!(value_kind(&JsValue::from_f64(1.5)), ValueKind::Number);
        assert_eq!(value_kind(&JsValue::str("x")), ValueKind::String);
        assert_eq!(value_kind(&array_value(vec![])), ValueKind::Array);
        assert_eq!(value_kind(&object(vec![])), ValueKind::Object);
        assert_eq!(value_kind(&JsValue::Null), ValueKind::Unknown);
    }

    #[test]
    fn type_error_format() {
        let e = type_error("times", &JsValue::str("3"), "Integer");
        assert_eq!(e.get_message(), "unexpected type for 'times': got String, expected Integer");
    }
}
