//! Script-visible objects backed by host data.
//!
//! The engine never reflects over host structures. A host type opts in by
//! implementing [`HostObject`]; property access on the script side is
//! dispatched through it. Methods are exposed by returning function values
//! (usually closures over shared host state) from [`HostObject::get`].

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    /// Arbitrary string keys.
    Map,
    /// A fixed set of named fields.
    Struct,
    /// Integer indexed with a `length`.
    Sequence,
}

pub trait HostObject {
    fn class_name(&self) -> &str;

    fn kind(&self) -> HostKind;

    fn get(&self, key: &str) -> Result<JsValue, JErrorType>;

    fn set(&mut self, key: &str, value: JsValue) -> Result<(), JErrorType> {
        let _ = value;
        Err(JErrorType::TypeError(format!(
            "Cannot assign to property '{}' of {}",
            key,
            self.class_name()
        )))
    }

    fn delete(&mut self, key: &str) -> Result<bool, JErrorType> {
        Err(JErrorType::TypeError(format!(
            "Cannot delete property '{}' of {}",
            key,
            self.class_name()
        )))
    }

    fn has(&self, key: &str) -> bool;

    /// Enumerable keys, or indices as strings for sequences.
    fn keys(&self) -> Vec<String>;

    /// Snapshot used for JSON serialization and copies leaving the VM.
    fn to_json(&self) -> serde_json::Value;

    fn length(&self) -> Option<usize> {
        None
    }
}
