use std::fmt;

use crate::runner::ds::object::ObjectType;
use crate::runner::ds::value::JsValue;

#[derive(Debug, Clone)]
pub enum JErrorType {
    ReferenceError(String),
    TypeError(String),
    SyntaxError(String),
    RangeError(String),
    /// Any value raised by a `throw` statement or a rejected await.
    Thrown(JsValue),
}

impl JErrorType {
    pub fn get_name(&self) -> &str {
        match self {
            JErrorType::ReferenceError(_) => "ReferenceError",
            JErrorType::TypeError(_) => "TypeError",
            JErrorType::SyntaxError(_) => "SyntaxError",
            JErrorType::RangeError(_) => "RangeError",
            JErrorType::Thrown(_) => "Error",
        }
    }

    /// Message without the error name prefix.
    pub fn get_message(&self) -> String {
        match self {
            JErrorType::ReferenceError(m)
            | JErrorType::TypeError(m)
            | JErrorType::SyntaxError(m)
            | JErrorType::RangeError(m) => m.clone(),
            JErrorType::Thrown(v) => thrown_message(v),
        }
    }
}

fn thrown_message(v: &JsValue) -> String {
    if let JsValue::Object(o) = v {
        if let Ok(obj) = o.try_borrow() {
            if let ObjectType::Ordinary(ord) = &*obj {
                if let Some(JsValue::String(m)) = ord.properties.get("message") {
                    let name = match ord.properties.get("name") {
                        Some(JsValue::String(n)) => n.clone(),
                        _ => ord.class_name.clone(),
                    };
                    return if m.is_empty() { name } else { format!("{}: {}", name, m) };
                }
            }
        }
    }
    v.to_string()
}

impl fmt::Display for JErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JErrorType::Thrown(v) => write!(f, "{}", thrown_message(v)),
            _ => write!(f, "{}: {}", self.get_name(), self.get_message()),
        }
    }
}
