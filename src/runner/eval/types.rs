//! Core types for the evaluation engine.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionType {
    Normal,
    Return,
    Break,
    Continue,
}

/// Completion record of a statement. Throws travel on the `Err` side of
/// [`EvalResult`] instead of being a completion type.
#[derive(Debug, Clone)]
pub struct Completion {
    pub completion_type: CompletionType,
    pub value: Option<JsValue>,
    /// Target label for break/continue.
    pub target: Option<String>,
}

impl Completion {
    pub fn normal() -> Self {
        Completion {
            completion_type: CompletionType::Normal,
            value: None,
            target: None,
        }
    }

    pub fn normal_with_value(value: JsValue) -> Self {
        Completion {
            completion_type: CompletionType::Normal,
            value: Some(value),
            target: None,
        }
    }

    pub fn return_value(value: JsValue) -> Self {
        Completion {
            completion_type: CompletionType::Return,
            value: Some(value),
            target: None,
        }
    }

    pub fn break_completion(target: Option<String>) -> Self {
        Completion {
            completion_type: CompletionType::Break,
            value: None,
            target,
        }
    }

    pub fn continue_completion(target: Option<String>) -> Self {
        Completion {
            completion_type: CompletionType::Continue,
            value: None,
            target,
        }
    }

    pub fn is_normal(&self) -> bool {
        self.completion_type == CompletionType::Normal
    }

    pub fn is_abrupt(&self) -> bool {
        !self.is_normal()
    }

    pub fn get_value(&self) -> JsValue {
        self.value.clone().unwrap_or(JsValue::Undefined)
    }

    /// Update the value of a normal completion.
    pub fn update_empty(self, value: JsValue) -> Self {
        if self.value.is_none() {
            Completion {
                value: Some(value),
                ..self
            }
        } else {
            self
        }
    }
}

/// Resolved target of an assignment, update or method call.
#[derive(Clone)]
pub enum Reference {
    Binding(String),
    Property { base: JsValue, key: String },
}

/// Result type for evaluation operations.
pub type EvalResult = Result<Completion, JErrorType>;

/// Result type for value-returning operations.
pub type ValueResult = Result<JsValue, JErrorType>;

/// Result type for reference-returning operations.
pub type ReferenceResult = Result<Reference, JErrorType>;
