use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;

pub struct Binding {
    pub value: JsValue,
    pub mutable: bool,
}

/// A scope record. Function scopes hold `var` bindings, block scopes hold
/// `let`/`const`.
pub struct Environment {
    bindings: RefCell<HashMap<String, Binding>>,
    outer: Option<Rc<Environment>>,
    is_function_scope: bool,
}

impl Environment {
    pub fn new_global() -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            outer: None,
            is_function_scope: true,
        })
    }

    pub fn new_child(outer: &Rc<Environment>, is_function_scope: bool) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            outer: Some(outer.clone()),
            is_function_scope,
        })
    }

    pub fn is_function_scope(&self) -> bool {
        self.is_function_scope
    }

    pub fn outer(&self) -> Option<&Rc<Environment>> {
        self.outer.as_ref()
    }

    pub fn has_own_binding(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    /// Creates the binding, replacing any previous one in this scope.
    pub fn declare(&self, name: &str, value: JsValue, mutable: bool) {
        self.bindings
            .borrow_mut()
            .insert(name.to_string(), Binding { value, mutable });
    }

    /// `var` semantics: keep an existing value when no initializer runs.
    pub fn declare_var(&self, name: &str) {
        let mut b = self.bindings.borrow_mut();
        if !b.contains_key(name) {
            b.insert(
                name.to_string(),
                Binding {
                    value: JsValue::Undefined,
                    mutable: true,
                },
            );
        }
    }

    pub fn get_binding(&self, name: &str) -> Option<JsValue> {
        if let Some(b) = self.bindings.borrow().get(name) {
            return Some(b.value.clone());
        }
        match &self.outer {
            Some(o) => o.get_binding(name),
            None => None,
        }
    }

    pub fn has_binding(&self, name: &str) -> bool {
        self.has_own_binding(name) || self.outer.as_ref().map_or(false, |o| o.has_binding(name))
    }

    /// Returns `Ok(false)` when no scope in the chain declares `name`.
    pub fn set_mutable_binding(&self, name: &str, value: JsValue) -> Result<bool, JErrorType> {
        {
            let mut bindings = self.bindings.borrow_mut();
            if let Some(b) = bindings.get_mut(name) {
                if !b.mutable {
                    return Err(JErrorType::TypeError(
                        "Assignment to constant variable.".to_string(),
                    ));
                }
                b.value = value;
                return Ok(true);
            }
        }
        match &self.outer {
            Some(o) => o.set_mutable_binding(name, value),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_scope_shadows_and_assigns_through() {
        let global = Environment::new_global();
        global.declare("x", JsValue::from_i64(1), true);
        let child = Environment::new_child(&global, false);
        assert_eq!(child.get_binding("x"), Some(JsValue::from_i64(1)));
        assert!(child.set_mutable_binding("x", JsValue::from_i64(2)).unwrap());
        assert_eq!(global.get_binding("x"), Some(JsValue::from_i64(2)));
        child.declare("x", JsValue::from_i64(3), false);
        assert_eq!(child.get_binding("x"), Some(JsValue::from_i64(3)));
        assert!(child.set_mutable_binding("x", JsValue::Null).is_err());
        assert!(!child.set_mutable_binding("y", JsValue::Null).unwrap());
    }
}
