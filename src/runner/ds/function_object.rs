use std::rc::Rc;
use std::sync::Arc;

use crate::parser::ast::FunctionData;
use crate::runner::ds::lex_env::Environment;
use crate::runner::ds::object_property::PropertyMap;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::{EvalContext, NativeFn};
use crate::runner::eval::types::ValueResult;

pub type ClosureFn = Rc<dyn Fn(&mut EvalContext, JsValue, Vec<JsValue>) -> ValueResult>;

pub struct ScriptFunction {
    pub data: Arc<FunctionData>,
    pub scope: Rc<Environment>,
    /// Lexical `this` captured by arrow functions.
    pub this_value: Option<JsValue>,
}

pub enum FunctionKind {
    Script(ScriptFunction),
    Native(NativeFn),
    Closure(ClosureFn),
    Bound {
        target: JsValue,
        this: JsValue,
        args: Vec<JsValue>,
    },
}

pub struct FunctionObject {
    pub name: String,
    pub kind: FunctionKind,
    pub properties: PropertyMap,
}

impl FunctionObject {
    pub fn new(name: impl Into<String>, kind: FunctionKind) -> Self {
        FunctionObject {
            name: name.into(),
            kind,
            properties: PropertyMap::new(),
        }
    }

    pub fn is_constructor(&self) -> bool {
        match &self.kind {
            FunctionKind::Script(s) => !s.data.is_arrow && !s.data.is_async,
            FunctionKind::Native(_) | FunctionKind::Closure(_) => true,
            FunctionKind::Bound { .. } => true,
        }
    }
}
