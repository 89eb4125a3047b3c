//! Function objects: creation, calls and construction.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::parser::ast::{FunctionBody, FunctionData};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function_object::{ClosureFn, FunctionKind, FunctionObject, ScriptFunction};
use crate::runner::ds::lex_env::Environment;
use crate::runner::ds::object::{array_value, JsObjectType, ObjectType};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::{EvalContext, NativeFn};
use crate::runner::std_lib::error::error_to_value;
use crate::runner::std_lib::promise::{new_promise, reject_promise, resolve_promise};

use super::expression::evaluate_expression;
use super::pattern::{bind_pattern, BindingMode};
use super::property::{function_prototype, object_with_proto};
use super::statement::{execute_statements, hoist_declarations};
use super::types::{CompletionType, ValueResult};

/// Creates a closure over the current lexical environment.
pub fn create_function(ctx: &EvalContext, data: &Arc<FunctionData>, name_hint: Option<&str>) -> JsValue {
    let name = data
        .name
        .clone()
        .or_else(|| name_hint.map(|s| s.to_string()))
        .unwrap_or_default();
    let this_value = if data.is_arrow {
        Some(ctx.this_value.clone())
    } else {
        None
    };
    let kind = FunctionKind::Script(ScriptFunction {
        data: data.clone(),
        scope: ctx.lex_env.clone(),
        this_value,
    });
    JsValue::Object(Rc::new(RefCell::new(ObjectType::Function(FunctionObject::new(name, kind)))))
}

/// Wraps a Rust closure as a script function.
pub fn closure_value<F>(name: &str, f: F) -> JsValue
where
    F: Fn(&mut EvalContext, JsValue, Vec<JsValue>) -> ValueResult + 'static,
{
    let f: ClosureFn = Rc::new(f);
    JsValue::Object(Rc::new(RefCell::new(ObjectType::Function(FunctionObject::new(
        name,
        FunctionKind::Closure(f),
    )))))
}

enum CallTarget {
    Script(Arc<FunctionData>, Rc<Environment>, Option<JsValue>),
    Native(NativeFn),
    Closure(ClosureFn),
    Bound(JsValue, JsValue, Vec<JsValue>),
}

fn call_target(obj: &JsObjectType) -> Option<(CallTarget, String)> {
    match &*obj.borrow() {
        ObjectType::Function(f) => {
            let target = match &f.kind {
                FunctionKind::Script(s) => {
                    CallTarget::Script(s.data.clone(), s.scope.clone(), s.this_value.clone())
                }
                FunctionKind::Native(n) => CallTarget::Native(*n),
                FunctionKind::Closure(c) => CallTarget::Closure(c.clone()),
                FunctionKind::Bound { target, this, args } => {
                    CallTarget::Bound(target.clone(), this.clone(), args.clone())
                }
            };
            Some((target, f.name.clone()))
        }
        _ => None,
    }
}

/// Calls any callable value.
pub fn call_value(ctx: &mut EvalContext, f: &JsValue, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    match f {
        JsValue::Object(o) => call_object(ctx, o, this, args),
        other => Err(JErrorType::TypeError(format!("{} is not a function", other))),
    }
}

pub fn call_object(ctx: &mut EvalContext, obj: &JsObjectType, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let (target, name) = call_target(obj)
        .ok_or_else(|| JErrorType::TypeError(format!("{} is not a function", obj.borrow().describe())))?;
    if ctx.call_depth >= ctx.max_call_depth {
        return Err(JErrorType::RangeError("Maximum call stack size exceeded".to_string()));
    }
    ctx.call_depth += 1;
    let construct = std::mem::replace(&mut ctx.is_construct_call, false);
    let result = match target {
        CallTarget::Script(data, scope, lexical_this) => {
            call_script_function(ctx, &data, &name, scope, lexical_this.unwrap_or(this), args)
        }
        CallTarget::Native(f) => f(ctx, this, args),
        CallTarget::Closure(f) => f(ctx, this, args),
        CallTarget::Bound(target, bound_this, mut bound_args) => {
            bound_args.extend(args);
            call_value(ctx, &target, bound_this, bound_args)
        }
    };
    ctx.is_construct_call = construct;
    ctx.call_depth -= 1;
    result
}

fn call_script_function(
    ctx: &mut EvalContext,
    data: &Arc<FunctionData>,
    name: &str,
    scope: Rc<Environment>,
    this: JsValue,
    args: Vec<JsValue>,
) -> ValueResult {
    let env = Environment::new_child(&scope, true);
    let saved_lex = std::mem::replace(&mut ctx.lex_env, env.clone());
    let saved_var = std::mem::replace(&mut ctx.var_env, env.clone());
    let saved_this = std::mem::replace(&mut ctx.this_value, this);
    if !data.is_arrow {
        env.declare("arguments", array_value(args.clone()), true);
    }
    log::trace!("calling {}", if name.is_empty() { "<anonymous>" } else { name });
    let result = run_function_body(ctx, data, args);
    ctx.lex_env = saved_lex;
    ctx.var_env = saved_var;
    ctx.this_value = saved_this;
    if data.is_async {
        let promise = new_promise();
        match result {
            Ok(v) => resolve_promise(ctx, &promise, v),
            Err(e) => {
                let reason = error_to_value(e);
                reject_promise(ctx, &promise, reason)
            }
        }
        return Ok(JsValue::Object(promise));
    }
    result
}

fn run_function_body(ctx: &mut EvalContext, data: &FunctionData, mut args: Vec<JsValue>) -> ValueResult {
    let param_count = data.params.len();
    let rest = if args.len() > param_count {
        args.split_off(param_count)
    } else {
        vec![]
    };
    let mut args = args.into_iter();
    for param in &data.params {
        let value = args.next().unwrap_or(JsValue::Undefined);
        bind_pattern(ctx, param, value, BindingMode::Let)?;
    }
    if let Some(rest_pattern) = &data.rest {
        bind_pattern(ctx, rest_pattern, array_value(rest), BindingMode::Let)?;
    }
    match &data.body {
        FunctionBody::Expression(expr) => evaluate_expression(expr, ctx),
        FunctionBody::Block(statements) => {
            hoist_declarations(statements, ctx)?;
            let completion = execute_statements(statements, ctx)?;
            Ok(match completion.completion_type {
                CompletionType::Return => completion.get_value(),
                _ => JsValue::Undefined,
            })
        }
    }
}

/// The `new` operator.
pub fn construct(ctx: &mut EvalContext, f: &JsValue, args: Vec<JsValue>) -> ValueResult {
    let obj = match f {
        JsValue::Object(o) => o.clone(),
        other => return Err(JErrorType::TypeError(format!("{} is not a constructor", other))),
    };
    let (is_constructor, bound, is_script) = match &*obj.borrow() {
        ObjectType::Function(func) => (
            func.is_constructor(),
            match &func.kind {
                FunctionKind::Bound { target, args, .. } => Some((target.clone(), args.clone())),
                _ => None,
            },
            matches!(func.kind, FunctionKind::Script(_)),
        ),
        _ => (false, None, false),
    };
    if !is_constructor {
        return Err(JErrorType::TypeError(format!(
            "{} is not a constructor",
            obj.borrow().describe()
        )));
    }
    if let Some((target, mut bound_args)) = bound {
        bound_args.extend(args);
        return construct(ctx, &target, bound_args);
    }
    if is_script {
        let proto = function_prototype(&obj);
        let instance = JsValue::Object(object_with_proto(Some(proto)));
        let result = call_object(ctx, &obj, instance.clone(), args)?;
        return Ok(match result {
            JsValue::Object(_) => result,
            _ => instance,
        });
    }
    let (target, _) = call_target(&obj)
        .ok_or_else(|| JErrorType::TypeError("value is not a constructor".to_string()))?;
    ctx.call_depth += 1;
    let saved = std::mem::replace(&mut ctx.is_construct_call, true);
    let result = match target {
        CallTarget::Native(f) => f(ctx, JsValue::Undefined, args),
        CallTarget::Closure(f) => f(ctx, JsValue::Undefined, args),
        _ => Err(JErrorType::TypeError("value is not a constructor".to_string())),
    };
    ctx.is_construct_call = saved;
    ctx.call_depth -= 1;
    result
}

/// Whether the running native function was invoked through `new`.
pub fn is_construct_call(ctx: &EvalContext) -> bool {
    ctx.is_construct_call
}
