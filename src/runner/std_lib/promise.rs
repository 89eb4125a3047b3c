//! Promise built-in.
//!
//! Promises settle synchronously; their reactions always run as microtasks
//! on the VM that owns them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{array_value, object_value, JsObjectType, ObjectType};
use crate::runner::ds::object_property::PropertyMap;
use crate::runner::ds::promise::{PromiseObject, PromiseReaction, PromiseState};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{call_value, closure_value};
use crate::runner::eval::jobs::Microtask;
use crate::runner::eval::property::iterate_to_vec;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

use super::arg;
use super::error::error_to_value;

/// Register the Promise built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let promise = BuiltInObject::new("Promise")
        .with_constructor(promise_constructor)
        .add_method("resolve", promise_resolve_static)
        .add_method("reject", promise_reject_static)
        .add_method("all", promise_all)
        .add_method("allSettled", promise_all_settled)
        .add_method("race", promise_race)
        .add_prototype_method("then", promise_then)
        .add_prototype_method("catch", promise_catch)
        .add_prototype_method("finally", promise_finally);

    registry.register_object(promise);
}

pub fn new_promise() -> JsObjectType {
    Rc::new(RefCell::new(ObjectType::Promise(PromiseObject::new())))
}

fn as_promise(value: &JsValue) -> Option<JsObjectType> {
    match value {
        JsValue::Object(o) if matches!(&*o.borrow(), ObjectType::Promise(_)) => Some(o.clone()),
        _ => None,
    }
}

/// Resolves `promise` with `value`, adopting the state of `value` when it is
/// itself a promise.
pub fn resolve_promise(ctx: &mut EvalContext, promise: &JsObjectType, value: JsValue) {
    if let Some(inner) = as_promise(&value) {
        if Rc::ptr_eq(&inner, promise) {
            let reason = error_to_value(JErrorType::TypeError(
                "Chaining cycle detected for promise".to_string(),
            ));
            reject_promise(ctx, promise, reason);
            return;
        }
        add_reaction(ctx, &inner, None, None, Some(promise.clone()));
        return;
    }
    settle(ctx, promise, PromiseState::Fulfilled(value));
}

pub fn reject_promise(ctx: &mut EvalContext, promise: &JsObjectType, reason: JsValue) {
    settle(ctx, promise, PromiseState::Rejected(reason));
}

fn settle(ctx: &mut EvalContext, promise: &JsObjectType, state: PromiseState) {
    let reactions = {
        let mut obj = promise.borrow_mut();
        let p = match &mut *obj {
            ObjectType::Promise(p) if p.is_pending() => p,
            _ => return,
        };
        p.state = state;
        std::mem::take(&mut p.reactions)
    };
    for reaction in reactions {
        schedule_reaction(ctx, promise, reaction);
    }
}

fn schedule_reaction(ctx: &mut EvalContext, promise: &JsObjectType, reaction: PromiseReaction) {
    let (argument, rejected) = match &*promise.borrow() {
        ObjectType::Promise(p) => match &p.state {
            PromiseState::Fulfilled(v) => (v.clone(), false),
            PromiseState::Rejected(v) => (v.clone(), true),
            PromiseState::Pending => return,
        },
        _ => return,
    };
    let handler = if rejected {
        reaction.on_rejected
    } else {
        reaction.on_fulfilled
    };
    ctx.jobs.enqueue(Microtask::Reaction {
        handler,
        argument,
        derived: reaction.derived,
        rejected,
    });
}

/// Registers handlers; they run as microtasks once `promise` settles.
pub fn add_reaction(
    ctx: &mut EvalContext,
    promise: &JsObjectType,
    on_fulfilled: Option<JsValue>,
    on_rejected: Option<JsValue>,
    derived: Option<JsObjectType>,
) {
    let reaction = PromiseReaction {
        on_fulfilled,
        on_rejected,
        derived,
    };
    let settled = {
        let mut obj = promise.borrow_mut();
        match &mut *obj {
            ObjectType::Promise(p) => {
                p.handled = true;
                if p.is_pending() {
                    p.reactions.push(reaction);
                    None
                } else {
                    Some(reaction)
                }
            }
            _ => None,
        }
    };
    if let Some(reaction) = settled {
        schedule_reaction(ctx, promise, reaction);
    }
}

/// `Promise.resolve` semantics: promises pass through, anything else is
/// wrapped in a fulfilled promise.
pub fn to_promise(ctx: &mut EvalContext, value: JsValue) -> JsObjectType {
    if let Some(p) = as_promise(&value) {
        return p;
    }
    let p = new_promise();
    resolve_promise(ctx, &p, value);
    p
}

fn callable(value: JsValue) -> Option<JsValue> {
    if value.is_callable() {
        Some(value)
    } else {
        None
    }
}

/// Resolve/reject functions handed to an executor. Only the first call of
/// either has an effect.
fn resolving_functions(promise: &JsObjectType) -> (JsValue, JsValue) {
    let done = Rc::new(Cell::new(false));
    let (p, d) = (promise.clone(), done.clone());
    let resolve = closure_value(
        "resolve",
        move |ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>| {
            if !d.replace(true) {
                resolve_promise(ctx, &p, arg(&args, 0));
            }
            Ok(JsValue::Undefined)
        },
    );
    let p = promise.clone();
    let reject = closure_value(
        "reject",
        move |ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>| {
            if !done.replace(true) {
                reject_promise(ctx, &p, arg(&args, 0));
            }
            Ok(JsValue::Undefined)
        },
    );
    (resolve, reject)
}

fn promise_constructor(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let executor = arg(&args, 0);
    if !executor.is_callable() {
        return Err(JErrorType::TypeError(format!(
            "Promise resolver {} is not a function",
            executor
        )));
    }
    let promise = new_promise();
    let (resolve, reject) = resolving_functions(&promise);
    if let Err(e) = call_value(ctx, &executor, JsValue::Undefined, vec![resolve, reject.clone()]) {
        let reason = error_to_value(e);
        call_value(ctx, &reject, JsValue::Undefined, vec![reason])?;
    }
    Ok(JsValue::Object(promise))
}

fn promise_resolve_static(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Object(to_promise(ctx, arg(&args, 0))))
}

fn promise_reject_static(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let p = new_promise();
    reject_promise(ctx, &p, arg(&args, 0));
    Ok(JsValue::Object(p))
}

/// Shared driver of `all` and `allSettled`. In settled form every outcome
/// fills its slot; otherwise the first rejection rejects the aggregate.
fn combine(
    ctx: &mut EvalContext,
    iterable: &JsValue,
    settled_form: bool,
) -> Result<JsValue, JErrorType> {
    let items = iterate_to_vec(ctx, iterable)?;
    let result = new_promise();
    if items.is_empty() {
        resolve_promise(ctx, &result, array_value(vec![]));
        return Ok(JsValue::Object(result));
    }
    let values = Rc::new(RefCell::new(vec![JsValue::Undefined; items.len()]));
    let remaining = Rc::new(Cell::new(items.len()));
    for (index, item) in items.into_iter().enumerate() {
        let p = to_promise(ctx, item);
        let (vals, rem, res) = (values.clone(), remaining.clone(), result.clone());
        let on_fulfilled = closure_value(
            "",
            move |ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>| {
                let v = arg(&args, 0);
                vals.borrow_mut()[index] = if settled_form {
                    outcome_object("fulfilled", "value", v)
                } else {
                    v
                };
                rem.set(rem.get() - 1);
                if rem.get() == 0 {
                    let all = vals.borrow().clone();
                    resolve_promise(ctx, &res, array_value(all));
                }
                Ok(JsValue::Undefined)
            },
        );
        let (vals, rem, res) = (values.clone(), remaining.clone(), result.clone());
        let on_rejected = closure_value(
            "",
            move |ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>| {
                let reason = arg(&args, 0);
                if !settled_form {
                    reject_promise(ctx, &res, reason);
                    return Ok(JsValue::Undefined);
                }
                vals.borrow_mut()[index] = outcome_object("rejected", "reason", reason);
                rem.set(rem.get() - 1);
                if rem.get() == 0 {
                    let all = vals.borrow().clone();
                    resolve_promise(ctx, &res, array_value(all));
                }
                Ok(JsValue::Undefined)
            },
        );
        add_reaction(ctx, &p, Some(on_fulfilled), Some(on_rejected), None);
    }
    Ok(JsValue::Object(result))
}

fn outcome_object(status: &str, key: &str, value: JsValue) -> JsValue {
    let mut props = PropertyMap::new();
    props.insert("status", JsValue::str(status));
    props.insert(key, value);
    object_value(props)
}

fn promise_all(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    combine(ctx, &arg(&args, 0), false)
}

fn promise_all_settled(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    combine(ctx, &arg(&args, 0), true)
}

fn promise_race(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let items = iterate_to_vec(ctx, &arg(&args, 0))?;
    let result = new_promise();
    for item in items {
        let p = to_promise(ctx, item);
        add_reaction(ctx, &p, None, None, Some(result.clone()));
    }
    Ok(JsValue::Object(result))
}

fn this_promise(this: &JsValue, method: &str) -> Result<JsObjectType, JErrorType> {
    as_promise(this).ok_or_else(|| {
        JErrorType::TypeError(format!(
            "Method Promise.prototype.{} called on incompatible receiver {}",
            method, this
        ))
    })
}

pub fn promise_then(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let promise = this_promise(&this, "then")?;
    let derived = new_promise();
    add_reaction(
        ctx,
        &promise,
        callable(arg(&args, 0)),
        callable(arg(&args, 1)),
        Some(derived.clone()),
    );
    Ok(JsValue::Object(derived))
}

fn promise_catch(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    promise_then(ctx, this, vec![JsValue::Undefined, arg(&args, 0)])
}

fn promise_finally(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let on_finally = arg(&args, 0);
    if !on_finally.is_callable() {
        return promise_then(ctx, this, vec![]);
    }
    let f = on_finally.clone();
    let on_fulfilled = closure_value(
        "",
        move |ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>| {
            call_value(ctx, &f, JsValue::Undefined, vec![])?;
            Ok(arg(&args, 0))
        },
    );
    let on_rejected = closure_value(
        "",
        move |ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>| {
            call_value(ctx, &on_finally, JsValue::Undefined, vec![])?;
            Err(JErrorType::Thrown(arg(&args, 0)))
        },
    );
    promise_then(ctx, this, vec![on_fulfilled, on_rejected])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(p: &JsObjectType) -> Option<Result<JsValue, JsValue>> {
        match &*p.borrow() {
            ObjectType::Promise(p) => match &p.state {
                PromiseState::Pending => None,
                PromiseState::Fulfilled(v) => Some(Ok(v.clone())),
                PromiseState::Rejected(v) => Some(Err(v.clone())),
            },
            _ => None,
        }
    }

    #[test]
    fn adopting_a_promise_waits_for_microtasks() {
        let mut ctx = EvalContext::with_core_builtins();
        let inner = new_promise();
        let outer = new_promise();
        resolve_promise(&mut ctx, &outer, JsValue::Object(inner.clone()));
        assert!(state(&outer).is_none());
        resolve_promise(&mut ctx, &inner, JsValue::from_i64(7));
        ctx.run_microtasks();
        assert_eq!(state(&outer), Some(Ok(JsValue::from_i64(7))));
    }

    #[test]
    fn only_first_settlement_counts() {
        let mut ctx = EvalContext::with_core_builtins();
        let p = new_promise();
        reject_promise(&mut ctx, &p, JsValue::str("no"));
        resolve_promise(&mut ctx, &p, JsValue::str("yes"));
        assert_eq!(state(&p), Some(Err(JsValue::str("no"))));
    }
}
