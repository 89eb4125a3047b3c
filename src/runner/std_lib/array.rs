//! Array built-in.
//!
//! Prototype methods accept real arrays and host sequences. Mutating methods
//! on a host sequence write every slot back through the host object.

use std::cmp::Ordering;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{array_value, ObjectType};
use crate::runner::ds::operations::test_and_comparison::{same_value_zero, strict_equals};
use crate::runner::ds::operations::type_conversion::{to_boolean, to_integer_or_infinity, to_number, to_string};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::call_value;
use crate::runner::eval::property::{get_property, iterate_to_vec, put_property};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext, NativeFn};

use super::arg;

const METHODS: [(&str, NativeFn); 34] = [
    ("push", array_push),
    ("pop", array_pop),
    ("shift", array_shift),
    ("unshift", array_unshift),
    ("slice", array_slice),
    ("splice", array_splice),
    ("indexOf", array_index_of),
    ("lastIndexOf", array_last_index_of),
    ("includes", array_includes),
    ("forEach", array_for_each),
    ("map", array_map),
    ("filter", array_filter),
    ("reduce", array_reduce),
    ("reduceRight", array_reduce_right),
    ("find", array_find),
    ("findIndex", array_find_index),
    ("findLast", array_find_last),
    ("findLastIndex", array_find_last_index),
    ("every", array_every),
    ("some", array_some),
    ("join", array_join),
    ("toString", array_to_string),
    ("concat", array_concat),
    ("reverse", array_reverse),
    ("sort", array_sort),
    ("flat", array_flat),
    ("flatMap", array_flat_map),
    ("fill", array_fill),
    ("at", array_at),
    ("keys", array_keys),
    ("values", array_values),
    ("entries", array_entries),
    ("toSorted", array_to_sorted),
    ("toReversed", array_to_reversed),
];

/// Register the Array built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let mut array = BuiltInObject::new("Array")
        .with_constructor(array_constructor)
        .add_method("isArray", is_array)
        .add_method("from", array_from)
        .add_method("of", array_of);
    for (name, f) in METHODS {
        array = array.add_prototype_method(name, f);
    }

    registry.register_object(array);
}

fn is_array_value(value: &JsValue) -> bool {
    match value {
        JsValue::Object(o) => o.borrow().is_array(),
        _ => false,
    }
}

fn elements(ctx: &mut EvalContext, this: &JsValue, method: &str) -> Result<Vec<JsValue>, JErrorType> {
    if !is_array_value(this) {
        return Err(JErrorType::TypeError(format!(
            "Array.prototype.{} called on non-array {}",
            method, this
        )));
    }
    iterate_to_vec(ctx, this)
}

/// Applies `f` to the elements of `this` in place.
fn mutate<R>(
    ctx: &mut EvalContext,
    this: &JsValue,
    method: &str,
    f: impl FnOnce(&mut Vec<JsValue>) -> R,
) -> Result<R, JErrorType> {
    if let JsValue::Object(o) = this {
        if let ObjectType::Array(a) = &mut *o.borrow_mut() {
            return Ok(f(&mut a.elements));
        }
    }
    let mut items = elements(ctx, this, method)?;
    let result = f(&mut items);
    store_back(ctx, this, items)?;
    Ok(result)
}

fn store_back(ctx: &mut EvalContext, this: &JsValue, items: Vec<JsValue>) -> Result<(), JErrorType> {
    let len = items.len();
    for (i, v) in items.into_iter().enumerate() {
        put_property(ctx, this, &i.to_string(), v)?;
    }
    put_property(ctx, this, "length", JsValue::from_i64(len as i64))
}

fn callback_arg(args: &[JsValue], method: &str) -> Result<JsValue, JErrorType> {
    let f = arg(args, 0);
    if !f.is_callable() {
        return Err(JErrorType::TypeError(format!(
            "Array.prototype.{}: {} is not a function",
            method, f
        )));
    }
    Ok(f)
}

fn relative(value: &JsValue, len: usize, default: usize) -> usize {
    if matches!(value, JsValue::Undefined) {
        return default;
    }
    let n = to_integer_or_infinity(value);
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn array_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    if let [JsValue::Number(n)] = args.as_slice() {
        let len = n.as_f64();
        if len < 0.0 || len.fract() != 0.0 || len > u32::MAX as f64 {
            return Err(JErrorType::RangeError("Invalid array length".to_string()));
        }
        return Ok(array_value(vec![JsValue::Undefined; len as usize]));
    }
    Ok(array_value(args))
}

fn is_array(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(is_array_value(&arg(&args, 0))))
}

fn array_from(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let source = arg(&args, 0);
    let items = match &source {
        JsValue::String(_) => iterate_to_vec(ctx, &source)?,
        JsValue::Object(_) if is_array_value(&source) => iterate_to_vec(ctx, &source)?,
        JsValue::Object(_) => {
            let len = to_number(&get_property(ctx, &source, "length")?);
            let len = if len.is_finite() && len > 0.0 { len as usize } else { 0 };
            let mut items = Vec::with_capacity(len);
            for i in 0..len {
                items.push(get_property(ctx, &source, &i.to_string())?);
            }
            items
        }
        _ => vec![],
    };
    let map = arg(&args, 1);
    if !map.is_callable() {
        return Ok(array_value(items));
    }
    let mut out = Vec::with_capacity(items.len());
    for (i, v) in items.into_iter().enumerate() {
        out.push(call_value(ctx, &map, JsValue::Undefined, vec![v, JsValue::from_i64(i as i64)])?);
    }
    Ok(array_value(out))
}

fn array_of(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(array_value(args))
}

fn array_push(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let len = mutate(ctx, &this, "push", |items| {
        items.extend(args);
        items.len()
    })?;
    Ok(JsValue::from_i64(len as i64))
}

fn array_pop(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(mutate(ctx, &this, "pop", |items| items.pop())?.unwrap_or(JsValue::Undefined))
}

fn array_shift(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let first = mutate(ctx, &this, "shift", |items| {
        if items.is_empty() {
            None
        } else {
            Some(items.remove(0))
        }
    })?;
    Ok(first.unwrap_or(JsValue::Undefined))
}

fn array_unshift(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let len = mutate(ctx, &this, "unshift", |items| {
        items.splice(0..0, args);
        items.len()
    })?;
    Ok(JsValue::from_i64(len as i64))
}

fn array_slice(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let items = elements(ctx, &this, "slice")?;
    let start = relative(&arg(&args, 0), items.len(), 0);
    let end = relative(&arg(&args, 1), items.len(), items.len());
    if start >= end {
        return Ok(array_value(vec![]));
    }
    Ok(array_value(items[start..end].to_vec()))
}

fn array_splice(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let removed = mutate(ctx, &this, "splice", |items| {
        let len = items.len();
        let start = relative(&arg(&args, 0), len, 0);
        let delete_count = match args.len() {
            0 => 0,
            1 => len - start,
            _ => to_integer_or_infinity(&args[1]).clamp(0.0, (len - start) as f64) as usize,
        };
        let inserted: Vec<JsValue> = args.iter().skip(2).cloned().collect();
        items.splice(start..start + delete_count, inserted).collect::<Vec<_>>()
    })?;
    Ok(array_value(removed))
}

fn array_index_of(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let items = elements(ctx, &this, "indexOf")?;
    let target = arg(&args, 0);
    let from = relative(&arg(&args, 1), items.len(), 0);
    let found = items.iter().enumerate().skip(from).find(|(_, v)| strict_equals(v, &target));
    Ok(JsValue::from_i64(found.map(|(i, _)| i as i64).unwrap_or(-1)))
}

fn array_last_index_of(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let items = elements(ctx, &this, "lastIndexOf")?;
    let target = arg(&args, 0);
    let found = items.iter().rposition(|v| strict_equals(v, &target));
    Ok(JsValue::from_i64(found.map(|i| i as i64).unwrap_or(-1)))
}

fn array_includes(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let items = elements(ctx, &this, "includes")?;
    let target = arg(&args, 0);
    let from = relative(&arg(&args, 1), items.len(), 0);
    Ok(JsValue::Boolean(items.iter().skip(from).any(|v| same_value_zero(v, &target))))
}

/// Calls `f(element, index, array)` for each element until `stop` says so.
/// Returns the index and element at which iteration stopped.
fn scan(
    ctx: &mut EvalContext,
    this: &JsValue,
    args: &[JsValue],
    method: &str,
    reverse: bool,
    mut stop: impl FnMut(&JsValue) -> bool,
) -> Result<Option<(usize, JsValue)>, JErrorType> {
    let items = elements(ctx, this, method)?;
    let f = callback_arg(args, method)?;
    let this_arg = arg(args, 1);
    let order: Vec<usize> = if reverse {
        (0..items.len()).rev().collect()
    } else {
        (0..items.len()).collect()
    };
    for i in order {
        let v = items[i].clone();
        let result = call_value(
            ctx,
            &f,
            this_arg.clone(),
            vec![v.clone(), JsValue::from_i64(i as i64), this.clone()],
        )?;
        if stop(&result) {
            return Ok(Some((i, v)));
        }
    }
    Ok(None)
}

fn array_for_each(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    scan(ctx, &this, &args, "forEach", false, |_| false)?;
    Ok(JsValue::Undefined)
}

fn array_map(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut out = Vec::new();
    scan(ctx, &this, &args, "map", false, |r| {
        out.push(r.clone());
        false
    })?;
    Ok(array_value(out))
}

fn array_filter(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let items = elements(ctx, &this, "filter")?;
    let mut keep = Vec::with_capacity(items.len());
    scan(ctx, &this, &args, "filter", false, |r| {
        keep.push(to_boolean(r));
        false
    })?;
    let out = items
        .into_iter()
        .zip(keep)
        .filter_map(|(v, k)| if k { Some(v) } else { None })
        .collect();
    Ok(array_value(out))
}

fn reduce_impl(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>, reverse: bool) -> Result<JsValue, JErrorType> {
    let method = if reverse { "reduceRight" } else { "reduce" };
    let items = elements(ctx, &this, method)?;
    let f = callback_arg(&args, method)?;
    let mut order: Vec<usize> = (0..items.len()).collect();
    if reverse {
        order.reverse();
    }
    let mut order = order.into_iter();
    let mut acc = match args.get(1) {
        Some(initial) => initial.clone(),
        None => match order.next() {
            Some(i) => items[i].clone(),
            None => {
                return Err(JErrorType::TypeError(
                    "Reduce of empty array with no initial value".to_string(),
                ))
            }
        },
    };
    for i in order {
        acc = call_value(
            ctx,
            &f,
            JsValue::Undefined,
            vec![acc, items[i].clone(), JsValue::from_i64(i as i64), this.clone()],
        )?;
    }
    Ok(acc)
}

fn array_reduce(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    reduce_impl(ctx, this, args, false)
}

fn array_reduce_right(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    reduce_impl(ctx, this, args, true)
}

fn array_find(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let hit = scan(ctx, &this, &args, "find", false, to_boolean)?;
    Ok(hit.map(|(_, v)| v).unwrap_or(JsValue::Undefined))
}

fn array_find_index(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let hit = scan(ctx, &this, &args, "findIndex", false, to_boolean)?;
    Ok(JsValue::from_i64(hit.map(|(i, _)| i as i64).unwrap_or(-1)))
}

fn array_find_last(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let hit = scan(ctx, &this, &args, "findLast", true, to_boolean)?;
    Ok(hit.map(|(_, v)| v).unwrap_or(JsValue::Undefined))
}

fn array_find_last_index(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let hit = scan(ctx, &this, &args, "findLastIndex", true, to_boolean)?;
    Ok(JsValue::from_i64(hit.map(|(i, _)| i as i64).unwrap_or(-1)))
}

fn array_every(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let miss = scan(ctx, &this, &args, "every", false, |r| !to_boolean(r))?;
    Ok(JsValue::Boolean(miss.is_none()))
}

fn array_some(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let hit = scan(ctx, &this, &args, "some", false, to_boolean)?;
    Ok(JsValue::Boolean(hit.is_some()))
}

fn join_items(items: &[JsValue], separator: &str) -> String {
    items
        .iter()
        .map(|v| if v.is_nullish() { String::new() } else { to_string(v) })
        .collect::<Vec<_>>()
        .join(separator)
}

fn array_join(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let items = elements(ctx, &this, "join")?;
    let separator = match arg(&args, 0) {
        JsValue::Undefined => ",".to_string(),
        s => to_string(&s),
    };
    Ok(JsValue::String(join_items(&items, &separator)))
}

fn array_to_string(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let items = elements(ctx, &this, "toString")?;
    Ok(JsValue::String(join_items(&items, ",")))
}

fn array_concat(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut items = elements(ctx, &this, "concat")?;
    for a in args {
        if is_array_value(&a) {
            items.extend(iterate_to_vec(ctx, &a)?);
        } else {
            items.push(a);
        }
    }
    Ok(array_value(items))
}

fn array_reverse(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    mutate(ctx, &this, "reverse", |items| items.reverse())?;
    Ok(this)
}

fn array_to_reversed(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut items = elements(ctx, &this, "toReversed")?;
    items.reverse();
    Ok(array_value(items))
}

/// Sorts with the script comparator, or by string value without one.
/// `undefined` always sorts last.
fn sort_items(ctx: &mut EvalContext, items: &mut [JsValue], compare: &JsValue) -> Result<(), JErrorType> {
    let mut error = None;
    items.sort_by(|a, b| {
        if error.is_some() {
            return Ordering::Equal;
        }
        match (a, b) {
            (JsValue::Undefined, JsValue::Undefined) => return Ordering::Equal,
            (JsValue::Undefined, _) => return Ordering::Greater,
            (_, JsValue::Undefined) => return Ordering::Less,
            _ => {}
        }
        if compare.is_callable() {
            match call_value(ctx, compare, JsValue::Undefined, vec![a.clone(), b.clone()]) {
                Ok(r) => {
                    let n = to_number(&r);
                    if n < 0.0 {
                        Ordering::Less
                    } else if n > 0.0 {
                        Ordering::Greater
                    } else {
                        Ordering::Equal
                    }
                }
                Err(e) => {
                    error = Some(e);
                    Ordering::Equal
                }
            }
        } else {
            to_string(a).cmp(&to_string(b))
        }
    });
    match error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn array_sort(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let compare = arg(&args, 0);
    let mut items = elements(ctx, &this, "sort")?;
    sort_items(ctx, &mut items, &compare)?;
    mutate(ctx, &this, "sort", |slot| *slot = items)?;
    Ok(this)
}

fn array_to_sorted(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let compare = arg(&args, 0);
    let mut items = elements(ctx, &this, "toSorted")?;
    sort_items(ctx, &mut items, &compare)?;
    Ok(array_value(items))
}

fn flatten_into(ctx: &mut EvalContext, out: &mut Vec<JsValue>, items: Vec<JsValue>, depth: f64) -> Result<(), JErrorType> {
    for v in items {
        if depth >= 1.0 && is_array_value(&v) {
            let inner = iterate_to_vec(ctx, &v)?;
            flatten_into(ctx, out, inner, depth - 1.0)?;
        } else {
            out.push(v);
        }
    }
    Ok(())
}

fn array_flat(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let items = elements(ctx, &this, "flat")?;
    let depth = match arg(&args, 0) {
        JsValue::Undefined => 1.0,
        d => to_integer_or_infinity(&d),
    };
    let mut out = Vec::new();
    flatten_into(ctx, &mut out, items, depth)?;
    Ok(array_value(out))
}

fn array_flat_map(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mapped = array_map(ctx, this, args)?;
    let items = iterate_to_vec(ctx, &mapped)?;
    let mut out = Vec::new();
    flatten_into(ctx, &mut out, items, 1.0)?;
    Ok(array_value(out))
}

fn array_fill(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let value = arg(&args, 0);
    mutate(ctx, &this, "fill", |items| {
        let len = items.len();
        let start = relative(&arg(&args, 1), len, 0);
        let end = relative(&arg(&args, 2), len, len);
        for slot in items.iter_mut().take(end).skip(start) {
            *slot = value.clone();
        }
    })?;
    Ok(this)
}

fn array_at(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let items = elements(ctx, &this, "at")?;
    let mut i = to_integer_or_infinity(&arg(&args, 0));
    if i < 0.0 {
        i += items.len() as f64;
    }
    if i < 0.0 || i >= items.len() as f64 {
        return Ok(JsValue::Undefined);
    }
    Ok(items[i as usize].clone())
}

fn array_keys(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let items = elements(ctx, &this, "keys")?;
    Ok(array_value((0..items.len()).map(|i| JsValue::from_i64(i as i64)).collect()))
}

fn array_values(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(array_value(elements(ctx, &this, "values")?))
}

fn array_entries(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let items = elements(ctx, &this, "entries")?;
    Ok(array_value(
        items
            .into_iter()
            .enumerate()
            .map(|(i, v)| array_value(vec![JsValue::from_i64(i as i64), v]))
            .collect(),
    ))
}
