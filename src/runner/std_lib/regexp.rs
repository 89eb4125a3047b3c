//! RegExp built-in, backed by the `regex` crate. Look-around and
//! back-references are not available and fail at construction.

use std::cell::RefCell;
use std::rc::Rc;

use regex::{Regex, RegexBuilder};

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{array_value, JsObjectType, ObjectType, RegExpObject};
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

use super::arg;

/// Register the RegExp built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let regexp = BuiltInObject::new("RegExp")
        .with_constructor(regexp_constructor)
        .add_prototype_method("test", regexp_test)
        .add_prototype_method("exec", regexp_exec)
        .add_prototype_method("toString", regexp_to_string);

    registry.register_object(regexp);
}

pub fn compile_regex(pattern: &str, flags: &str) -> Result<Regex, JErrorType> {
    for f in flags.chars() {
        if !"gimsuyd".contains(f) {
            return Err(JErrorType::SyntaxError(format!(
                "Invalid regular expression flags '{}'",
                flags
            )));
        }
    }
    RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|e| {
            JErrorType::SyntaxError(format!("Invalid regular expression: /{}/: {}", pattern, e))
        })
}

pub fn create_regexp(pattern: &str, flags: &str) -> ValueResult {
    let regex = compile_regex(pattern, flags)?;
    Ok(JsValue::Object(Rc::new(RefCell::new(ObjectType::RegExp(RegExpObject {
        source: pattern.to_string(),
        flags: flags.to_string(),
        regex,
        last_index: 0,
    })))))
}

/// Compiled regex and global flag of a RegExp value.
pub(crate) fn regexp_parts(value: &JsValue) -> Option<(Regex, bool)> {
    match value {
        JsValue::Object(o) => match &*o.borrow() {
            ObjectType::RegExp(r) => Some((r.regex.clone(), r.flags.contains('g'))),
            _ => None,
        },
        _ => None,
    }
}

fn this_regexp(this: &JsValue, method: &str) -> Result<JsObjectType, JErrorType> {
    match this {
        JsValue::Object(o) if matches!(&*o.borrow(), ObjectType::RegExp(_)) => Ok(o.clone()),
        other => Err(JErrorType::TypeError(format!(
            "RegExp.prototype.{} called on incompatible receiver {}",
            method, other
        ))),
    }
}

fn regexp_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let flags = match arg(&args, 1) {
        JsValue::Undefined => None,
        other => Some(to_string(&other)),
    };
    let source = arg(&args, 0);
    let existing = match &source {
        JsValue::Object(o) => match &*o.borrow() {
            ObjectType::RegExp(r) => Some((r.source.clone(), r.flags.clone())),
            _ => None,
        },
        _ => None,
    };
    if let Some((pattern, own_flags)) = existing {
        return create_regexp(&pattern, &flags.unwrap_or(own_flags));
    }
    let pattern = match source {
        JsValue::Undefined => "(?:)".to_string(),
        other => to_string(&other),
    };
    create_regexp(&pattern, &flags.unwrap_or_default())
}

/// Runs one match honouring `lastIndex` for global and sticky expressions.
fn exec_at(re: &JsObjectType, input: &str) -> Option<Vec<JsValue>> {
    let mut obj = re.borrow_mut();
    let r = match &mut *obj {
        ObjectType::RegExp(r) => r,
        _ => return None,
    };
    let stateful = r.flags.contains('g') || r.flags.contains('y');
    let start = if stateful { r.last_index } else { 0 };
    if start > input.len() || !input.is_char_boundary(start) {
        r.last_index = 0;
        return None;
    }
    let caps = match r.regex.captures_at(input, start) {
        Some(c) => c,
        None => {
            r.last_index = 0;
            return None;
        }
    };
    let whole = caps.get(0)?;
    if r.flags.contains('y') && whole.start() != start {
        r.last_index = 0;
        return None;
    }
    if stateful {
        r.last_index = if whole.end() == whole.start() {
            whole.end() + 1
        } else {
            whole.end()
        };
    }
    Some(
        caps.iter()
            .map(|m| match m {
                Some(m) => JsValue::str(m.as_str()),
                None => JsValue::Undefined,
            })
            .collect(),
    )
}

fn regexp_test(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let re = this_regexp(&this, "test")?;
    let input = to_string(&arg(&args, 0));
    Ok(JsValue::Boolean(exec_at(&re, &input).is_some()))
}

fn regexp_exec(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let re = this_regexp(&this, "exec")?;
    let input = to_string(&arg(&args, 0));
    Ok(match exec_at(&re, &input) {
        Some(groups) => array_value(groups),
        None => JsValue::Null,
    })
}

fn regexp_to_string(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let re = this_regexp(&this, "toString")?;
    let s = match &*re.borrow() {
        ObjectType::RegExp(r) => format!("/{}/{}", r.source, r.flags),
        _ => String::new(),
    };
    Ok(JsValue::String(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_exec_advances_last_index() {
        let re = match create_regexp("a(\\d)", "g").unwrap() {
            JsValue::Object(o) => o,
            _ => unreachable!(),
        };
        assert_eq!(exec_at(&re, "a1 a2").unwrap()[1], JsValue::str("1"));
        assert_eq!(exec_at(&re, "a1 a2").unwrap()[1], JsValue::str("2"));
        assert!(exec_at(&re, "a1 a2").is_none());
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(matches!(create_regexp("a", "q"), Err(JErrorType::SyntaxError(_))));
    }
}
