//! Binding of values to identifiers and destructuring patterns.

use crate::parser::ast::{ExpressionType, PatternType, PropertyKey};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{array_value, new_object};
use crate::runner::ds::object_property::PropertyMap;
use crate::runner::ds::operations::type_conversion::to_property_key;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::EvalContext;

use super::expression::{evaluate_expression, evaluate_member_target, evaluate_named};
use super::property::{copy_own_properties, get_property, iterate_to_vec, put_property};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    /// Plain assignment to existing targets.
    Assign,
    /// `var`: the name was hoisted into the variable environment.
    Var,
    Let,
    Const,
}

pub fn property_key_value(ctx: &mut EvalContext, key: &PropertyKey) -> Result<String, JErrorType> {
    match key {
        PropertyKey::Static(s) => Ok(s.clone()),
        PropertyKey::Computed(e) => {
            let v = evaluate_expression(e, ctx)?;
            Ok(to_property_key(&v))
        }
    }
}

fn bind_name(ctx: &mut EvalContext, name: &str, value: JsValue, mode: BindingMode) -> Result<(), JErrorType> {
    match mode {
        BindingMode::Assign => ctx.set_binding(name, value),
        BindingMode::Var => {
            if !ctx.var_env.set_mutable_binding(name, value.clone())? {
                ctx.var_env.declare(name, value, true);
            }
            Ok(())
        }
        BindingMode::Let => {
            ctx.lex_env.declare(name, value, true);
            Ok(())
        }
        BindingMode::Const => {
            ctx.lex_env.declare(name, value, false);
            Ok(())
        }
    }
}

pub fn bind_pattern(
    ctx: &mut EvalContext,
    pattern: &PatternType,
    value: JsValue,
    mode: BindingMode,
) -> Result<(), JErrorType> {
    match pattern {
        PatternType::Identifier(name) => bind_name(ctx, name, value, mode),
        PatternType::Member(expr) => assign_to_member(ctx, expr, value),
        PatternType::AssignmentPattern { left, right } => {
            let value = if matches!(value, JsValue::Undefined) {
                match left.as_ref() {
                    PatternType::Identifier(name) => evaluate_named(right, ctx, name)?,
                    _ => evaluate_expression(right, ctx)?,
                }
            } else {
                value
            };
            bind_pattern(ctx, left, value, mode)
        }
        PatternType::ObjectPattern { properties, rest } => {
            if value.is_nullish() {
                return Err(JErrorType::TypeError(format!(
                    "Cannot destructure '{}' as it is {}.",
                    value, value
                )));
            }
            let mut used = Vec::with_capacity(properties.len());
            for property in properties {
                let key = property_key_value(ctx, &property.key)?;
                let v = get_property(ctx, &value, &key)?;
                used.push(key);
                bind_pattern(ctx, &property.value, v, mode)?;
            }
            if let Some(rest) = rest {
                let target = new_object(PropertyMap::new());
                copy_own_properties(ctx, &target, &value, &used)?;
                bind_pattern(ctx, rest, JsValue::Object(target), mode)?;
            }
            Ok(())
        }
        PatternType::ArrayPattern { elements, rest } => {
            let items = iterate_to_vec(ctx, &value)?;
            let mut iter = items.into_iter();
            for element in elements {
                let v = iter.next().unwrap_or(JsValue::Undefined);
                if let Some(p) = element {
                    bind_pattern(ctx, p, v, mode)?;
                }
            }
            if let Some(rest) = rest {
                bind_pattern(ctx, rest, array_value(iter.collect()), mode)?;
            }
            Ok(())
        }
    }
}

fn assign_to_member(ctx: &mut EvalContext, expr: &ExpressionType, value: JsValue) -> Result<(), JErrorType> {
    let (base, key) = evaluate_member_target(expr, ctx)?;
    put_property(ctx, &base, &key, value)
}
