//! Expression evaluation.
//!
//! Every expression form the parser produces is handled here. Optional
//! chains are evaluated by [`evaluate_chain`], which reports a short-circuit
//! as `None` so the enclosing `ChainExpression` can turn it into `undefined`.

use crate::parser::ast::{
    AssignmentOperator, BinaryOperator, ExpressionOrSpreadElement, ExpressionType, LiteralType,
    LogicalOperator, MemberProperty, PatternType, PropertyData, UnaryOperator, UpdateOperator,
};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{array_value, new_object, ObjectType};
use crate::runner::ds::object_property::PropertyMap;
use crate::runner::ds::operations::test_and_comparison::{less_than, loose_equals, strict_equals};
use crate::runner::ds::operations::type_conversion::{
    get_type, to_boolean, to_int32, to_number, to_property_key, to_string, to_uint32,
};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::regexp::create_regexp;

use super::function::{call_value, construct, create_function};
use super::pattern::{bind_pattern, property_key_value, BindingMode};
use super::property::{
    copy_own_properties, delete_property, function_prototype, get_property, has_in_prototype_chain,
    has_property, iterate_to_vec, put_property,
};
use super::types::{Reference, ReferenceResult, ValueResult};

/// Evaluate an expression and return its value.
pub fn evaluate_expression(expr: &ExpressionType, ctx: &mut EvalContext) -> ValueResult {
    match expr {
        ExpressionType::Literal(lit) => Ok(match &lit.value {
            LiteralType::NullLiteral => JsValue::Null,
            LiteralType::BooleanLiteral(b) => JsValue::Boolean(*b),
            LiteralType::StringLiteral(s) => JsValue::String(s.clone()),
            LiteralType::NumberLiteral(n) => JsValue::from_f64(*n),
        }),

        ExpressionType::Identifier { name, .. } => ctx.get_binding(name),

        ExpressionType::ThisExpression { .. } => Ok(ctx.this_value.clone()),

        ExpressionType::TemplateLiteral {
            quasis, expressions, ..
        } => {
            let mut out = String::new();
            for (i, quasi) in quasis.iter().enumerate() {
                out.push_str(quasi);
                if let Some(e) = expressions.get(i) {
                    let v = evaluate_expression(e, ctx)?;
                    out.push_str(&to_string(&v));
                }
            }
            Ok(JsValue::String(out))
        }

        ExpressionType::RegExpLiteral { pattern, flags, .. } => create_regexp(pattern, flags),

        ExpressionType::ArrayExpression { elements, .. } => {
            let mut values = Vec::with_capacity(elements.len());
            for element in elements {
                match element {
                    None => values.push(JsValue::Undefined),
                    Some(ExpressionOrSpreadElement::Expression(e)) => {
                        values.push(evaluate_expression(e, ctx)?)
                    }
                    Some(ExpressionOrSpreadElement::SpreadElement(e)) => {
                        let v = evaluate_expression(e, ctx)?;
                        values.extend(iterate_to_vec(ctx, &v)?);
                    }
                }
            }
            Ok(array_value(values))
        }

        ExpressionType::ObjectExpression { properties, .. } => {
            let obj = new_object(PropertyMap::new());
            let target = JsValue::Object(obj.clone());
            for property in properties {
                match property {
                    PropertyData::Property { key, value } => {
                        let key = property_key_value(ctx, key)?;
                        let v = evaluate_named(value, ctx, &key)?;
                        put_property(ctx, &target, &key, v)?;
                    }
                    PropertyData::Spread(e) => {
                        let source = evaluate_expression(e, ctx)?;
                        copy_own_properties(ctx, &obj, &source, &[])?;
                    }
                }
            }
            Ok(target)
        }

        ExpressionType::FunctionExpression(data) => Ok(create_function(ctx, data, None)),

        ExpressionType::UnaryExpression {
            operator, argument, ..
        } => evaluate_unary_expression(operator, argument, ctx),

        ExpressionType::AwaitExpression { argument, .. } => {
            let v = evaluate_expression(argument, ctx)?;
            ctx.await_value(v)
        }

        ExpressionType::UpdateExpression {
            operator,
            argument,
            prefix,
            ..
        } => {
            let reference = evaluate_reference(argument, ctx)?;
            let old = to_number(&get_reference_value(ctx, &reference)?);
            let new = match operator {
                UpdateOperator::Increment => old + 1.0,
                UpdateOperator::Decrement => old - 1.0,
            };
            put_reference_value(ctx, &reference, JsValue::from_f64(new))?;
            Ok(JsValue::from_f64(if *prefix { new } else { old }))
        }

        ExpressionType::BinaryExpression {
            operator,
            left,
            right,
            ..
        } => {
            let l = evaluate_expression(left, ctx)?;
            let r = evaluate_expression(right, ctx)?;
            apply_binary_operator(ctx, *operator, &l, &r)
        }

        ExpressionType::LogicalExpression {
            operator,
            left,
            right,
            ..
        } => {
            let l = evaluate_expression(left, ctx)?;
            if short_circuits(*operator, &l) {
                Ok(l)
            } else {
                evaluate_expression(right, ctx)
            }
        }

        ExpressionType::AssignmentExpression {
            operator,
            left,
            right,
            ..
        } => evaluate_assignment(*operator, left, right, ctx),

        ExpressionType::ConditionalExpression {
            test,
            consequent,
            alternate,
            ..
        } => {
            if to_boolean(&evaluate_expression(test, ctx)?) {
                evaluate_expression(consequent, ctx)
            } else {
                evaluate_expression(alternate, ctx)
            }
        }

        ExpressionType::MemberExpression { .. } | ExpressionType::CallExpression { .. } => {
            Ok(evaluate_chain(expr, ctx)?.map(|(v, _)| v).unwrap_or(JsValue::Undefined))
        }

        ExpressionType::ChainExpression { expression, .. } => {
            Ok(evaluate_chain(expression, ctx)?.map(|(v, _)| v).unwrap_or(JsValue::Undefined))
        }

        ExpressionType::NewExpression {
            callee, arguments, ..
        } => {
            let f = evaluate_expression(callee, ctx)?;
            let args = evaluate_arguments(arguments, ctx)?;
            if !f.is_callable() {
                return Err(JErrorType::TypeError(format!(
                    "{} is not a constructor",
                    describe_callee(callee)
                )));
            }
            construct(ctx, &f, args)
        }

        ExpressionType::SequenceExpression { expressions, .. } => {
            let mut last = JsValue::Undefined;
            for e in expressions {
                last = evaluate_expression(e, ctx)?;
            }
            Ok(last)
        }
    }
}

/// Evaluates `expr`, naming anonymous functions after the binding they are
/// assigned to.
pub fn evaluate_named(expr: &ExpressionType, ctx: &mut EvalContext, name: &str) -> ValueResult {
    match expr {
        ExpressionType::FunctionExpression(data) => Ok(create_function(ctx, data, Some(name))),
        _ => evaluate_expression(expr, ctx),
    }
}

fn short_circuits(operator: LogicalOperator, left: &JsValue) -> bool {
    match operator {
        LogicalOperator::Or => to_boolean(left),
        LogicalOperator::And => !to_boolean(left),
        LogicalOperator::Coalesce => !left.is_nullish(),
    }
}

pub fn evaluate_arguments(
    arguments: &[ExpressionOrSpreadElement],
    ctx: &mut EvalContext,
) -> Result<Vec<JsValue>, JErrorType> {
    let mut args = Vec::with_capacity(arguments.len());
    for argument in arguments {
        match argument {
            ExpressionOrSpreadElement::Expression(e) => args.push(evaluate_expression(e, ctx)?),
            ExpressionOrSpreadElement::SpreadElement(e) => {
                let v = evaluate_expression(e, ctx)?;
                args.extend(iterate_to_vec(ctx, &v)?);
            }
        }
    }
    Ok(args)
}

fn member_key(property: &MemberProperty, ctx: &mut EvalContext) -> Result<String, JErrorType> {
    match property {
        MemberProperty::Static(name) => Ok(name.clone()),
        MemberProperty::Computed(e) => {
            let v = evaluate_expression(e, ctx)?;
            Ok(to_property_key(&v))
        }
    }
}

/// Source-like description of a callee for error messages.
fn describe_callee(expr: &ExpressionType) -> String {
    match expr {
        ExpressionType::Identifier { name, .. } => name.clone(),
        ExpressionType::ThisExpression { .. } => "this".to_string(),
        ExpressionType::MemberExpression {
            object, property, ..
        } => match property {
            MemberProperty::Static(name) => format!("{}.{}", describe_callee(object), name),
            MemberProperty::Computed(_) => format!("{}[...]", describe_callee(object)),
        },
        ExpressionType::CallExpression { callee, .. } => format!("{}(...)", describe_callee(callee)),
        ExpressionType::ChainExpression { expression, .. } => describe_callee(expression),
        _ => "expression".to_string(),
    }
}

/// Evaluates a member/call chain. Returns the value together with the
/// `this` a call on it would receive, or `None` when an optional link
/// short-circuited.
pub fn evaluate_chain(
    expr: &ExpressionType,
    ctx: &mut EvalContext,
) -> Result<Option<(JsValue, JsValue)>, JErrorType> {
    match expr {
        ExpressionType::MemberExpression {
            object,
            property,
            optional,
            ..
        } => {
            let base = match evaluate_chain(object, ctx)? {
                Some((v, _)) => v,
                None => return Ok(None),
            };
            if *optional && base.is_nullish() {
                return Ok(None);
            }
            let key = member_key(property, ctx)?;
            let value = get_property(ctx, &base, &key)?;
            Ok(Some((value, base)))
        }
        ExpressionType::CallExpression {
            callee,
            arguments,
            optional,
            ..
        } => {
            let (f, this) = match evaluate_chain(callee, ctx)? {
                Some(pair) => pair,
                None => return Ok(None),
            };
            if *optional && f.is_nullish() {
                return Ok(None);
            }
            let args = evaluate_arguments(arguments, ctx)?;
            if !f.is_callable() {
                return Err(JErrorType::TypeError(format!(
                    "{} is not a function",
                    describe_callee(callee)
                )));
            }
            let result = call_value(ctx, &f, this, args)?;
            Ok(Some((result, JsValue::Undefined)))
        }
        _ => Ok(Some((evaluate_expression(expr, ctx)?, JsValue::Undefined))),
    }
}

/// Base object and key of a member expression used as an assignment target.
pub fn evaluate_member_target(
    expr: &ExpressionType,
    ctx: &mut EvalContext,
) -> Result<(JsValue, String), JErrorType> {
    match expr {
        ExpressionType::MemberExpression {
            object, property, ..
        } => {
            let base = evaluate_expression(object, ctx)?;
            let key = member_key(property, ctx)?;
            Ok((base, key))
        }
        _ => Err(JErrorType::SyntaxError(
            "Invalid left-hand side in assignment".to_string(),
        )),
    }
}

pub fn evaluate_reference(expr: &ExpressionType, ctx: &mut EvalContext) -> ReferenceResult {
    match expr {
        ExpressionType::Identifier { name, .. } => Ok(Reference::Binding(name.clone())),
        ExpressionType::MemberExpression { .. } => {
            let (base, key) = evaluate_member_target(expr, ctx)?;
            Ok(Reference::Property { base, key })
        }
        _ => Err(JErrorType::SyntaxError(
            "Invalid left-hand side expression in postfix operation".to_string(),
        )),
    }
}

fn pattern_reference(pattern: &PatternType, ctx: &mut EvalContext) -> ReferenceResult {
    match pattern {
        PatternType::Identifier(name) => Ok(Reference::Binding(name.clone())),
        PatternType::Member(expr) => evaluate_reference(expr, ctx),
        _ => Err(JErrorType::SyntaxError(
            "Invalid left-hand side in assignment".to_string(),
        )),
    }
}

pub fn get_reference_value(ctx: &mut EvalContext, reference: &Reference) -> ValueResult {
    match reference {
        Reference::Binding(name) => ctx.get_binding(name),
        Reference::Property { base, key } => get_property(ctx, base, key),
    }
}

pub fn put_reference_value(ctx: &mut EvalContext, reference: &Reference, value: JsValue) -> Result<(), JErrorType> {
    match reference {
        Reference::Binding(name) => ctx.set_binding(name, value),
        Reference::Property { base, key } => put_property(ctx, base, key, value),
    }
}

fn evaluate_assignment(
    operator: AssignmentOperator,
    left: &PatternType,
    right: &ExpressionType,
    ctx: &mut EvalContext,
) -> ValueResult {
    match operator {
        AssignmentOperator::Equals => {
            if let PatternType::Member(expr) = left {
                // Target is evaluated before the right-hand side.
                let reference = evaluate_reference(expr, ctx)?;
                let value = evaluate_expression(right, ctx)?;
                put_reference_value(ctx, &reference, value.clone())?;
                return Ok(value);
            }
            let value = match left {
                PatternType::Identifier(name) => evaluate_named(right, ctx, name)?,
                _ => evaluate_expression(right, ctx)?,
            };
            bind_pattern(ctx, left, value.clone(), BindingMode::Assign)?;
            Ok(value)
        }
        AssignmentOperator::Binary(op) => {
            let reference = pattern_reference(left, ctx)?;
            let current = get_reference_value(ctx, &reference)?;
            let rhs = evaluate_expression(right, ctx)?;
            let value = apply_binary_operator(ctx, op, &current, &rhs)?;
            put_reference_value(ctx, &reference, value.clone())?;
            Ok(value)
        }
        AssignmentOperator::Logical(op) => {
            let reference = pattern_reference(left, ctx)?;
            let current = get_reference_value(ctx, &reference)?;
            if short_circuits(op, &current) {
                return Ok(current);
            }
            let value = match &reference {
                Reference::Binding(name) => evaluate_named(right, ctx, name)?,
                _ => evaluate_expression(right, ctx)?,
            };
            put_reference_value(ctx, &reference, value.clone())?;
            Ok(value)
        }
    }
}

fn evaluate_unary_expression(
    operator: &UnaryOperator,
    argument: &ExpressionType,
    ctx: &mut EvalContext,
) -> ValueResult {
    match operator {
        UnaryOperator::TypeOf => {
            if let ExpressionType::Identifier { name, .. } = argument {
                if !ctx.has_binding(name) {
                    return Ok(JsValue::str("undefined"));
                }
            }
            let v = evaluate_expression(argument, ctx)?;
            Ok(JsValue::str(get_type(&v)))
        }
        UnaryOperator::Delete => match argument {
            ExpressionType::MemberExpression { .. } => {
                let (base, key) = evaluate_member_target(argument, ctx)?;
                Ok(JsValue::Boolean(delete_property(&base, &key)?))
            }
            _ => {
                evaluate_expression(argument, ctx)?;
                Ok(JsValue::Boolean(true))
            }
        },
        _ => {
            let v = evaluate_expression(argument, ctx)?;
            Ok(match operator {
                UnaryOperator::Minus => JsValue::from_f64(-to_number(&v)),
                UnaryOperator::Plus => JsValue::from_f64(to_number(&v)),
                UnaryOperator::LogicalNot => JsValue::Boolean(!to_boolean(&v)),
                UnaryOperator::BitwiseNot => JsValue::from_i64(!to_int32(&v) as i64),
                UnaryOperator::Void => JsValue::Undefined,
                UnaryOperator::TypeOf | UnaryOperator::Delete => JsValue::Undefined,
            })
        }
    }
}

fn to_primitive_for_add(v: &JsValue) -> JsValue {
    match v {
        JsValue::Object(_) => JsValue::String(to_string(v)),
        other => other.clone(),
    }
}

pub fn apply_binary_operator(
    ctx: &mut EvalContext,
    operator: BinaryOperator,
    l: &JsValue,
    r: &JsValue,
) -> ValueResult {
    let number = |f: fn(f64, f64) -> f64| JsValue::from_f64(f(to_number(l), to_number(r)));
    let int32 = |f: fn(i32, u32) -> i32| JsValue::from_i64(f(to_int32(l), to_uint32(r)) as i64);
    Ok(match operator {
        BinaryOperator::Add => {
            let (pl, pr) = (to_primitive_for_add(l), to_primitive_for_add(r));
            match (&pl, &pr) {
                (JsValue::String(a), _) => JsValue::String(format!("{}{}", a, to_string(&pr))),
                (_, JsValue::String(b)) => JsValue::String(format!("{}{}", to_string(&pl), b)),
                _ => JsValue::from_f64(to_number(&pl) + to_number(&pr)),
            }
        }
        BinaryOperator::Subtract => number(|a, b| a - b),
        BinaryOperator::Multiply => number(|a, b| a * b),
        BinaryOperator::Divide => number(|a, b| a / b),
        BinaryOperator::Modulo => number(|a, b| a % b),
        BinaryOperator::Exponent => number(f64::powf),
        BinaryOperator::Equal => JsValue::Boolean(loose_equals(l, r)),
        BinaryOperator::NotEqual => JsValue::Boolean(!loose_equals(l, r)),
        BinaryOperator::StrictlyEqual => JsValue::Boolean(strict_equals(l, r)),
        BinaryOperator::StrictlyUnequal => JsValue::Boolean(!strict_equals(l, r)),
        BinaryOperator::LessThan => JsValue::Boolean(less_than(l, r) == Some(true)),
        BinaryOperator::GreaterThan => JsValue::Boolean(less_than(r, l) == Some(true)),
        BinaryOperator::LessThanEqual => JsValue::Boolean(less_than(r, l) == Some(false)),
        BinaryOperator::GreaterThanEqual => JsValue::Boolean(less_than(l, r) == Some(false)),
        BinaryOperator::BitwiseAnd => JsValue::from_i64((to_int32(l) & to_int32(r)) as i64),
        BinaryOperator::BitwiseOr => JsValue::from_i64((to_int32(l) | to_int32(r)) as i64),
        BinaryOperator::BitwiseXor => JsValue::from_i64((to_int32(l) ^ to_int32(r)) as i64),
        BinaryOperator::BitwiseLeftShift => int32(|a, b| a.wrapping_shl(b & 31)),
        BinaryOperator::BitwiseRightShift => int32(|a, b| a >> (b & 31)),
        BinaryOperator::BitwiseUnsignedRightShift => {
            JsValue::from_i64((to_uint32(l) >> (to_uint32(r) & 31)) as i64)
        }
        BinaryOperator::In => {
            let key = to_property_key(l);
            JsValue::Boolean(has_property(ctx, r, &key)?)
        }
        BinaryOperator::InstanceOf => JsValue::Boolean(instance_of(l, r)?),
    })
}

fn instance_of(value: &JsValue, constructor: &JsValue) -> Result<bool, JErrorType> {
    let ctor = match constructor {
        JsValue::Object(o) if o.borrow().is_callable() => o.clone(),
        _ => {
            return Err(JErrorType::TypeError(
                "Right-hand side of 'instanceof' is not callable".to_string(),
            ))
        }
    };
    let obj = match value {
        JsValue::Object(o) => o.clone(),
        _ => return Ok(false),
    };
    let (is_script, name) = match &*ctor.borrow() {
        ObjectType::Function(f) => (
            matches!(f.kind, crate::runner::ds::function_object::FunctionKind::Script(_)),
            f.name.clone(),
        ),
        _ => (false, String::new()),
    };
    if is_script {
        let proto = function_prototype(&ctor);
        return Ok(has_in_prototype_chain(value, &proto));
    }
    let o = obj.borrow();
    let class = o.class_name();
    Ok(match name.as_str() {
        "Object" => true,
        "Array" => o.is_array(),
        "Function" => o.is_callable(),
        "Error" => class.ends_with("Error"),
        other => class == other,
    })
}
