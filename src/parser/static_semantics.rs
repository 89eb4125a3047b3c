//! Early-error checks that need the built AST, mainly turning an expression
//! on the left of `=` into an assignment pattern.

use crate::parser::ast::{
    ExpressionOrSpreadElement, ExpressionType, ObjectPatternProperty, PatternType, PropertyData,
};

pub(crate) fn is_valid_simple_assignment_target(expr: &ExpressionType) -> bool {
    matches!(
        expr,
        ExpressionType::Identifier { .. } | ExpressionType::MemberExpression { optional: false, .. }
    )
}

/// Reinterprets an expression as a destructuring or simple assignment target.
pub(crate) fn expression_to_pattern(expr: ExpressionType) -> Result<PatternType, String> {
    match expr {
        ExpressionType::Identifier { name, .. } => Ok(PatternType::Identifier(name)),
        ExpressionType::MemberExpression {
            optional: false, ..
        } => Ok(PatternType::Member(Box::new(expr))),
        ExpressionType::AssignmentExpression {
            operator: crate::parser::ast::AssignmentOperator::Equals,
            left,
            right,
            ..
        } => Ok(PatternType::AssignmentPattern {
            left: Box::new(left),
            right,
        }),
        ExpressionType::ArrayExpression { elements, .. } => {
            let mut out = vec![];
            let mut rest = None;
            let count = elements.len();
            for (idx, element) in elements.into_iter().enumerate() {
                match element {
                    None => out.push(None),
                    Some(ExpressionOrSpreadElement::Expression(e)) => {
                        out.push(Some(expression_to_pattern(e)?))
                    }
                    Some(ExpressionOrSpreadElement::SpreadElement(e)) => {
                        if idx + 1 != count {
                            return Err("Rest element must be last element".to_string());
                        }
                        rest = Some(Box::new(expression_to_pattern(e)?));
                    }
                }
            }
            Ok(PatternType::ArrayPattern {
                elements: out,
                rest,
            })
        }
        ExpressionType::ObjectExpression { properties, .. } => {
            let mut out = vec![];
            let mut rest = None;
            let count = properties.len();
            for (idx, property) in properties.into_iter().enumerate() {
                match property {
                    PropertyData::Property { key, value } => out.push(ObjectPatternProperty {
                        key,
                        value: expression_to_pattern(value)?,
                    }),
                    PropertyData::Spread(e) => {
                        if idx + 1 != count {
                            return Err("Rest element must be last element".to_string());
                        }
                        rest = Some(Box::new(expression_to_pattern(e)?));
                    }
                }
            }
            Ok(PatternType::ObjectPattern {
                properties: out,
                rest,
            })
        }
        _ => Err("Invalid left-hand side in assignment".to_string()),
    }
}
