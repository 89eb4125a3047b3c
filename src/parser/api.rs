use std::sync::Arc;

use pest::error::{Error, ErrorVariant, LineColLocation};
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use super::ast::*;
use super::static_semantics::{expression_to_pattern, is_valid_simple_assignment_target};
use super::util::{parse_numeric_literal, split_regex_literal, string_literal_value, unescape};
use crate::runner::ds::operations::type_conversion::number_to_string;

#[derive(Parser)]
#[grammar = "parser/js_grammar.pest"] // relative to src
pub struct JsParser;

/// Syntax error with the position it was detected at.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("SyntaxError: {message} ({file}:{line}:{column})")]
pub struct CompileError {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl CompileError {
    fn from_pest(e: Error<Rule>, file: &str) -> Self {
        let (line, column) = match e.line_col {
            LineColLocation::Pos(p) => p,
            LineColLocation::Span(p, _) => p,
        };
        CompileError {
            file: file.to_string(),
            line,
            column,
            message: e.variant.message().to_string(),
        }
    }
}

type BuildResult<T> = Result<T, Error<Rule>>;

lazy_static! {
    static ref PRATT_PARSER: PrattParser<Rule> = PrattParser::new()
        .op(Op::infix(Rule::op_coalesce, Assoc::Left))
        .op(Op::infix(Rule::op_or, Assoc::Left))
        .op(Op::infix(Rule::op_and, Assoc::Left))
        .op(Op::infix(Rule::op_bit_or, Assoc::Left))
        .op(Op::infix(Rule::op_bit_xor, Assoc::Left))
        .op(Op::infix(Rule::op_bit_and, Assoc::Left))
        .op(Op::infix(Rule::op_eq, Assoc::Left)
            | Op::infix(Rule::op_ne, Assoc::Left)
            | Op::infix(Rule::op_strict_eq, Assoc::Left)
            | Op::infix(Rule::op_strict_ne, Assoc::Left))
        .op(Op::infix(Rule::op_lt, Assoc::Left)
            | Op::infix(Rule::op_gt, Assoc::Left)
            | Op::infix(Rule::op_le, Assoc::Left)
            | Op::infix(Rule::op_ge, Assoc::Left)
            | Op::infix(Rule::op_instanceof, Assoc::Left)
            | Op::infix(Rule::op_in, Assoc::Left))
        .op(Op::infix(Rule::op_shl, Assoc::Left)
            | Op::infix(Rule::op_shr, Assoc::Left)
            | Op::infix(Rule::op_ushr, Assoc::Left))
        .op(Op::infix(Rule::op_add, Assoc::Left) | Op::infix(Rule::op_sub, Assoc::Left))
        .op(Op::infix(Rule::op_mul, Assoc::Left)
            | Op::infix(Rule::op_div, Assoc::Left)
            | Op::infix(Rule::op_mod, Assoc::Left))
        .op(Op::infix(Rule::op_exp, Assoc::Right));
}

impl JsParser {
    pub fn parse_to_ast_from_str(script: &str) -> Result<ProgramData, CompileError> {
        Self::parse_to_ast_with_name(script, "<anonymous>")
    }

    pub fn parse_to_ast_with_name(script: &str, name: &str) -> Result<ProgramData, CompileError> {
        let pairs =
            JsParser::parse(Rule::script, script).map_err(|e| CompileError::from_pest(e, name))?;
        build_ast_from_script(pairs, name).map_err(|e| CompileError::from_pest(e, name))
    }
}

fn get_meta(pair: &Pair<Rule>) -> Meta {
    let (line, column) = pair.as_span().start_pos().line_col();
    Meta { line, column }
}

fn get_unexpected_error(id: i32, pair: &Pair<Rule>) -> Error<Rule> {
    let message = format!("Unexpected state reached [{:?}] - {}", pair.as_rule(), id);
    Error::new_from_span(ErrorVariant::CustomError { message }, pair.as_span())
}

fn get_custom_error(message: String, pair: &Pair<Rule>) -> Error<Rule> {
    Error::new_from_span(ErrorVariant::CustomError { message }, pair.as_span())
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::k_async
            | Rule::k_await
            | Rule::k_break
            | Rule::k_case
            | Rule::k_catch
            | Rule::k_const
            | Rule::k_continue
            | Rule::k_default
            | Rule::k_delete
            | Rule::k_do
            | Rule::k_else
            | Rule::k_export
            | Rule::k_finally
            | Rule::k_for
            | Rule::k_function
            | Rule::k_if
            | Rule::k_import
            | Rule::k_in
            | Rule::k_let
            | Rule::k_new
            | Rule::k_return
            | Rule::k_switch
            | Rule::k_throw
            | Rule::k_try
            | Rule::k_typeof
            | Rule::k_var
            | Rule::k_void
            | Rule::k_while
            | Rule::k_of
            | Rule::k_from
            | Rule::k_as
    )
}

/// Inner pairs without the keyword tokens.
fn significant_inner(pair: Pair<Rule>) -> Vec<Pair<Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule())).collect()
}

fn next_pair<'i>(
    iter: &mut impl Iterator<Item = Pair<'i, Rule>>,
    parent: &Pair<'i, Rule>,
    id: i32,
) -> BuildResult<Pair<'i, Rule>> {
    iter.next().ok_or_else(|| get_unexpected_error(id, parent))
}

fn build_ast_from_script(pairs: Pairs<Rule>, name: &str) -> BuildResult<ProgramData> {
    let mut imports = vec![];
    let mut body = vec![];
    let mut is_module = false;
    for pair in pairs {
        if pair.as_rule() != Rule::script {
            continue;
        }
        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::EOI {
                continue;
            }
            let s = build_ast_from_statement(inner)?;
            match s {
                StatementType::ImportDeclaration(_) => {
                    is_module = true;
                    imports.push(s);
                }
                StatementType::ExportDeclaration(_) => {
                    is_module = true;
                    body.push(s);
                }
                _ => body.push(s),
            }
        }
    }
    // Imports are evaluated before anything else in the module.
    imports.append(&mut body);
    Ok(ProgramData {
        source_name: name.to_string(),
        body: imports,
        is_module,
    })
}

fn build_ast_from_statement_list(pairs: Pairs<Rule>) -> BuildResult<Vec<StatementType>> {
    let mut s = vec![];
    for pair in pairs {
        if is_keyword(pair.as_rule()) {
            continue;
        }
        s.push(build_ast_from_statement(pair)?);
    }
    Ok(s)
}

fn build_ast_from_statement(pair: Pair<Rule>) -> BuildResult<StatementType> {
    let meta = get_meta(&pair);
    Ok(match pair.as_rule() {
        Rule::block_statement | Rule::function_body => {
            StatementType::BlockStatement(build_ast_from_statement_list(pair.into_inner())?)
        }
        Rule::empty_statement => StatementType::EmptyStatement,
        Rule::expression_statement => {
            let inner = next_pair(&mut pair.clone().into_inner(), &pair, 1)?;
            StatementType::ExpressionStatement {
                meta,
                expression: build_ast_from_expression(inner)?,
            }
        }
        Rule::variable_statement => {
            StatementType::VariableDeclaration(build_ast_from_variable_declaration(pair)?)
        }
        Rule::function_declaration => {
            StatementType::FunctionDeclaration(Arc::new(build_ast_from_function(pair, false)?))
        }
        Rule::if_statement => {
            let mut inner = significant_inner(pair.clone()).into_iter();
            let test = build_ast_from_expression(next_pair(&mut inner, &pair, 2)?)?;
            let consequent = Box::new(build_ast_from_statement(next_pair(&mut inner, &pair, 3)?)?);
            let alternate = match inner.next() {
                Some(p) => Some(Box::new(build_ast_from_statement(p)?)),
                None => None,
            };
            StatementType::IfStatement {
                test,
                consequent,
                alternate,
            }
        }
        Rule::for_in_of_statement => build_ast_from_for_in_of(pair)?,
        Rule::for_statement => build_ast_from_for(pair)?,
        Rule::while_statement => {
            let mut inner = significant_inner(pair.clone()).into_iter();
            let test = build_ast_from_expression(next_pair(&mut inner, &pair, 4)?)?;
            let body = Box::new(build_ast_from_statement(next_pair(&mut inner, &pair, 5)?)?);
            StatementType::WhileStatement { test, body }
        }
        Rule::do_while_statement => {
            let mut inner = significant_inner(pair.clone()).into_iter();
            let body = Box::new(build_ast_from_statement(next_pair(&mut inner, &pair, 6)?)?);
            let test = build_ast_from_expression(next_pair(&mut inner, &pair, 7)?)?;
            StatementType::DoWhileStatement { body, test }
        }
        Rule::continue_statement => StatementType::ContinueStatement(
            significant_inner(pair).first().map(|p| p.as_str().to_string()),
        ),
        Rule::break_statement => StatementType::BreakStatement(
            significant_inner(pair).first().map(|p| p.as_str().to_string()),
        ),
        Rule::return_statement => match significant_inner(pair).into_iter().next() {
            Some(p) => StatementType::ReturnStatement(Some(build_ast_from_expression(p)?)),
            None => StatementType::ReturnStatement(None),
        },
        Rule::throw_statement => {
            let mut inner = significant_inner(pair.clone()).into_iter();
            StatementType::ThrowStatement {
                meta,
                argument: build_ast_from_expression(next_pair(&mut inner, &pair, 8)?)?,
            }
        }
        Rule::switch_statement => build_ast_from_switch(pair)?,
        Rule::try_statement => build_ast_from_try(pair)?,
        Rule::labelled_statement => {
            let mut inner = pair.clone().into_inner();
            let label = next_pair(&mut inner, &pair, 9)?.as_str().to_string();
            let body = Box::new(build_ast_from_statement(next_pair(&mut inner, &pair, 10)?)?);
            StatementType::LabeledStatement { label, body }
        }
        Rule::import_declaration => StatementType::ImportDeclaration(build_ast_from_import(pair)?),
        Rule::export_declaration => StatementType::ExportDeclaration(build_ast_from_export(pair)?),
        _ => return Err(get_unexpected_error(11, &pair)),
    })
}

fn build_ast_from_variable_kind(pair: Pair<Rule>) -> BuildResult<VariableDeclarationKind> {
    let kw = next_pair(&mut pair.clone().into_inner(), &pair, 12)?;
    Ok(match kw.as_rule() {
        Rule::k_var => VariableDeclarationKind::Var,
        Rule::k_let => VariableDeclarationKind::Let,
        Rule::k_const => VariableDeclarationKind::Const,
        _ => return Err(get_unexpected_error(13, &kw)),
    })
}

/// Builds from `variable_statement` or a declaring `for_init`.
fn build_ast_from_variable_declaration(pair: Pair<Rule>) -> BuildResult<VariableDeclarationData> {
    let meta = get_meta(&pair);
    let mut inner = pair.clone().into_inner();
    let kind = build_ast_from_variable_kind(next_pair(&mut inner, &pair, 14)?)?;
    let mut declarations = vec![];
    for declarator in inner {
        let mut parts = declarator.clone().into_inner();
        let id = build_ast_from_binding_target(next_pair(&mut parts, &declarator, 15)?)?;
        let init = match parts.next() {
            Some(p) => Some(build_ast_from_assignment_expression(p)?),
            None => None,
        };
        if init.is_none()
            && (kind == VariableDeclarationKind::Const || !matches!(id, PatternType::Identifier(_)))
        {
            return Err(get_custom_error(
                "Missing initializer in declaration".to_string(),
                &declarator,
            ));
        }
        declarations.push(VariableDeclaratorData { id, init });
    }
    Ok(VariableDeclarationData {
        meta,
        kind,
        declarations,
    })
}

fn build_ast_from_for_in_of(pair: Pair<Rule>) -> BuildResult<StatementType> {
    let mut is_of = false;
    let mut parts = vec![];
    for p in pair.clone().into_inner() {
        match p.as_rule() {
            Rule::k_of => is_of = true,
            Rule::k_in | Rule::k_for => {}
            _ => parts.push(p),
        }
    }
    let mut parts = parts.into_iter();
    let binding = next_pair(&mut parts, &pair, 16)?;
    let right = build_ast_from_expression(next_pair(&mut parts, &pair, 17)?)?;
    let body = Box::new(build_ast_from_statement(next_pair(&mut parts, &pair, 18)?)?);

    let mut binding_parts = binding.clone().into_inner();
    let first = next_pair(&mut binding_parts, &binding, 19)?;
    let left = if first.as_rule() == Rule::variable_kind {
        ForBinding {
            kind: Some(build_ast_from_variable_kind(first)?),
            target: build_ast_from_binding_target(next_pair(&mut binding_parts, &binding, 20)?)?,
        }
    } else {
        let expr = build_ast_from_left_hand_side_expression(first.clone())?;
        ForBinding {
            kind: None,
            target: expression_to_pattern(expr).map_err(|m| get_custom_error(m, &first))?,
        }
    };
    Ok(if is_of {
        StatementType::ForOfStatement { left, right, body }
    } else {
        StatementType::ForInStatement { left, right, body }
    })
}

fn build_ast_from_for(pair: Pair<Rule>) -> BuildResult<StatementType> {
    let mut init = None;
    let mut test = None;
    let mut update = None;
    let mut body = None;
    for p in pair.clone().into_inner() {
        match p.as_rule() {
            Rule::k_for => {}
            Rule::for_init => {
                let first = next_pair(&mut p.clone().into_inner(), &p, 21)?;
                init = Some(if first.as_rule() == Rule::variable_kind {
                    ForInit::VariableDeclaration(build_ast_from_variable_declaration(p)?)
                } else {
                    ForInit::Expression(build_ast_from_expression(first)?)
                });
            }
            Rule::for_test => {
                test = Some(build_ast_from_expression(next_pair(&mut p.clone().into_inner(), &p, 22)?)?)
            }
            Rule::for_update => {
                update = Some(build_ast_from_expression(next_pair(&mut p.clone().into_inner(), &p, 23)?)?)
            }
            _ => body = Some(Box::new(build_ast_from_statement(p)?)),
        }
    }
    let body = body.ok_or_else(|| get_unexpected_error(24, &pair))?;
    Ok(StatementType::ForStatement {
        init,
        test,
        update,
        body,
    })
}

fn build_ast_from_switch(pair: Pair<Rule>) -> BuildResult<StatementType> {
    let mut inner = significant_inner(pair.clone()).into_iter();
    let discriminant = build_ast_from_expression(next_pair(&mut inner, &pair, 25)?)?;
    let mut cases = vec![];
    for case in inner {
        let mut test = None;
        let mut consequent = vec![];
        for p in case.into_inner() {
            match p.as_rule() {
                Rule::k_case | Rule::k_default => {}
                Rule::expression if test.is_none() && consequent.is_empty() => {
                    test = Some(build_ast_from_expression(p)?)
                }
                _ => consequent.push(build_ast_from_statement(p)?),
            }
        }
        cases.push(SwitchCase { test, consequent });
    }
    Ok(StatementType::SwitchStatement {
        discriminant,
        cases,
    })
}

fn build_ast_from_try(pair: Pair<Rule>) -> BuildResult<StatementType> {
    let mut block = vec![];
    let mut handler = None;
    let mut finalizer = None;
    for p in significant_inner(pair) {
        match p.as_rule() {
            Rule::block_statement => block = build_ast_from_statement_list(p.into_inner())?,
            Rule::catch_clause => {
                let mut param = None;
                let mut body = vec![];
                for c in significant_inner(p) {
                    match c.as_rule() {
                        Rule::block_statement => body = build_ast_from_statement_list(c.into_inner())?,
                        _ => param = Some(build_ast_from_binding_target(c)?),
                    }
                }
                handler = Some(CatchClause { param, body });
            }
            Rule::finally_clause => {
                for c in significant_inner(p) {
                    finalizer = Some(build_ast_from_statement_list(c.into_inner())?);
                }
            }
            _ => return Err(get_unexpected_error(26, &p)),
        }
    }
    Ok(StatementType::TryStatement {
        block,
        handler,
        finalizer,
    })
}

fn build_ast_from_import(pair: Pair<Rule>) -> BuildResult<ImportData> {
    let meta = get_meta(&pair);
    let mut data = ImportData {
        meta,
        source: String::new(),
        default: None,
        namespace: None,
        named: vec![],
    };
    for p in significant_inner(pair) {
        match p.as_rule() {
            Rule::string_literal => {
                data.source = string_literal_value(p.as_str()).map_err(|m| get_custom_error(m, &p))?
            }
            Rule::import_clause => {
                for clause in p.into_inner() {
                    match clause.as_rule() {
                        Rule::import_default => data.default = Some(clause.as_str().trim().to_string()),
                        Rule::import_namespace => {
                            for n in significant_inner(clause) {
                                data.namespace = Some(n.as_str().to_string());
                            }
                        }
                        Rule::named_imports => {
                            for spec in clause.into_inner() {
                                let names: Vec<String> = significant_inner(spec)
                                    .iter()
                                    .map(|n| n.as_str().to_string())
                                    .collect();
                                let imported = names.first().cloned().unwrap_or_default();
                                let local = names.get(1).cloned().unwrap_or_else(|| imported.clone());
                                data.named.push((imported, local));
                            }
                        }
                        _ => return Err(get_unexpected_error(27, &clause)),
                    }
                }
            }
            _ => return Err(get_unexpected_error(28, &p)),
        }
    }
    Ok(data)
}

fn build_ast_from_export(pair: Pair<Rule>) -> BuildResult<ExportData> {
    let inner = next_pair(&mut significant_inner(pair.clone()).into_iter(), &pair, 29)?;
    Ok(match inner.as_rule() {
        Rule::export_default => {
            let value = next_pair(&mut significant_inner(inner.clone()).into_iter(), &inner, 30)?;
            ExportData::Default(match value.as_rule() {
                Rule::function_expression => {
                    ExpressionType::FunctionExpression(Arc::new(build_ast_from_function(value, false)?))
                }
                _ => build_ast_from_assignment_expression(value)?,
            })
        }
        Rule::export_all => {
            let mut alias = None;
            let mut source = String::new();
            for p in significant_inner(inner) {
                match p.as_rule() {
                    Rule::property_name_ident => alias = Some(p.as_str().to_string()),
                    _ => source = string_literal_value(p.as_str()).map_err(|m| get_custom_error(m, &p))?,
                }
            }
            ExportData::All { source, alias }
        }
        Rule::export_named => {
            let mut specifiers = vec![];
            let mut source = None;
            for p in significant_inner(inner) {
                match p.as_rule() {
                    Rule::export_specifier => {
                        let names: Vec<String> = significant_inner(p)
                            .iter()
                            .map(|n| n.as_str().to_string())
                            .collect();
                        let local = names.first().cloned().unwrap_or_default();
                        let exported = names.get(1).cloned().unwrap_or_else(|| local.clone());
                        specifiers.push((local, exported));
                    }
                    _ => {
                        source =
                            Some(string_literal_value(p.as_str()).map_err(|m| get_custom_error(m, &p))?)
                    }
                }
            }
            ExportData::Named { specifiers, source }
        }
        _ => ExportData::Declaration(Box::new(build_ast_from_statement(inner)?)),
    })
}

// ── Patterns ─────────────────────────────────────────────────────────

fn build_ast_from_binding_target(pair: Pair<Rule>) -> BuildResult<PatternType> {
    Ok(match pair.as_rule() {
        Rule::identifier => PatternType::Identifier(pair.as_str().to_string()),
        Rule::object_binding_pattern => {
            let mut properties = vec![];
            let mut rest = None;
            for p in pair.into_inner() {
                match p.as_rule() {
                    Rule::binding_property_full => {
                        let mut parts = p.clone().into_inner();
                        let key = build_ast_from_property_key(next_pair(&mut parts, &p, 31)?)?;
                        let value = build_ast_from_binding_element(next_pair(&mut parts, &p, 32)?)?;
                        properties.push(ObjectPatternProperty { key, value });
                    }
                    Rule::binding_property_short => {
                        let mut parts = p.clone().into_inner();
                        let name = next_pair(&mut parts, &p, 33)?.as_str().to_string();
                        let mut value = PatternType::Identifier(name.clone());
                        if let Some(default) = parts.next() {
                            value = PatternType::AssignmentPattern {
                                left: Box::new(value),
                                right: Box::new(build_ast_from_assignment_expression(default)?),
                            };
                        }
                        properties.push(ObjectPatternProperty {
                            key: PropertyKey::Static(name),
                            value,
                        });
                    }
                    Rule::binding_rest_property => {
                        let name = next_pair(&mut p.clone().into_inner(), &p, 34)?;
                        rest = Some(Box::new(PatternType::Identifier(name.as_str().to_string())));
                    }
                    _ => return Err(get_unexpected_error(35, &p)),
                }
            }
            PatternType::ObjectPattern { properties, rest }
        }
        Rule::array_binding_pattern => {
            let mut elements = vec![];
            let mut rest = None;
            for p in pair.into_inner() {
                match p.as_rule() {
                    Rule::binding_slot => match p.into_inner().next() {
                        Some(e) => elements.push(Some(build_ast_from_binding_element(e)?)),
                        None => elements.push(None),
                    },
                    Rule::binding_rest_element => {
                        let target = next_pair(&mut p.clone().into_inner(), &p, 36)?;
                        rest = Some(Box::new(build_ast_from_binding_target(target)?));
                    }
                    _ => return Err(get_unexpected_error(37, &p)),
                }
            }
            if let Some(None) = elements.last() {
                elements.pop();
            }
            PatternType::ArrayPattern { elements, rest }
        }
        _ => return Err(get_unexpected_error(38, &pair)),
    })
}

fn build_ast_from_binding_element(pair: Pair<Rule>) -> BuildResult<PatternType> {
    let mut parts = pair.clone().into_inner();
    let target = build_ast_from_binding_target(next_pair(&mut parts, &pair, 39)?)?;
    Ok(match parts.next() {
        Some(default) => PatternType::AssignmentPattern {
            left: Box::new(target),
            right: Box::new(build_ast_from_assignment_expression(default)?),
        },
        None => target,
    })
}

fn build_ast_from_formal_parameters(
    pair: Pair<Rule>,
) -> BuildResult<(Vec<PatternType>, Option<PatternType>)> {
    let mut params = vec![];
    let mut rest = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::formal_parameter => {
                let element = next_pair(&mut p.clone().into_inner(), &p, 40)?;
                params.push(build_ast_from_binding_element(element)?);
            }
            Rule::rest_parameter => {
                let target = next_pair(&mut p.clone().into_inner(), &p, 41)?;
                rest = Some(build_ast_from_binding_target(target)?);
            }
            _ => return Err(get_unexpected_error(42, &p)),
        }
    }
    Ok((params, rest))
}

// ── Functions ────────────────────────────────────────────────────────

/// Builds from `function_declaration`, `function_expression` or `arrow_function`.
fn build_ast_from_function(pair: Pair<Rule>, is_arrow: bool) -> BuildResult<FunctionData> {
    let meta = get_meta(&pair);
    let mut name = None;
    let mut is_async = false;
    let mut params = vec![];
    let mut rest = None;
    let mut body = None;
    for p in pair.clone().into_inner() {
        match p.as_rule() {
            Rule::k_async => is_async = true,
            Rule::k_function => {}
            Rule::identifier => name = Some(p.as_str().to_string()),
            Rule::formal_parameters => {
                let (ps, r) = build_ast_from_formal_parameters(p)?;
                params = ps;
                rest = r;
            }
            Rule::arrow_parameters => {
                let inner = next_pair(&mut p.clone().into_inner(), &p, 43)?;
                if inner.as_rule() == Rule::identifier {
                    params = vec![PatternType::Identifier(inner.as_str().to_string())];
                } else {
                    let (ps, r) = build_ast_from_formal_parameters(inner)?;
                    params = ps;
                    rest = r;
                }
            }
            Rule::function_body => {
                body = Some(FunctionBody::Block(build_ast_from_statement_list(p.into_inner())?))
            }
            Rule::assignment_expression => {
                body = Some(FunctionBody::Expression(build_ast_from_assignment_expression(p)?))
            }
            _ => return Err(get_unexpected_error(44, &p)),
        }
    }
    let body = body.ok_or_else(|| get_unexpected_error(45, &pair))?;
    Ok(FunctionData {
        meta,
        name,
        params,
        rest,
        body,
        is_arrow,
        is_async,
    })
}

// ── Expressions ──────────────────────────────────────────────────────

fn build_ast_from_expression(pair: Pair<Rule>) -> BuildResult<ExpressionType> {
    let meta = get_meta(&pair);
    let mut expressions = vec![];
    for inner in pair.into_inner() {
        expressions.push(build_ast_from_assignment_expression(inner)?);
    }
    if expressions.len() == 1 {
        if let Some(e) = expressions.pop() {
            return Ok(e);
        }
    }
    Ok(ExpressionType::SequenceExpression { meta, expressions })
}

fn build_ast_from_assignment_expression(pair: Pair<Rule>) -> BuildResult<ExpressionType> {
    let meta = get_meta(&pair);
    let mut inner = pair.clone().into_inner();
    let first = next_pair(&mut inner, &pair, 46)?;
    if first.as_rule() == Rule::arrow_function {
        return Ok(ExpressionType::FunctionExpression(Arc::new(
            build_ast_from_function(first, true)?,
        )));
    }
    let target_pair = first.clone();
    let left = build_ast_from_conditional_expression(first)?;
    let operator_pair = match inner.next() {
        Some(op) => op,
        None => return Ok(left),
    };
    let operator = match operator_pair.as_str() {
        "=" => AssignmentOperator::Equals,
        "+=" => AssignmentOperator::Binary(BinaryOperator::Add),
        "-=" => AssignmentOperator::Binary(BinaryOperator::Subtract),
        "*=" => AssignmentOperator::Binary(BinaryOperator::Multiply),
        "/=" => AssignmentOperator::Binary(BinaryOperator::Divide),
        "%=" => AssignmentOperator::Binary(BinaryOperator::Modulo),
        "**=" => AssignmentOperator::Binary(BinaryOperator::Exponent),
        "<<=" => AssignmentOperator::Binary(BinaryOperator::BitwiseLeftShift),
        ">>=" => AssignmentOperator::Binary(BinaryOperator::BitwiseRightShift),
        ">>>=" => AssignmentOperator::Binary(BinaryOperator::BitwiseUnsignedRightShift),
        "&=" => AssignmentOperator::Binary(BinaryOperator::BitwiseAnd),
        "|=" => AssignmentOperator::Binary(BinaryOperator::BitwiseOr),
        "^=" => AssignmentOperator::Binary(BinaryOperator::BitwiseXor),
        "&&=" => AssignmentOperator::Logical(LogicalOperator::And),
        "||=" => AssignmentOperator::Logical(LogicalOperator::Or),
        "??=" => AssignmentOperator::Logical(LogicalOperator::Coalesce),
        _ => return Err(get_unexpected_error(47, &operator_pair)),
    };
    if operator != AssignmentOperator::Equals && !is_valid_simple_assignment_target(&left) {
        return Err(get_custom_error(
            "Invalid left-hand side in assignment".to_string(),
            &target_pair,
        ));
    }
    let left = expression_to_pattern(left).map_err(|m| get_custom_error(m, &target_pair))?;
    let right = Box::new(build_ast_from_assignment_expression(next_pair(&mut inner, &pair, 48)?)?);
    Ok(ExpressionType::AssignmentExpression {
        meta,
        operator,
        left,
        right,
    })
}

fn build_ast_from_conditional_expression(pair: Pair<Rule>) -> BuildResult<ExpressionType> {
    let meta = get_meta(&pair);
    let mut inner = pair.clone().into_inner();
    let test = build_ast_from_binary_expression(next_pair(&mut inner, &pair, 49)?)?;
    match inner.next() {
        None => Ok(test),
        Some(consequent) => {
            let consequent = Box::new(build_ast_from_assignment_expression(consequent)?);
            let alternate = Box::new(build_ast_from_assignment_expression(next_pair(
                &mut inner, &pair, 50,
            )?)?);
            Ok(ExpressionType::ConditionalExpression {
                meta,
                test: Box::new(test),
                consequent,
                alternate,
            })
        }
    }
}

fn build_ast_from_binary_expression(pair: Pair<Rule>) -> BuildResult<ExpressionType> {
    let mut inner = pair.clone().into_inner();
    if inner.clone().count() == 1 {
        return build_ast_from_unary_expression(next_pair(&mut inner, &pair, 51)?);
    }
    PRATT_PARSER
        .map_primary(build_ast_from_unary_expression)
        .map_infix(|lhs, op, rhs| {
            let meta = get_meta(&op);
            let left = Box::new(lhs?);
            let right = Box::new(rhs?);
            let operator = match op.as_rule() {
                Rule::op_coalesce | Rule::op_or | Rule::op_and => {
                    let operator = match op.as_rule() {
                        Rule::op_coalesce => LogicalOperator::Coalesce,
                        Rule::op_or => LogicalOperator::Or,
                        _ => LogicalOperator::And,
                    };
                    return Ok(ExpressionType::LogicalExpression {
                        meta,
                        operator,
                        left,
                        right,
                    });
                }
                Rule::op_bit_or => BinaryOperator::BitwiseOr,
                Rule::op_bit_xor => BinaryOperator::BitwiseXor,
                Rule::op_bit_and => BinaryOperator::BitwiseAnd,
                Rule::op_strict_eq => BinaryOperator::StrictlyEqual,
                Rule::op_strict_ne => BinaryOperator::StrictlyUnequal,
                Rule::op_eq => BinaryOperator::Equal,
                Rule::op_ne => BinaryOperator::NotEqual,
                Rule::op_le => BinaryOperator::LessThanEqual,
                Rule::op_ge => BinaryOperator::GreaterThanEqual,
                Rule::op_lt => BinaryOperator::LessThan,
                Rule::op_gt => BinaryOperator::GreaterThan,
                Rule::op_shl => BinaryOperator::BitwiseLeftShift,
                Rule::op_shr => BinaryOperator::BitwiseRightShift,
                Rule::op_ushr => BinaryOperator::BitwiseUnsignedRightShift,
                Rule::op_instanceof => BinaryOperator::InstanceOf,
                Rule::op_in => BinaryOperator::In,
                Rule::op_exp => BinaryOperator::Exponent,
                Rule::op_add => BinaryOperator::Add,
                Rule::op_sub => BinaryOperator::Subtract,
                Rule::op_mul => BinaryOperator::Multiply,
                Rule::op_div => BinaryOperator::Divide,
                Rule::op_mod => BinaryOperator::Modulo,
                _ => return Err(get_unexpected_error(52, &op)),
            };
            Ok(ExpressionType::BinaryExpression {
                meta,
                operator,
                left,
                right,
            })
        })
        .parse(inner)
}

fn build_ast_from_unary_expression(pair: Pair<Rule>) -> BuildResult<ExpressionType> {
    let mut prefixes = vec![];
    let mut operand = None;
    for p in pair.clone().into_inner() {
        match p.as_rule() {
            Rule::prefix_operator => prefixes.push(p),
            _ => operand = Some(build_ast_from_postfix_expression(p)?),
        }
    }
    let mut expr = operand.ok_or_else(|| get_unexpected_error(53, &pair))?;
    for prefix in prefixes.into_iter().rev() {
        let meta = get_meta(&prefix);
        let op = next_pair(&mut prefix.clone().into_inner(), &prefix, 54)?;
        let argument = Box::new(expr);
        let operator = match op.as_rule() {
            Rule::k_typeof => UnaryOperator::TypeOf,
            Rule::k_void => UnaryOperator::Void,
            Rule::k_delete => UnaryOperator::Delete,
            Rule::op_not => UnaryOperator::LogicalNot,
            Rule::op_bit_not => UnaryOperator::BitwiseNot,
            Rule::op_negate => UnaryOperator::Minus,
            Rule::op_plus => UnaryOperator::Plus,
            Rule::k_await => {
                expr = ExpressionType::AwaitExpression { meta, argument };
                continue;
            }
            Rule::op_increment | Rule::op_decrement => {
                if !is_valid_simple_assignment_target(&argument) {
                    return Err(get_custom_error(
                        "Invalid left-hand side expression in prefix operation".to_string(),
                        &prefix,
                    ));
                }
                expr = ExpressionType::UpdateExpression {
                    meta,
                    operator: if op.as_rule() == Rule::op_increment {
                        UpdateOperator::Increment
                    } else {
                        UpdateOperator::Decrement
                    },
                    argument,
                    prefix: true,
                };
                continue;
            }
            _ => return Err(get_unexpected_error(55, &op)),
        };
        expr = ExpressionType::UnaryExpression {
            meta,
            operator,
            argument,
        };
    }
    Ok(expr)
}

fn build_ast_from_postfix_expression(pair: Pair<Rule>) -> BuildResult<ExpressionType> {
    let meta = get_meta(&pair);
    let mut inner = pair.clone().into_inner();
    let lhs_pair = next_pair(&mut inner, &pair, 56)?;
    let expr = build_ast_from_left_hand_side_expression(lhs_pair.clone())?;
    match inner.next() {
        None => Ok(expr),
        Some(op) => {
            if !is_valid_simple_assignment_target(&expr) {
                return Err(get_custom_error(
                    "Invalid left-hand side expression in postfix operation".to_string(),
                    &lhs_pair,
                ));
            }
            Ok(ExpressionType::UpdateExpression {
                meta,
                operator: if op.as_str() == "++" {
                    UpdateOperator::Increment
                } else {
                    UpdateOperator::Decrement
                },
                argument: Box::new(expr),
                prefix: false,
            })
        }
    }
}

fn build_ast_from_left_hand_side_expression(pair: Pair<Rule>) -> BuildResult<ExpressionType> {
    let meta = get_meta(&pair);
    let mut inner = pair.clone().into_inner();
    let head = next_pair(&mut inner, &pair, 57)?;
    let mut expr = match head.as_rule() {
        Rule::new_expression => build_ast_from_new_expression(head)?,
        _ => build_ast_from_primary_expression(head)?,
    };
    let mut in_chain = false;
    for accessor in inner {
        let meta = get_meta(&accessor);
        expr = match accessor.as_rule() {
            Rule::dot_access | Rule::optional_dot => {
                let optional = accessor.as_rule() == Rule::optional_dot;
                in_chain |= optional;
                let name = next_pair(&mut accessor.clone().into_inner(), &accessor, 58)?;
                ExpressionType::MemberExpression {
                    meta,
                    object: Box::new(expr),
                    property: MemberProperty::Static(name.as_str().to_string()),
                    optional,
                }
            }
            Rule::computed_access | Rule::optional_computed => {
                let optional = accessor.as_rule() == Rule::optional_computed;
                in_chain |= optional;
                let index = next_pair(&mut accessor.clone().into_inner(), &accessor, 59)?;
                ExpressionType::MemberExpression {
                    meta,
                    object: Box::new(expr),
                    property: MemberProperty::Computed(Box::new(build_ast_from_expression(index)?)),
                    optional,
                }
            }
            Rule::arguments | Rule::optional_call => {
                let optional = accessor.as_rule() == Rule::optional_call;
                in_chain |= optional;
                let args = if optional {
                    next_pair(&mut accessor.clone().into_inner(), &accessor, 60)?
                } else {
                    accessor
                };
                ExpressionType::CallExpression {
                    meta,
                    callee: Box::new(expr),
                    arguments: build_ast_from_arguments(args)?,
                    optional,
                }
            }
            _ => return Err(get_unexpected_error(61, &accessor)),
        };
    }
    Ok(if in_chain {
        ExpressionType::ChainExpression {
            meta,
            expression: Box::new(expr),
        }
    } else {
        expr
    })
}

fn build_ast_from_new_expression(pair: Pair<Rule>) -> BuildResult<ExpressionType> {
    let meta = get_meta(&pair);
    let mut callee = None;
    let mut arguments = vec![];
    for p in significant_inner(pair.clone()) {
        match p.as_rule() {
            Rule::new_callee => {
                let mut parts = p.clone().into_inner();
                let head = next_pair(&mut parts, &p, 62)?;
                let mut expr = match head.as_rule() {
                    Rule::new_expression => build_ast_from_new_expression(head)?,
                    _ => build_ast_from_primary_expression(head)?,
                };
                for accessor in parts {
                    let meta = get_meta(&accessor);
                    let prop = next_pair(&mut accessor.clone().into_inner(), &accessor, 63)?;
                    let property = if accessor.as_rule() == Rule::dot_access {
                        MemberProperty::Static(prop.as_str().to_string())
                    } else {
                        MemberProperty::Computed(Box::new(build_ast_from_expression(prop)?))
                    };
                    expr = ExpressionType::MemberExpression {
                        meta,
                        object: Box::new(expr),
                        property,
                        optional: false,
                    };
                }
                callee = Some(expr);
            }
            Rule::arguments => arguments = build_ast_from_arguments(p)?,
            _ => return Err(get_unexpected_error(64, &p)),
        }
    }
    Ok(ExpressionType::NewExpression {
        meta,
        callee: Box::new(callee.ok_or_else(|| get_unexpected_error(65, &pair))?),
        arguments,
    })
}

fn build_ast_from_arguments(pair: Pair<Rule>) -> BuildResult<Vec<ExpressionOrSpreadElement>> {
    let mut args = vec![];
    for p in pair.into_inner() {
        args.push(build_ast_from_expression_or_spread(p)?);
    }
    Ok(args)
}

fn build_ast_from_expression_or_spread(pair: Pair<Rule>) -> BuildResult<ExpressionOrSpreadElement> {
    Ok(match pair.as_rule() {
        Rule::spread_element => {
            let inner = next_pair(&mut pair.clone().into_inner(), &pair, 66)?;
            ExpressionOrSpreadElement::SpreadElement(build_ast_from_assignment_expression(inner)?)
        }
        _ => ExpressionOrSpreadElement::Expression(build_ast_from_assignment_expression(pair)?),
    })
}

fn build_ast_from_property_key(pair: Pair<Rule>) -> BuildResult<PropertyKey> {
    let inner = next_pair(&mut pair.clone().into_inner(), &pair, 67)?;
    Ok(match inner.as_rule() {
        Rule::property_name_ident => PropertyKey::Static(inner.as_str().to_string()),
        Rule::string_literal => PropertyKey::Static(
            string_literal_value(inner.as_str()).map_err(|m| get_custom_error(m, &inner))?,
        ),
        Rule::numeric_literal => {
            let n = parse_numeric_literal(inner.as_str())
                .ok_or_else(|| get_custom_error("Invalid number".to_string(), &inner))?;
            PropertyKey::Static(number_to_string(n))
        }
        Rule::computed_key => {
            let e = next_pair(&mut inner.clone().into_inner(), &inner, 68)?;
            PropertyKey::Computed(Box::new(build_ast_from_assignment_expression(e)?))
        }
        _ => return Err(get_unexpected_error(69, &inner)),
    })
}

fn build_ast_from_primary_expression(pair: Pair<Rule>) -> BuildResult<ExpressionType> {
    let meta = get_meta(&pair);
    Ok(match pair.as_rule() {
        Rule::k_this => ExpressionType::ThisExpression { meta },
        Rule::identifier => ExpressionType::Identifier {
            meta,
            name: pair.as_str().to_string(),
        },
        Rule::null_literal => ExpressionType::Literal(LiteralData {
            meta,
            value: LiteralType::NullLiteral,
        }),
        Rule::boolean_literal => ExpressionType::Literal(LiteralData {
            meta,
            value: LiteralType::BooleanLiteral(pair.as_str() == "true"),
        }),
        Rule::numeric_literal => {
            let n = parse_numeric_literal(pair.as_str())
                .ok_or_else(|| get_custom_error("Invalid number".to_string(), &pair))?;
            ExpressionType::Literal(LiteralData {
                meta,
                value: LiteralType::NumberLiteral(n),
            })
        }
        Rule::string_literal => ExpressionType::Literal(LiteralData {
            meta,
            value: LiteralType::StringLiteral(
                string_literal_value(pair.as_str()).map_err(|m| get_custom_error(m, &pair))?,
            ),
        }),
        Rule::regex_literal => {
            let (pattern, flags) = split_regex_literal(pair.as_str());
            ExpressionType::RegExpLiteral {
                meta,
                pattern,
                flags,
            }
        }
        Rule::template_literal => {
            let mut quasis = vec![];
            let mut expressions = vec![];
            let mut current = String::new();
            for p in pair.into_inner() {
                match p.as_rule() {
                    Rule::template_chars => {
                        current.push_str(&unescape(p.as_str()).map_err(|m| get_custom_error(m, &p))?)
                    }
                    _ => {
                        quasis.push(std::mem::take(&mut current));
                        let e = next_pair(&mut p.clone().into_inner(), &p, 70)?;
                        expressions.push(build_ast_from_expression(e)?);
                    }
                }
            }
            quasis.push(current);
            ExpressionType::TemplateLiteral {
                meta,
                quasis,
                expressions,
            }
        }
        Rule::paren_expression => {
            build_ast_from_expression(next_pair(&mut pair.clone().into_inner(), &pair, 71)?)?
        }
        Rule::function_expression => {
            ExpressionType::FunctionExpression(Arc::new(build_ast_from_function(pair, false)?))
        }
        Rule::array_literal => {
            let mut elements = vec![];
            for slot in pair.into_inner() {
                match slot.into_inner().next() {
                    Some(e) => elements.push(Some(build_ast_from_expression_or_spread(e)?)),
                    None => elements.push(None),
                }
            }
            if let Some(None) = elements.last() {
                elements.pop();
            }
            ExpressionType::ArrayExpression { meta, elements }
        }
        Rule::object_literal => {
            let mut properties = vec![];
            for member in pair.into_inner() {
                properties.push(build_ast_from_object_member(member)?);
            }
            ExpressionType::ObjectExpression { meta, properties }
        }
        _ => return Err(get_unexpected_error(72, &pair)),
    })
}

fn build_ast_from_object_member(pair: Pair<Rule>) -> BuildResult<PropertyData> {
    let meta = get_meta(&pair);
    Ok(match pair.as_rule() {
        Rule::spread_element => {
            let inner = next_pair(&mut pair.clone().into_inner(), &pair, 73)?;
            PropertyData::Spread(build_ast_from_assignment_expression(inner)?)
        }
        Rule::property_assignment => {
            let mut inner = pair.clone().into_inner();
            let key = build_ast_from_property_key(next_pair(&mut inner, &pair, 74)?)?;
            let value = build_ast_from_assignment_expression(next_pair(&mut inner, &pair, 75)?)?;
            PropertyData::Property { key, value }
        }
        Rule::shorthand_property => {
            let mut inner = pair.clone().into_inner();
            let name = next_pair(&mut inner, &pair, 76)?.as_str().to_string();
            let ident = ExpressionType::Identifier {
                meta,
                name: name.clone(),
            };
            let value = match inner.next() {
                // Only meaningful once the literal is reinterpreted as a pattern.
                Some(default) => ExpressionType::AssignmentExpression {
                    meta,
                    operator: AssignmentOperator::Equals,
                    left: PatternType::Identifier(name.clone()),
                    right: Box::new(build_ast_from_assignment_expression(default)?),
                },
                None => ident,
            };
            PropertyData::Property {
                key: PropertyKey::Static(name),
                value,
            }
        }
        Rule::method_definition => {
            let mut is_async = false;
            let mut key = None;
            let mut params = vec![];
            let mut rest = None;
            let mut body = None;
            for p in pair.clone().into_inner() {
                match p.as_rule() {
                    Rule::k_async => is_async = true,
                    Rule::property_key => key = Some(build_ast_from_property_key(p)?),
                    Rule::formal_parameters => {
                        let (ps, r) = build_ast_from_formal_parameters(p)?;
                        params = ps;
                        rest = r;
                    }
                    Rule::function_body => {
                        body = Some(FunctionBody::Block(build_ast_from_statement_list(p.into_inner())?))
                    }
                    _ => return Err(get_unexpected_error(77, &p)),
                }
            }
            let key = key.ok_or_else(|| get_unexpected_error(78, &pair))?;
            let name = match &key {
                PropertyKey::Static(s) => Some(s.clone()),
                PropertyKey::Computed(_) => None,
            };
            let function = FunctionData {
                meta,
                name,
                params,
                rest,
                body: body.ok_or_else(|| get_unexpected_error(79, &pair))?,
                is_arrow: false,
                is_async,
            };
            PropertyData::Property {
                key,
                value: ExpressionType::FunctionExpression(Arc::new(function)),
            }
        }
        _ => return Err(get_unexpected_error(80, &pair)),
    })
}
