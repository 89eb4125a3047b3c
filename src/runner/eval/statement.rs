//! Statement execution.

use crate::parser::ast::{
    CatchClause, ExportData, ForBinding, ForInit, ImportData, PatternType, StatementType,
    SwitchCase, VariableDeclarationData, VariableDeclarationKind,
};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::lex_env::Environment;
use crate::runner::ds::object::ObjectType;
use crate::runner::ds::operations::test_and_comparison::strict_equals;
use crate::runner::ds::operations::type_conversion::to_boolean;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::error::error_to_value;

use super::expression::{evaluate_expression, evaluate_named};
use super::function::{call_value, create_function};
use super::pattern::{bind_pattern, BindingMode};
use super::property::{get_property, iterate_to_vec, own_keys, put_property};
use super::types::{Completion, CompletionType, EvalResult};

/// Declares `var` names and function declarations of a body before it runs.
pub fn hoist_declarations(statements: &[StatementType], ctx: &mut EvalContext) -> Result<(), JErrorType> {
    let mut names = vec![];
    for stmt in statements {
        collect_var_names(stmt, &mut names);
    }
    for name in names {
        ctx.var_env.declare_var(&name);
    }
    hoist_functions(statements, ctx);
    Ok(())
}

fn hoist_functions(statements: &[StatementType], ctx: &mut EvalContext) {
    for stmt in statements {
        let decl = match stmt {
            StatementType::FunctionDeclaration(f) => f,
            StatementType::ExportDeclaration(ExportData::Declaration(inner)) => match inner.as_ref() {
                StatementType::FunctionDeclaration(f) => f,
                _ => continue,
            },
            _ => continue,
        };
        if let Some(name) = &decl.name {
            let f = create_function(ctx, decl, None);
            ctx.lex_env.declare(name, f, true);
        }
    }
}

fn collect_var_names(stmt: &StatementType, names: &mut Vec<String>) {
    match stmt {
        StatementType::VariableDeclaration(d) if d.kind == VariableDeclarationKind::Var => {
            for declarator in &d.declarations {
                declarator.id.bound_names(names);
            }
        }
        StatementType::BlockStatement(body) => body.iter().for_each(|s| collect_var_names(s, names)),
        StatementType::IfStatement {
            consequent,
            alternate,
            ..
        } => {
            collect_var_names(consequent, names);
            if let Some(a) = alternate {
                collect_var_names(a, names);
            }
        }
        StatementType::ForStatement { init, body, .. } => {
            if let Some(ForInit::VariableDeclaration(d)) = init {
                if d.kind == VariableDeclarationKind::Var {
                    for declarator in &d.declarations {
                        declarator.id.bound_names(names);
                    }
                }
            }
            collect_var_names(body, names);
        }
        StatementType::ForOfStatement { left, body, .. } | StatementType::ForInStatement { left, body, .. } => {
            if left.kind == Some(VariableDeclarationKind::Var) {
                left.target.bound_names(names);
            }
            collect_var_names(body, names);
        }
        StatementType::WhileStatement { body, .. }
        | StatementType::DoWhileStatement { body, .. }
        | StatementType::LabeledStatement { body, .. } => collect_var_names(body, names),
        StatementType::SwitchStatement { cases, .. } => {
            for case in cases {
                case.consequent.iter().for_each(|s| collect_var_names(s, names));
            }
        }
        StatementType::TryStatement {
            block,
            handler,
            finalizer,
        } => {
            block.iter().for_each(|s| collect_var_names(s, names));
            if let Some(h) = handler {
                h.body.iter().for_each(|s| collect_var_names(s, names));
            }
            if let Some(f) = finalizer {
                f.iter().for_each(|s| collect_var_names(s, names));
            }
        }
        StatementType::ExportDeclaration(ExportData::Declaration(inner)) => collect_var_names(inner, names),
        _ => {}
    }
}

/// Runs a statement list, returning the first abrupt completion or the
/// value of the last statement that produced one.
pub fn execute_statements(statements: &[StatementType], ctx: &mut EvalContext) -> EvalResult {
    let mut last: Option<JsValue> = None;
    for stmt in statements {
        let completion = execute_statement(stmt, ctx)?;
        if completion.is_abrupt() {
            return Ok(match last {
                Some(v) => completion.update_empty(v),
                None => completion,
            });
        }
        if completion.value.is_some() {
            last = completion.value;
        }
    }
    Ok(Completion {
        completion_type: CompletionType::Normal,
        value: last,
        target: None,
    })
}

/// Execute a statement and return its completion.
pub fn execute_statement(stmt: &StatementType, ctx: &mut EvalContext) -> EvalResult {
    execute_labelled(stmt, &[], ctx)
}

fn execute_labelled(stmt: &StatementType, labels: &[String], ctx: &mut EvalContext) -> EvalResult {
    match stmt {
        StatementType::EmptyStatement => Ok(Completion::normal()),

        StatementType::ExpressionStatement { expression, .. } => {
            let value = evaluate_expression(expression, ctx)?;
            Ok(Completion::normal_with_value(value))
        }

        StatementType::VariableDeclaration(decl) => {
            execute_variable_declaration(decl, ctx)?;
            Ok(Completion::normal())
        }

        // Hoisted.
        StatementType::FunctionDeclaration(_) => Ok(Completion::normal()),

        StatementType::BlockStatement(body) => in_block_scope(ctx, |ctx| {
            hoist_functions(body, ctx);
            execute_statements(body, ctx)
        }),

        StatementType::IfStatement {
            test,
            consequent,
            alternate,
        } => {
            if to_boolean(&evaluate_expression(test, ctx)?) {
                execute_statement(consequent, ctx)
            } else if let Some(alternate) = alternate {
                execute_statement(alternate, ctx)
            } else {
                Ok(Completion::normal())
            }
        }

        StatementType::WhileStatement { test, body } => {
            while to_boolean(&evaluate_expression(test, ctx)?) {
                let completion = execute_statement(body, ctx)?;
                if let Some(exit) = loop_exit(completion, labels) {
                    return Ok(exit);
                }
            }
            Ok(Completion::normal())
        }

        StatementType::DoWhileStatement { body, test } => {
            loop {
                let completion = execute_statement(body, ctx)?;
                if let Some(exit) = loop_exit(completion, labels) {
                    return Ok(exit);
                }
                if !to_boolean(&evaluate_expression(test, ctx)?) {
                    break;
                }
            }
            Ok(Completion::normal())
        }

        StatementType::ForStatement {
            init,
            test,
            update,
            body,
        } => execute_for_statement(init.as_ref(), test.as_ref(), update.as_ref(), body, labels, ctx),

        StatementType::ForOfStatement { left, right, body } => {
            let iterable = evaluate_expression(right, ctx)?;
            let items = iterate_to_vec(ctx, &iterable)?;
            execute_for_each(left, items, body, labels, ctx)
        }

        StatementType::ForInStatement { left, right, body } => {
            let object = evaluate_expression(right, ctx)?;
            let keys = own_keys(&object).into_iter().map(JsValue::String).collect();
            execute_for_each(left, keys, body, labels, ctx)
        }

        StatementType::SwitchStatement {
            discriminant,
            cases,
        } => {
            let value = evaluate_expression(discriminant, ctx)?;
            let completion = in_block_scope(ctx, |ctx| execute_switch(&value, cases, ctx))?;
            Ok(match completion.completion_type {
                CompletionType::Break if completion.target.is_none() => Completion::normal(),
                _ => completion,
            })
        }

        StatementType::BreakStatement(label) => Ok(Completion::break_completion(label.clone())),

        StatementType::ContinueStatement(label) => Ok(Completion::continue_completion(label.clone())),

        StatementType::ReturnStatement(argument) => {
            let value = match argument {
                Some(arg) => evaluate_expression(arg, ctx)?,
                None => JsValue::Undefined,
            };
            Ok(Completion::return_value(value))
        }

        StatementType::ThrowStatement { argument, .. } => {
            let value = evaluate_expression(argument, ctx)?;
            Err(JErrorType::Thrown(value))
        }

        StatementType::TryStatement {
            block,
            handler,
            finalizer,
        } => execute_try(block, handler.as_ref(), finalizer.as_deref(), ctx),

        StatementType::LabeledStatement { label, body } => {
            let mut nested = labels.to_vec();
            nested.push(label.clone());
            let completion = execute_labelled(body, &nested, ctx)?;
            Ok(match (&completion.completion_type, &completion.target) {
                (CompletionType::Break, Some(t)) if t == label => Completion::normal(),
                _ => completion,
            })
        }

        StatementType::ImportDeclaration(import) => {
            execute_import(import, ctx)?;
            Ok(Completion::normal())
        }

        StatementType::ExportDeclaration(export) => {
            execute_export(export, ctx)?;
            Ok(Completion::normal())
        }
    }
}

fn in_block_scope<F>(ctx: &mut EvalContext, f: F) -> EvalResult
where
    F: FnOnce(&mut EvalContext) -> EvalResult,
{
    let block_env = Environment::new_child(&ctx.lex_env, false);
    let saved = std::mem::replace(&mut ctx.lex_env, block_env);
    let result = f(ctx);
    ctx.lex_env = saved;
    result
}

/// Decides whether a loop body completion ends the loop.
fn loop_exit(completion: Completion, labels: &[String]) -> Option<Completion> {
    let own_target = |target: &Option<String>| match target {
        None => true,
        Some(t) => labels.contains(t),
    };
    match completion.completion_type {
        CompletionType::Normal => None,
        CompletionType::Continue if own_target(&completion.target) => None,
        CompletionType::Break if own_target(&completion.target) => Some(Completion::normal()),
        _ => Some(completion),
    }
}

fn binding_mode(kind: VariableDeclarationKind) -> BindingMode {
    match kind {
        VariableDeclarationKind::Var => BindingMode::Var,
        VariableDeclarationKind::Let => BindingMode::Let,
        VariableDeclarationKind::Const => BindingMode::Const,
    }
}

fn execute_variable_declaration(decl: &VariableDeclarationData, ctx: &mut EvalContext) -> Result<(), JErrorType> {
    let mode = binding_mode(decl.kind);
    for declarator in &decl.declarations {
        let value = match &declarator.init {
            Some(init) => match &declarator.id {
                PatternType::Identifier(name) => evaluate_named(init, ctx, name)?,
                _ => evaluate_expression(init, ctx)?,
            },
            // `var x;` must not reset a hoisted value.
            None if mode == BindingMode::Var => continue,
            None => JsValue::Undefined,
        };
        bind_pattern(ctx, &declarator.id, value, mode)?;
    }
    Ok(())
}

fn execute_for_statement(
    init: Option<&ForInit>,
    test: Option<&crate::parser::ast::ExpressionType>,
    update: Option<&crate::parser::ast::ExpressionType>,
    body: &StatementType,
    labels: &[String],
    ctx: &mut EvalContext,
) -> EvalResult {
    let outer = ctx.lex_env.clone();
    ctx.lex_env = Environment::new_child(&outer, false);
    let result = (|| {
        let mut per_iteration = vec![];
        match init {
            Some(ForInit::VariableDeclaration(d)) => {
                if d.kind != VariableDeclarationKind::Var {
                    for declarator in &d.declarations {
                        declarator.id.bound_names(&mut per_iteration);
                    }
                }
                execute_variable_declaration(d, ctx)?;
            }
            Some(ForInit::Expression(e)) => {
                evaluate_expression(e, ctx)?;
            }
            None => {}
        }
        copy_iteration_env(ctx, &outer, &per_iteration);
        loop {
            if let Some(test) = test {
                if !to_boolean(&evaluate_expression(test, ctx)?) {
                    break;
                }
            }
            let completion = execute_statement(body, ctx)?;
            if let Some(exit) = loop_exit(completion, labels) {
                return Ok(exit);
            }
            copy_iteration_env(ctx, &outer, &per_iteration);
            if let Some(update) = update {
                evaluate_expression(update, ctx)?;
            }
        }
        Ok(Completion::normal())
    })();
    ctx.lex_env = outer;
    result
}

/// Gives each iteration of a `for (let ...)` loop fresh bindings so closures
/// capture the value of their own iteration.
fn copy_iteration_env(ctx: &mut EvalContext, outer: &std::rc::Rc<Environment>, names: &[String]) {
    if names.is_empty() {
        return;
    }
    let next = Environment::new_child(outer, false);
    for name in names {
        let value = ctx.lex_env.get_binding(name).unwrap_or(JsValue::Undefined);
        next.declare(name, value, true);
    }
    ctx.lex_env = next;
}

fn execute_for_each(
    left: &ForBinding,
    items: Vec<JsValue>,
    body: &StatementType,
    labels: &[String],
    ctx: &mut EvalContext,
) -> EvalResult {
    let mode = match left.kind {
        Some(kind) => binding_mode(kind),
        None => BindingMode::Assign,
    };
    for item in items {
        let completion = in_block_scope(ctx, |ctx| {
            bind_pattern(ctx, &left.target, item, mode)?;
            execute_statement(body, ctx)
        })?;
        if let Some(exit) = loop_exit(completion, labels) {
            return Ok(exit);
        }
    }
    Ok(Completion::normal())
}

fn execute_switch(value: &JsValue, cases: &[SwitchCase], ctx: &mut EvalContext) -> EvalResult {
    let mut start = None;
    for (idx, case) in cases.iter().enumerate() {
        if let Some(test) = &case.test {
            let candidate = evaluate_expression(test, ctx)?;
            if strict_equals(value, &candidate) {
                start = Some(idx);
                break;
            }
        }
    }
    let start = match start.or_else(|| cases.iter().position(|c| c.test.is_none())) {
        Some(s) => s,
        None => return Ok(Completion::normal()),
    };
    for case in &cases[start..] {
        hoist_functions(&case.consequent, ctx);
        let completion = execute_statements(&case.consequent, ctx)?;
        if completion.is_abrupt() {
            return Ok(completion);
        }
    }
    Ok(Completion::normal())
}

fn execute_try(
    block: &[StatementType],
    handler: Option<&CatchClause>,
    finalizer: Option<&[StatementType]>,
    ctx: &mut EvalContext,
) -> EvalResult {
    let saved_lex = ctx.lex_env.clone();
    let mut result = in_block_scope(ctx, |ctx| {
        hoist_functions(block, ctx);
        execute_statements(block, ctx)
    });
    let caught = match (&result, handler) {
        (Err(error), Some(handler)) => Some((error.clone(), handler)),
        _ => None,
    };
    if let Some((error, handler)) = caught {
        // A failed call may have left a nested scope active.
        ctx.lex_env = saved_lex.clone();
        let thrown = error_to_value(error);
        result = in_block_scope(ctx, |ctx| {
            if let Some(param) = &handler.param {
                bind_pattern(ctx, param, thrown, BindingMode::Let)?;
            }
            hoist_functions(&handler.body, ctx);
            execute_statements(&handler.body, ctx)
        });
    }
    if let Some(finalizer) = finalizer {
        ctx.lex_env = saved_lex;
        let completion = in_block_scope(ctx, |ctx| execute_statements(finalizer, ctx))?;
        if completion.is_abrupt() {
            return Ok(completion);
        }
    }
    result
}

fn module_exports(ctx: &mut EvalContext) -> Result<JsValue, JErrorType> {
    let module = ctx.get_binding("module")?;
    get_property(ctx, &module, "exports")
}

fn require(ctx: &mut EvalContext, source: &str) -> Result<JsValue, JErrorType> {
    let require = ctx.get_binding("require")?;
    call_value(ctx, &require, JsValue::Undefined, vec![JsValue::str(source)])
}

/// Whether `exports` carries its own `default` key.
fn has_own_default(exports: &JsValue) -> bool {
    match exports {
        JsValue::Object(o) => match &*o.borrow() {
            ObjectType::Ordinary(ord) => ord.properties.contains_key("default"),
            ObjectType::Host(h) => h.has("default"),
            _ => false,
        },
        _ => false,
    }
}

fn execute_import(import: &ImportData, ctx: &mut EvalContext) -> Result<(), JErrorType> {
    let exports = require(ctx, &import.source)?;
    if let Some(local) = &import.default {
        let value = if has_own_default(&exports) {
            get_property(ctx, &exports, "default")?
        } else {
            exports.clone()
        };
        ctx.lex_env.declare(local, value, false);
    }
    if let Some(local) = &import.namespace {
        ctx.lex_env.declare(local, exports.clone(), false);
    }
    for (imported, local) in &import.named {
        let value = get_property(ctx, &exports, imported)?;
        ctx.lex_env.declare(local, value, false);
    }
    Ok(())
}

fn execute_export(export: &ExportData, ctx: &mut EvalContext) -> Result<(), JErrorType> {
    match export {
        ExportData::Default(expr) => {
            let value = evaluate_named(expr, ctx, "default")?;
            let exports = module_exports(ctx)?;
            put_property(ctx, &exports, "default", value)
        }
        ExportData::Declaration(stmt) => {
            execute_statement(stmt, ctx)?;
            let mut names = vec![];
            match stmt.as_ref() {
                StatementType::VariableDeclaration(d) => {
                    for declarator in &d.declarations {
                        declarator.id.bound_names(&mut names);
                    }
                }
                StatementType::FunctionDeclaration(f) => names.extend(f.name.clone()),
                _ => {}
            }
            let exports = module_exports(ctx)?;
            for name in names {
                let value = ctx.get_binding(&name)?;
                put_property(ctx, &exports, &name, value)?;
            }
            Ok(())
        }
        ExportData::Named { specifiers, source } => {
            let from = match source {
                Some(source) => Some(require(ctx, source)?),
                None => None,
            };
            let exports = module_exports(ctx)?;
            for (local, exported) in specifiers {
                let value = match &from {
                    Some(module) => get_property(ctx, module, local)?,
                    None => ctx.get_binding(local)?,
                };
                put_property(ctx, &exports, exported, value)?;
            }
            Ok(())
        }
        ExportData::All { source, alias } => {
            let from = require(ctx, source)?;
            let exports = module_exports(ctx)?;
            match alias {
                Some(alias) => put_property(ctx, &exports, alias, from),
                None => {
                    for key in own_keys(&from) {
                        if key == "default" {
                            continue;
                        }
                        let value = get_property(ctx, &from, &key)?;
                        put_property(ctx, &exports, &key, value)?;
                    }
                    Ok(())
                }
            }
        }
    }
}
