//! Tree-walking evaluation of parsed programs.
//!
//! Scripts run either as plain programs in the global scope
//! ([`run_program`]) or as modules ([`run_module`]): a function-like scope
//! providing `exports`, `module` and `require`, where `import`/`export`
//! statements read and write `module.exports`.

pub mod expression;
pub mod function;
pub mod jobs;
pub mod pattern;
pub mod property;
pub mod statement;
pub mod types;

pub use types::{Completion, CompletionType, Reference};

use crate::parser::ast::ProgramData;
use crate::runner::ds::lex_env::Environment;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::EvalContext;

use self::statement::{execute_statements, hoist_declarations};
use self::types::ValueResult;

/// Runs a program in the global scope. Returns the value of the last
/// expression statement.
pub fn run_program(program: &ProgramData, ctx: &mut EvalContext) -> ValueResult {
    hoist_declarations(&program.body, ctx)?;
    let completion = execute_statements(&program.body, ctx)?;
    Ok(completion.get_value())
}

/// Runs a program as a module body with the given bindings (`exports`,
/// `module`, `require`, ...) in scope and `this` set to `this_value`.
pub fn run_module(
    program: &ProgramData,
    ctx: &mut EvalContext,
    bindings: Vec<(&str, JsValue)>,
    this_value: JsValue,
) -> ValueResult {
    let env = Environment::new_child(&ctx.global_env, true);
    for (name, value) in bindings {
        env.declare(name, value, true);
    }
    let saved_lex = std::mem::replace(&mut ctx.lex_env, env.clone());
    let saved_var = std::mem::replace(&mut ctx.var_env, env);
    let saved_this = std::mem::replace(&mut ctx.this_value, this_value);
    let result = hoist_declarations(&program.body, ctx)
        .and_then(|_| execute_statements(&program.body, ctx))
        .map(|c| c.get_value());
    ctx.lex_env = saved_lex;
    ctx.var_env = saved_var;
    ctx.this_value = saved_this;
    result
}
