//! The script VM: values, the evaluator, the super-global plugin scope and
//! the standard library.

pub mod ds;
pub mod eval;
pub mod plugin;
pub mod std_lib;

pub use eval::{run_module, run_program};
pub use plugin::types::EvalContext;
