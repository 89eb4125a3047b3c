pub mod error;
pub mod function_object;
pub mod host_object;
pub mod json;
pub mod lex_env;
pub mod object;
pub mod object_property;
pub mod operations;
pub mod promise;
pub mod value;
