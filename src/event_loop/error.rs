use thiserror::Error;

use crate::host::HostError;
use crate::modules::ModuleError;
use crate::parser::CompileError;
use crate::runner::ds::error::JErrorType;

/// Errors surfaced at the edge between the event loop and its callers.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The loop stopped before the work item could run or finish.
    #[error("runner not started")]
    NotStarted,

    /// A script raised an exception.
    #[error("{name}: {message}")]
    Script { name: String, message: String },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("cannot convert value: {0}")]
    Conversion(String),

    /// A blocking submission from the loop thread itself.
    #[error("run_sync called from the event loop thread")]
    Reentrant,

    #[error("cannot start event loop thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl From<JErrorType> for RuntimeError {
    fn from(e: JErrorType) -> Self {
        match e {
            JErrorType::Thrown(_) => {
                let message = e.get_message();
                match message.split_once(": ") {
                    Some((name, rest)) if name.ends_with("Error") && !name.contains(' ') => {
                        RuntimeError::Script {
                            name: name.to_string(),
                            message: rest.to_string(),
                        }
                    }
                    _ => RuntimeError::Script {
                        name: "Error".to_string(),
                        message,
                    },
                }
            }
            other => RuntimeError::Script {
                name: other.get_name().to_string(),
                message: other.get_message(),
            },
        }
    }
}
