//! Errors raised inside process execution.
//!
//! None of these escape `Process::execute`; they become the `error` text of
//! the failing process.

use std::any::Any;

use thiserror::Error;

use crate::domain::ParameterError;

/// Orchestration-level failures
#[derive(Debug, Error)]
pub enum ProcessError {
    /// A child returned failure; carries the child's own error text
    #[error("Process '{child}' failed: {message}")]
    ChildProcessFailure { child: String, message: String },

    /// The process's own work panicked
    #[error("panicked: {message}")]
    Panicked { message: String },

    /// A connection endpoint does not name an existing parameter
    #[error("Connection references unknown parameter {reference}")]
    UnresolvedConnection { reference: String },

    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

impl ProcessError {
    /// Name of the child responsible for the failure, if any
    pub fn child(&self) -> Option<&str> {
        match self {
            ProcessError::ChildProcessFailure { child, .. } => Some(child),
            _ => None,
        }
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
