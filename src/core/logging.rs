//! Parameter-level trace output for executing processes.
//!
//! Start/finish lines are logged by the lifecycle itself; this module renders
//! parameter values at debug level, truncated to a process-wide maximum.
//!
//! The maximum is a display setting of the log output, set once by the
//! binary like the subscriber's filter. It never affects execution results.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::domain::{Parameter, ParameterSet};

/// Default truncation length for logged string values
pub const DEFAULT_MAX_VALUE_LENGTH: usize = 100;

static MAX_VALUE_LENGTH: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_VALUE_LENGTH);

/// Set the truncation length used when logging parameter values
pub fn set_max_value_length(max_len: usize) {
    MAX_VALUE_LENGTH.store(max_len, Ordering::Relaxed);
}

pub fn max_value_length() -> usize {
    MAX_VALUE_LENGTH.load(Ordering::Relaxed)
}

/// Log every parameter of a set at debug level
pub(crate) fn log_parameters(process: &str, direction: &str, parameters: &ParameterSet) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let max_len = max_value_length();
    for parameter in parameters.iter() {
        debug!(
            process = %process,
            "{}.{}",
            direction,
            render_parameter(parameter, max_len)
        );
    }
}

/// `name: type = value`, with the value truncated to `max_len` characters
fn render_parameter(parameter: &Parameter, max_len: usize) -> String {
    let value = parameter
        .value()
        .map(|v| v.summary(max_len))
        .unwrap_or_else(|| "null".to_string());
    format!("{}: {} = {}", parameter.name(), parameter.declared_type(), value)
}
