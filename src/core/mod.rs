//! Core execution engine.
//!
//! This module contains:
//! - Process: Atomic and orchestrated processes with a shared lifecycle
//! - Orchestration: Composition, execution groups and parameter connections
//! - Notifier: Sink for lifecycle events
//! - Logging: Parameter-level trace output

pub mod error;
pub mod logging;
pub mod notifier;
pub mod orchestration;
pub mod process;

// Re-export commonly used types
pub use error::ProcessError;
pub use notifier::{LifecycleNotifier, NoopNotifier};
pub use orchestration::{
    group_children, ChildHandle, ChildProcess, Composition, Connection, ExecutionGroup,
    OrchestratedProcess, Owner, ParamRef, Side,
};
pub use process::{short_type_name, AtomicProcess, Process, ProcessIdentity};
