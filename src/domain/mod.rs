//! Domain types for the workflow engine.
//!
//! This module contains the core data structures:
//! - Value: Parameter values and declared types
//! - Parameter: Typed value slots and parameter sets
//! - Process: Status, execution mode, context and snapshots
//! - Events: Lifecycle notifications

pub mod events;
pub mod parameter;
pub mod process;
pub mod value;

// Re-export commonly used types
pub use events::{EventType, LifecycleEvent};
pub use parameter::{Parameter, ParameterError, ParameterPhase, ParameterSet, ParameterSnapshot};
pub use process::{
    ChildSnapshot, ExecutionContext, ExecutionMode, ProcessKind, ProcessSnapshot, ProcessStatus,
};
pub use value::{Value, ValueType};
