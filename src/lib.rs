//! swfme - Simple workflow management engine
//!
//! Hierarchical workflows built from processes with typed input and output
//! parameters. Atomic processes wrap a single computation; orchestrated
//! processes compose children that run sequentially or in parallel groups,
//! with values flowing along declared parameter connections.
//!
//! # Modules
//!
//! - `domain`: Data structures (Value, Parameter, status and events)
//! - `core`: Process lifecycle and orchestration
//! - `monitoring`: Event bus and metrics
//! - `registry`: Create processes by name
//! - `builtin`: Demo processes and pipelines
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run a pipeline
//! swfme run MathPipeline -p a=4 -p b=6 -p factor=10
//!
//! # Describe a process
//! swfme info DataPipeline
//! ```

pub mod builtin;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod monitoring;
pub mod registry;

// Re-export main types at crate root for convenience
pub use core::{
    AtomicProcess, Composition, LifecycleNotifier, NoopNotifier, OrchestratedProcess, Process,
    ProcessError,
};
pub use domain::{
    EventType, ExecutionMode, LifecycleEvent, Parameter, ParameterError, ParameterSet,
    ProcessStatus, Value, ValueType,
};
pub use monitoring::{EventBus, MetricsCollector};
pub use registry::{ProcessRegistry, RegistryError};
