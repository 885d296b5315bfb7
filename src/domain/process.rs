//! Process status, execution metadata and serializable process snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::parameter::ParameterSnapshot;

/// Lifecycle status of a process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Constructed, not yet executed
    #[default]
    Pending,

    /// Currently executing
    Running,

    /// Finished successfully
    Completed,

    /// Finished with an error
    Failed,

    /// Reserved for external cancellation; never entered by the engine
    Cancelled,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Pending => "pending",
            ProcessStatus::Running => "running",
            ProcessStatus::Completed => "completed",
            ProcessStatus::Failed => "failed",
            ProcessStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessStatus::Completed | ProcessStatus::Failed | ProcessStatus::Cancelled
        )
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a child is scheduled inside an orchestration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Runs alone, after everything declared before it
    Sequential,

    /// Runs concurrently with contiguous parallel siblings
    Parallel,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::Parallel => "parallel",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a process is a leaf or a composition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessKind {
    Atomic,
    Orchestrated,
}

/// Execution-context descriptor. Metadata only; the engine does not act on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub local_executable: bool,
    pub scalable: bool,
    pub balanceable: bool,
    /// Relative cost estimate in [0, 1]
    pub complexity: f64,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            local_executable: true,
            scalable: false,
            balanceable: false,
            complexity: 0.5,
        }
    }
}

impl ExecutionContext {
    /// Set the complexity, clamped to [0, 1]
    pub fn with_complexity(mut self, complexity: f64) -> Self {
        self.complexity = complexity.clamp(0.0, 1.0);
        self
    }
}

/// Point-in-time view of a process, including its children
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub id: Uuid,
    pub name: String,

    #[serde(rename = "class")]
    pub class_name: String,

    pub kind: ProcessKind,
    pub status: ProcessStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub execution_time_ms: Option<f64>,
    pub error: Option<String>,
    pub input: Vec<ParameterSnapshot>,
    pub output: Vec<ParameterSnapshot>,
    pub context: ExecutionContext,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildSnapshot>,
}

impl ProcessSnapshot {
    /// Look up a child snapshot by instance name
    pub fn child(&self, name: &str) -> Option<&ProcessSnapshot> {
        self.children
            .iter()
            .map(|c| &c.process)
            .find(|p| p.name == name)
    }

    /// Number of processes in this tree, including this one
    pub fn process_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|c| c.process.process_count())
            .sum::<usize>()
    }
}

/// A child entry of an orchestration snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildSnapshot {
    pub process: ProcessSnapshot,
    pub execution_mode: ExecutionMode,
}
