//! Processes and their shared execution lifecycle.
//!
//! A [`Process`] is either atomic (an opaque computation supplied through
//! [`AtomicProcess`]) or orchestrated (a composition of child processes
//! supplied through [`OrchestratedProcess`]). Both run through the same
//! lifecycle in [`Process::execute`]:
//!
//! 1. status RUNNING, `started_at`, "started" event
//! 2. validate inputs, lock inputs
//! 3. run the variant-specific work, validate outputs
//! 4. COMPLETED or FAILED with error text, matching event
//! 5. unlock inputs
//!
//! `execute` never returns an error and never unwinds: a panic in step 3 is
//! recorded as a failure like any other error. Callers branch on the boolean
//! result and read `status()` / `error()` for diagnostics.

use std::any::type_name;
use std::panic::AssertUnwindSafe;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{
    EventType, ExecutionContext, LifecycleEvent, ParameterSet, ProcessKind, ProcessSnapshot,
    ProcessStatus,
};

use super::error::{panic_message, ProcessError};
use super::logging::log_parameters;
use super::notifier::LifecycleNotifier;
use super::orchestration::{ChildProcess, ExecutionGroup, OrchestratedProcess, Orchestration};

/// An indivisible unit of work.
///
/// `define_parameters` is called once when the process is constructed;
/// `execute_impl` reads the (locked) inputs and writes the outputs.
#[async_trait]
pub trait AtomicProcess: Send + Sync + 'static {
    fn define_parameters(&self, input: &mut ParameterSet, output: &mut ParameterSet);

    async fn execute_impl(&self, input: &ParameterSet, output: &mut ParameterSet) -> Result<()>;

    /// One-line description used in registry listings
    fn description(&self) -> &str {
        ""
    }

    fn context(&self) -> ExecutionContext {
        ExecutionContext::default()
    }
}

/// Identity of a process as carried on its lifecycle events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub id: Uuid,
    pub name: String,
    pub class_name: String,
}

impl ProcessIdentity {
    fn new(class_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: class_name.to_string(),
            class_name: class_name.to_string(),
        }
    }

    pub(crate) fn event(&self, event_type: EventType, status: ProcessStatus) -> LifecycleEvent {
        LifecycleEvent::new(
            event_type,
            self.id,
            self.name.clone(),
            self.class_name.clone(),
            status,
        )
    }
}

pub(crate) enum Work {
    Atomic(Box<dyn AtomicProcess>),
    Orchestrated(Orchestration),
}

/// A unit of work with typed inputs/outputs and a lifecycle
pub struct Process {
    identity: ProcessIdentity,
    description: String,
    status: ProcessStatus,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    execution_time_ms: Option<f64>,
    error: Option<String>,
    error_detail: Option<String>,
    input: ParameterSet,
    output: ParameterSet,
    context: ExecutionContext,
    work: Work,
}

impl Process {
    /// Wrap an atomic computation. The name defaults to the type's name.
    pub fn atomic<T: AtomicProcess>(work: T) -> Self {
        let mut input = ParameterSet::new();
        let mut output = ParameterSet::new();
        work.define_parameters(&mut input, &mut output);

        Self::from_parts(
            short_type_name::<T>(),
            work.description().to_string(),
            work.context(),
            input,
            output,
            Work::Atomic(Box::new(work)),
        )
    }

    /// Wrap an orchestration. Children are composed on first execution.
    pub fn orchestrated<T: OrchestratedProcess>(definition: T) -> Self {
        let mut input = ParameterSet::new();
        let mut output = ParameterSet::new();
        definition.define_parameters(&mut input, &mut output);

        Self::from_parts(
            short_type_name::<T>(),
            definition.description().to_string(),
            definition.context(),
            input,
            output,
            Work::Orchestrated(Orchestration::new(Box::new(definition))),
        )
    }

    fn from_parts(
        class_name: &str,
        description: String,
        context: ExecutionContext,
        input: ParameterSet,
        output: ParameterSet,
        work: Work,
    ) -> Self {
        Self {
            identity: ProcessIdentity::new(class_name),
            description,
            status: ProcessStatus::Pending,
            started_at: None,
            completed_at: None,
            execution_time_ms: None,
            error: None,
            error_detail: None,
            input,
            output,
            context,
            work,
        }
    }

    /// Set the instance name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.identity.name = name.into();
        self
    }

    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    pub fn id(&self) -> Uuid {
        self.identity.id
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn class_name(&self) -> &str {
        &self.identity.class_name
    }

    pub fn identity(&self) -> &ProcessIdentity {
        &self.identity
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> ProcessKind {
        match self.work {
            Work::Atomic(_) => ProcessKind::Atomic,
            Work::Orchestrated(_) => ProcessKind::Orchestrated,
        }
    }

    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn execution_time_ms(&self) -> Option<f64> {
        self.execution_time_ms
    }

    /// Error message of the last failed execution
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Diagnostic detail (error with its cause chain)
    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    pub fn input(&self) -> &ParameterSet {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut ParameterSet {
        &mut self.input
    }

    pub fn output(&self) -> &ParameterSet {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut ParameterSet {
        &mut self.output
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Children of an orchestration in declaration order (empty for atomic)
    pub fn children(&self) -> &[ChildProcess] {
        match &self.work {
            Work::Orchestrated(orchestration) => orchestration.children(),
            Work::Atomic(_) => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> &mut [ChildProcess] {
        match &mut self.work {
            Work::Orchestrated(orchestration) => orchestration.children_mut(),
            Work::Atomic(_) => &mut [],
        }
    }

    /// Find a direct child by instance name
    pub fn child(&self, name: &str) -> Option<&Process> {
        self.children()
            .iter()
            .map(ChildProcess::process)
            .find(|p| p.name() == name)
    }

    /// Number of declared parameter connections (zero for atomic)
    pub fn connection_count(&self) -> usize {
        match &self.work {
            Work::Orchestrated(orchestration) => orchestration.connections().len(),
            Work::Atomic(_) => 0,
        }
    }

    /// Materialize children and connections of an orchestration.
    ///
    /// Runs the composition routine at most once per instance; returns
    /// whether it ran now. Atomic processes have nothing to compose.
    pub fn compose(&mut self) -> Result<bool> {
        match &mut self.work {
            Work::Orchestrated(orchestration) => orchestration.compose(&self.input, &self.output),
            Work::Atomic(_) => Ok(false),
        }
    }

    /// Execution groups of the composed children (empty for atomic)
    pub fn execution_groups(&self) -> Vec<ExecutionGroup> {
        match &self.work {
            Work::Orchestrated(orchestration) => orchestration.groups(),
            Work::Atomic(_) => Vec::new(),
        }
    }

    /// Execute the process, reporting lifecycle events to `notifier`.
    ///
    /// Returns `true` on success. Never fails otherwise: errors are recorded
    /// in `status()`, `error()` and `error_detail()`.
    pub fn execute<'a>(&'a mut self, notifier: &'a dyn LifecycleNotifier) -> BoxFuture<'a, bool> {
        async move { self.run_lifecycle(notifier).await }.boxed()
    }

    async fn run_lifecycle(&mut self, notifier: &dyn LifecycleNotifier) -> bool {
        let started_at = Utc::now();
        self.status = ProcessStatus::Running;
        self.started_at = Some(started_at);
        self.completed_at = None;
        self.execution_time_ms = None;
        self.error = None;
        self.error_detail = None;

        info!(process = %self.identity.name, process_id = %self.identity.id, "Process starting");
        notifier
            .notify(self.identity.event(EventType::ProcessStarted, self.status))
            .await;

        let outcome = match AssertUnwindSafe(self.run_work(notifier)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(ProcessError::Panicked {
                message: panic_message(panic.as_ref()),
            }
            .into()),
        };

        let completed_at = Utc::now();
        self.completed_at = Some(completed_at);

        let success = match outcome {
            Ok(()) => {
                let elapsed_ms = elapsed_ms(started_at, completed_at);
                self.status = ProcessStatus::Completed;
                self.execution_time_ms = Some(elapsed_ms);

                info!(
                    process = %self.identity.name,
                    elapsed_ms = elapsed_ms as u64,
                    "Process completed"
                );
                log_parameters(&self.identity.name, "output", &self.output);

                notifier
                    .notify(
                        self.identity
                            .event(EventType::ProcessCompleted, self.status)
                            .with_duration(elapsed_ms),
                    )
                    .await;
                true
            }
            Err(err) => {
                let message = err.to_string();
                self.status = ProcessStatus::Failed;
                self.error = Some(message.clone());
                self.error_detail = Some(format!("{:?}", err));

                error!(process = %self.identity.name, error = %message, "Process failed");

                notifier
                    .notify(
                        self.identity
                            .event(EventType::ProcessFailed, self.status)
                            .with_error(message),
                    )
                    .await;
                false
            }
        };

        self.input.unlock_all();
        success
    }

    /// Steps 2-3 of the lifecycle; every error lands in the caller's handler
    async fn run_work(&mut self, notifier: &dyn LifecycleNotifier) -> Result<()> {
        self.input.validate_all()?;
        self.input.lock_all();
        log_parameters(&self.identity.name, "input", &self.input);

        match &mut self.work {
            Work::Atomic(work) => work.execute_impl(&self.input, &mut self.output).await?,
            Work::Orchestrated(orchestration) => {
                orchestration
                    .run(&self.identity, &mut self.input, &mut self.output, notifier)
                    .await?
            }
        }

        self.output.validate_all()?;
        Ok(())
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            id: self.identity.id,
            name: self.identity.name.clone(),
            class_name: self.identity.class_name.clone(),
            kind: self.kind(),
            status: self.status,
            started_at: self.started_at,
            completed_at: self.completed_at,
            execution_time_ms: self.execution_time_ms,
            error: self.error.clone(),
            input: self.input.snapshot(),
            output: self.output.snapshot(),
            context: self.context.clone(),
            children: self.children().iter().map(ChildProcess::snapshot).collect(),
        }
    }
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.identity.id)
            .field("name", &self.identity.name)
            .field("class", &self.identity.class_name)
            .field("status", &self.status)
            .field("children", &self.children().len())
            .finish()
    }
}

/// Last path segment of a type name, e.g. `AddNumbers` for `my_crate::math::AddNumbers`
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

fn elapsed_ms(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> f64 {
    let elapsed = completed_at - started_at;
    match elapsed.num_microseconds() {
        Some(us) => us as f64 / 1000.0,
        None => elapsed.num_milliseconds() as f64,
    }
}
