//! Orchestrated processes: composition, grouping and data flow.
//!
//! An orchestration is composed once into an ordered list of children, each
//! tagged SEQUENTIAL or PARALLEL, plus an ordered list of parameter
//! connections. Execution walks the children group by group:
//!
//! - a SEQUENTIAL child forms a group of its own
//! - a contiguous run of PARALLEL children forms one group whose members run
//!   concurrently and are all awaited before the next group starts
//!
//! Before every group, and once more after the last one, every connection
//! whose source holds a value copies it into its target. The first failing
//! group aborts the orchestration.

use std::fmt;

use anyhow::Result;
use futures::future::join_all;
use tracing::{debug, instrument};

use crate::domain::{
    ChildSnapshot, EventType, ExecutionContext, ExecutionMode, Parameter, ParameterSet,
    ProcessStatus,
};

use super::error::ProcessError;
use super::notifier::LifecycleNotifier;
use super::process::{Process, ProcessIdentity};

/// A process composed of child processes.
///
/// `orchestrate` is called once per instance, on first execution (or on an
/// explicit `Process::compose`), and declares children and connections on the
/// supplied [`Composition`].
pub trait OrchestratedProcess: Send + Sync + 'static {
    fn define_parameters(&self, input: &mut ParameterSet, output: &mut ParameterSet);

    fn orchestrate(&self, composition: &mut Composition) -> Result<()>;

    /// One-line description used in registry listings
    fn description(&self) -> &str {
        ""
    }

    fn context(&self) -> ExecutionContext {
        ExecutionContext::default()
    }
}

/// Which parameter set of a process a reference points into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Input,
    Output,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Input => f.write_str("input"),
            Side::Output => f.write_str("output"),
        }
    }
}

/// Owner of a referenced parameter: the orchestration itself, or a
/// descendant addressed by child indices from the top
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    This,
    Child(Vec<usize>),
}

/// Reference to a parameter somewhere in an orchestration tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamRef {
    pub owner: Owner,
    pub side: Side,
    pub name: String,
}

impl fmt::Display for ParamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Owner::This => write!(f, "self.{}.{}", self.side, self.name),
            Owner::Child(path) => {
                let path: Vec<String> = path.iter().map(|i| i.to_string()).collect();
                write!(f, "child[{}].{}.{}", path.join("/"), self.side, self.name)
            }
        }
    }
}

/// Handle to a child declared on a [`Composition`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildHandle {
    path: Vec<usize>,
}

impl ChildHandle {
    pub fn input(&self, name: &str) -> ParamRef {
        self.param(Side::Input, name)
    }

    pub fn output(&self, name: &str) -> ParamRef {
        self.param(Side::Output, name)
    }

    /// Handle to a child of this (orchestrated) child
    pub fn child(&self, index: usize) -> ChildHandle {
        let mut path = self.path.clone();
        path.push(index);
        ChildHandle { path }
    }

    /// Index among the parent's children
    pub fn index(&self) -> usize {
        self.path.last().copied().unwrap_or_default()
    }

    fn param(&self, side: Side, name: &str) -> ParamRef {
        ParamRef {
            owner: Owner::Child(self.path.clone()),
            side,
            name: name.to_string(),
        }
    }
}

/// One-directional value copy between two parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub source: ParamRef,
    pub target: ParamRef,
}

/// A child process with its declared execution mode
#[derive(Debug)]
pub struct ChildProcess {
    process: Process,
    mode: ExecutionMode,
}

impl ChildProcess {
    pub fn process(&self) -> &Process {
        &self.process
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn snapshot(&self) -> ChildSnapshot {
        ChildSnapshot {
            process: self.process.snapshot(),
            execution_mode: self.mode,
        }
    }
}

/// Staging area filled by `OrchestratedProcess::orchestrate`
#[derive(Debug, Default)]
pub struct Composition {
    children: Vec<ChildProcess>,
    connections: Vec<Connection>,
}

impl Composition {
    /// Declare a child. Declaration order is execution order.
    pub fn add_child(&mut self, process: Process, mode: ExecutionMode) -> ChildHandle {
        self.children.push(ChildProcess { process, mode });
        ChildHandle {
            path: vec![self.children.len() - 1],
        }
    }

    pub fn sequential(&mut self, process: Process) -> ChildHandle {
        self.add_child(process, ExecutionMode::Sequential)
    }

    pub fn parallel(&mut self, process: Process) -> ChildHandle {
        self.add_child(process, ExecutionMode::Parallel)
    }

    /// Copy `source` into `target` before each group and after the last one
    pub fn connect(&mut self, source: ParamRef, target: ParamRef) {
        self.connections.push(Connection { source, target });
    }

    /// The orchestration's own input parameter `name`
    pub fn input(&self, name: &str) -> ParamRef {
        ParamRef {
            owner: Owner::This,
            side: Side::Input,
            name: name.to_string(),
        }
    }

    /// The orchestration's own output parameter `name`
    pub fn output(&self, name: &str) -> ParamRef {
        ParamRef {
            owner: Owner::This,
            side: Side::Output,
            name: name.to_string(),
        }
    }
}

/// Children that run together, by index into the declaration list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionGroup {
    members: Vec<usize>,
}

impl ExecutionGroup {
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Parallel when more than one member, sequential otherwise
    pub fn mode(&self) -> ExecutionMode {
        if self.members.len() > 1 {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        }
    }
}

/// Partition children into execution groups by run-length of declared mode.
///
/// No dependency analysis: PARALLEL children share a group only when they are
/// contiguous in declaration order.
pub fn group_children<I>(modes: I) -> Vec<ExecutionGroup>
where
    I: IntoIterator<Item = ExecutionMode>,
{
    let mut groups = Vec::new();
    let mut pending_parallel = Vec::new();

    for (index, mode) in modes.into_iter().enumerate() {
        match mode {
            ExecutionMode::Sequential => {
                if !pending_parallel.is_empty() {
                    groups.push(ExecutionGroup {
                        members: std::mem::take(&mut pending_parallel),
                    });
                }
                groups.push(ExecutionGroup {
                    members: vec![index],
                });
            }
            ExecutionMode::Parallel => pending_parallel.push(index),
        }
    }

    if !pending_parallel.is_empty() {
        groups.push(ExecutionGroup {
            members: pending_parallel,
        });
    }

    groups
}

/// Runtime state of an orchestrated process
pub(crate) struct Orchestration {
    definition: Box<dyn OrchestratedProcess>,
    children: Vec<ChildProcess>,
    connections: Vec<Connection>,
    composed: bool,
}

impl Orchestration {
    pub(crate) fn new(definition: Box<dyn OrchestratedProcess>) -> Self {
        Self {
            definition,
            children: Vec::new(),
            connections: Vec::new(),
            composed: false,
        }
    }

    pub(crate) fn children(&self) -> &[ChildProcess] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut [ChildProcess] {
        &mut self.children
    }

    pub(crate) fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub(crate) fn groups(&self) -> Vec<ExecutionGroup> {
        group_children(self.children.iter().map(|c| c.mode))
    }

    /// Run the composition routine once.
    ///
    /// Orchestrated children are composed recursively so that connections
    /// may reach into them. Nothing is committed unless every connection
    /// endpoint exists.
    pub(crate) fn compose(&mut self, input: &ParameterSet, output: &ParameterSet) -> Result<bool> {
        if self.composed {
            return Ok(false);
        }

        let mut composition = Composition::default();
        self.definition.orchestrate(&mut composition)?;

        for child in composition.children.iter_mut() {
            child.process.compose()?;
        }

        for connection in &composition.connections {
            for reference in [&connection.source, &connection.target] {
                if lookup(input, output, &composition.children, reference).is_none() {
                    return Err(ProcessError::UnresolvedConnection {
                        reference: reference.to_string(),
                    }
                    .into());
                }
            }
        }

        debug!(
            children = composition.children.len(),
            connections = composition.connections.len(),
            "Orchestration composed"
        );

        self.children = composition.children;
        self.connections = composition.connections;
        self.composed = true;
        Ok(true)
    }

    /// Grouped execution of all children
    #[instrument(skip_all, fields(orchestration = %owner.name))]
    pub(crate) async fn run(
        &mut self,
        owner: &ProcessIdentity,
        input: &mut ParameterSet,
        output: &mut ParameterSet,
        notifier: &dyn LifecycleNotifier,
    ) -> Result<()> {
        self.compose(input, output)?;

        let groups = self.groups();
        for (index, group) in groups.iter().enumerate() {
            let mode = group.mode();
            debug!(group = index, size = group.len(), mode = %mode, "Group starting");
            notifier
                .notify(
                    owner
                        .event(EventType::GroupStarted, ProcessStatus::Running)
                        .with_group(index, group.len(), mode),
                )
                .await;

            self.resolve_connections(input, output)?;
            self.run_group(group, notifier).await?;

            notifier
                .notify(
                    owner
                        .event(EventType::GroupCompleted, ProcessStatus::Running)
                        .with_group_index(index),
                )
                .await;
        }

        self.resolve_connections(input, output)?;
        Ok(())
    }

    /// Copy every non-null source into its target, in declaration order.
    ///
    /// Targets are written through the lock (type check still applies);
    /// later connections to the same target win.
    fn resolve_connections(
        &mut self,
        input: &mut ParameterSet,
        output: &mut ParameterSet,
    ) -> Result<usize, ProcessError> {
        let mut copied = 0;

        for connection in &self.connections {
            let value = match lookup(input, output, &self.children, &connection.source)
                .and_then(Parameter::value)
            {
                Some(value) => value.clone(),
                None => continue,
            };

            let target = lookup_mut(input, output, &mut self.children, &connection.target)
                .ok_or_else(|| ProcessError::UnresolvedConnection {
                    reference: connection.target.to_string(),
                })?;
            target.assign(Some(value))?;
            copied += 1;
        }

        Ok(copied)
    }

    async fn run_group(
        &mut self,
        group: &ExecutionGroup,
        notifier: &dyn LifecycleNotifier,
    ) -> Result<(), ProcessError> {
        let members = group.members();

        let runs = self
            .children
            .iter_mut()
            .enumerate()
            .filter(|(index, _)| members.contains(index))
            .map(|(_, child)| child.process.execute(notifier));
        let results = join_all(runs).await;

        // Results come back in declaration order; the first failure wins.
        let failed = members
            .iter()
            .zip(results)
            .find(|(_, success)| !success)
            .map(|(&index, _)| &self.children[index].process);

        match failed {
            Some(child) => Err(ProcessError::ChildProcessFailure {
                child: child.name().to_string(),
                message: child.error().unwrap_or_default().to_string(),
            }),
            None => Ok(()),
        }
    }
}

fn descend<'a>(children: &'a [ChildProcess], path: &[usize]) -> Option<&'a Process> {
    let (first, rest) = path.split_first()?;
    let process = &children.get(*first)?.process;
    if rest.is_empty() {
        Some(process)
    } else {
        descend(process.children(), rest)
    }
}

fn descend_mut<'a>(children: &'a mut [ChildProcess], path: &[usize]) -> Option<&'a mut Process> {
    let (first, rest) = path.split_first()?;
    let process = &mut children.get_mut(*first)?.process;
    if rest.is_empty() {
        Some(process)
    } else {
        descend_mut(process.children_mut(), rest)
    }
}

fn lookup<'a>(
    input: &'a ParameterSet,
    output: &'a ParameterSet,
    children: &'a [ChildProcess],
    reference: &ParamRef,
) -> Option<&'a Parameter> {
    let (input, output) = match &reference.owner {
        Owner::This => (input, output),
        Owner::Child(path) => {
            let process = descend(children, path)?;
            (process.input(), process.output())
        }
    };
    match reference.side {
        Side::Input => input.get(&reference.name),
        Side::Output => output.get(&reference.name),
    }
}

fn lookup_mut<'a>(
    input: &'a mut ParameterSet,
    output: &'a mut ParameterSet,
    children: &'a mut [ChildProcess],
    reference: &ParamRef,
) -> Option<&'a mut Parameter> {
    let set = match (&reference.owner, reference.side) {
        (Owner::This, Side::Input) => input,
        (Owner::This, Side::Output) => output,
        (Owner::Child(path), Side::Input) => descend_mut(children, path)?.input_mut(),
        (Owner::Child(path), Side::Output) => descend_mut(children, path)?.output_mut(),
    };
    set.get_mut(&reference.name)
}
