//! Registry of constructible process types.
//!
//! Maps a registration name to a constructor so that processes can be created
//! by name (from the CLI, for instance) and listed with their parameters.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::core::{short_type_name, AtomicProcess, OrchestratedProcess, Process};
use crate::domain::{ParameterSnapshot, ProcessKind};

type Constructor = Arc<dyn Fn() -> Process + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Process '{name}' is not registered")]
    NotFound { name: String },
}

/// Description of a registered process type
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    pub name: String,
    pub class: String,
    pub kind: ProcessKind,
    pub description: String,
    pub input: Vec<ParameterSnapshot>,
    pub output: Vec<ParameterSnapshot>,
}

/// Name-to-constructor registry
#[derive(Clone, Default)]
pub struct ProcessRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `name`, replacing any previous one
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> Process + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
        self
    }

    /// Register an atomic type under its short type name
    pub fn register_atomic<T>(&mut self) -> &mut Self
    where
        T: AtomicProcess + Default,
    {
        self.register(short_type_name::<T>(), || Process::atomic(T::default()))
    }

    /// Register an orchestrated type under its short type name
    pub fn register_orchestrated<T>(&mut self) -> &mut Self
    where
        T: OrchestratedProcess + Default,
    {
        self.register(short_type_name::<T>(), || Process::orchestrated(T::default()))
    }

    /// Returns whether `name` was registered
    pub fn unregister(&mut self, name: &str) -> bool {
        self.constructors.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Registered names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Instantiate a registered process, optionally under a custom instance name
    pub fn create(
        &self,
        name: &str,
        instance_name: Option<&str>,
    ) -> Result<Process, RegistryError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })?;

        let process = constructor();
        Ok(match instance_name {
            Some(instance_name) => process.named(instance_name),
            None => process,
        })
    }

    /// Describe one registered process
    pub fn info(&self, name: &str) -> Result<ProcessInfo, RegistryError> {
        let process = self.create(name, None)?;
        Ok(ProcessInfo {
            name: name.to_string(),
            class: process.class_name().to_string(),
            kind: process.kind(),
            description: process.description().to_string(),
            input: process.input().snapshot(),
            output: process.output().snapshot(),
        })
    }

    /// Describe every registered process, sorted by name
    pub fn list(&self) -> Vec<ProcessInfo> {
        self.constructors
            .keys()
            .filter_map(|name| self.info(name).ok())
            .collect()
    }

    pub fn clear(&mut self) {
        self.constructors.clear();
    }
}

impl std::fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRegistry")
            .field("processes", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}
