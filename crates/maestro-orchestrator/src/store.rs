//! Storage seams for the two registries.
//!
//! The registries are process-wide shared state with single-writer records;
//! the traits here keep the in-memory map one implementation among possible
//! ones, so a bounded or durable store can be swapped in without touching
//! the engine.

use crate::types::{AsyncTask, WorkflowExecution};
use maestro_core::{MaestroError, MaestroResult};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Backing store for caller-visible tasks.
pub trait TaskStore: Send + Sync {
    /// Inserts a task. Ids are caller-generated and collision-resistant;
    /// inserting a duplicate id replaces the record.
    fn insert(&self, task: AsyncTask);

    /// Returns a snapshot of the task, if present.
    fn get(&self, id: &str) -> Option<AsyncTask>;

    /// Mutates the task in place under the store lock.
    fn update(&self, id: &str, mutate: &mut dyn FnMut(&mut AsyncTask)) -> MaestroResult<()>;

    /// Number of stored tasks.
    fn len(&self) -> usize;

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Backing store for workflow executions.
pub trait ExecutionStore: Send + Sync {
    /// Inserts an execution record.
    fn insert(&self, execution: WorkflowExecution);

    /// Returns a snapshot of the execution, if present.
    fn get(&self, id: &str) -> Option<WorkflowExecution>;

    /// Mutates the execution in place under the store lock.
    fn update(&self, id: &str, mutate: &mut dyn FnMut(&mut WorkflowExecution))
        -> MaestroResult<()>;
}

/// Process-lifetime in-memory task store.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<String, AsyncTask>>,
}

impl MemoryTaskStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskStore for MemoryTaskStore {
    fn insert(&self, task: AsyncTask) {
        self.tasks.write().insert(task.id.clone(), task);
    }

    fn get(&self, id: &str) -> Option<AsyncTask> {
        self.tasks.read().get(id).cloned()
    }

    fn update(&self, id: &str, mutate: &mut dyn FnMut(&mut AsyncTask)) -> MaestroResult<()> {
        let mut tasks = self.tasks.write();
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| MaestroError::not_found("task", id))?;
        mutate(task);
        Ok(())
    }

    fn len(&self) -> usize {
        self.tasks.read().len()
    }
}

/// Process-lifetime in-memory execution store.
#[derive(Default)]
pub struct MemoryExecutionStore {
    executions: RwLock<HashMap<String, WorkflowExecution>>,
}

impl MemoryExecutionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExecutionStore for MemoryExecutionStore {
    fn insert(&self, execution: WorkflowExecution) {
        self.executions
            .write()
            .insert(execution.id.clone(), execution);
    }

    fn get(&self, id: &str) -> Option<WorkflowExecution> {
        self.executions.read().get(id).cloned()
    }

    fn update(
        &self,
        id: &str,
        mutate: &mut dyn FnMut(&mut WorkflowExecution),
    ) -> MaestroResult<()> {
        let mut executions = self.executions.write();
        let execution = executions
            .get_mut(id)
            .ok_or_else(|| MaestroError::not_found("execution", id))?;
        mutate(execution);
        Ok(())
    }
}
