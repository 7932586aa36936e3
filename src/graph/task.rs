//! Named per-node tasks.
//!
//! A service registers task *kinds* (`Arc<dyn Task>`) under a name. A node
//! then binds one of its own task names to a kind, and callers, local or
//! remote, invoke it by name with an ordered parameter list. Tasks are
//! independent of traversal.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::graph::node::Node;
use crate::graph::value::PropValue;
use crate::location::{ClientLocation, NodeLocation};

/// Everything a running task can see.
pub struct TaskContext<'a> {
    /// Node the task is bound to.
    pub node: &'a Node,
    /// Client that invoked the task.
    pub sender: &'a ClientLocation,
    /// Optional capabilities supplied when the service was built.
    pub extensions: Option<&'a Extensions>,
}

/// A callable attached to nodes.
pub trait Task: Send + Sync {
    /// Runs the task.
    fn run(&self, ctx: &TaskContext<'_>, params: &[PropValue]) -> Result<()>;
}

impl<F> Task for F
where
    F: Fn(&TaskContext<'_>, &[PropValue]) -> Result<()> + Send + Sync,
{
    fn run(&self, ctx: &TaskContext<'_>, params: &[PropValue]) -> Result<()> {
        self(ctx, params)
    }
}

/// Opaque capability slot handed to tasks.
#[derive(Clone)]
pub struct Extensions {
    inner: Arc<dyn Any + Send + Sync>,
}

impl Extensions {
    /// Wraps `value`.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    /// Borrows the wrapped value if it has type `T`.
    pub fn get<T: Any>(&self) -> Option<&T> {
        (*self.inner).downcast_ref::<T>()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions").finish_non_exhaustive()
    }
}

/// Task kinds known to a service.
#[derive(Default)]
pub struct TaskRegistry {
    kinds: RwLock<FxHashMap<String, Arc<dyn Task>>>,
}

impl TaskRegistry {
    /// Registers `task` under `kind`, replacing any previous registration.
    pub fn register(&self, kind: impl Into<String>, task: Arc<dyn Task>) {
        self.kinds.write().insert(kind.into(), task);
    }

    /// The task registered under `kind`.
    pub fn get(&self, kind: &str) -> Result<Arc<dyn Task>> {
        self.kinds
            .read()
            .get(kind)
            .cloned()
            .ok_or_else(|| GraphError::not_found("task kind", kind))
    }
}

/// Stores task bindings and runs them.
pub trait TaskManager: Send + Sync {
    /// Binds task `name` on `node` to `task`.
    fn add_task(&self, node: &NodeLocation, name: &str, task: Arc<dyn Task>) -> Result<()>;

    /// Runs task `name` bound on `ctx.node`.
    fn call_task(&self, ctx: &TaskContext<'_>, name: &str, params: &[PropValue]) -> Result<()>;
}

/// Runs tasks synchronously on the calling thread.
#[derive(Default)]
pub struct InlineTaskManager {
    bound: RwLock<FxHashMap<(NodeLocation, String), Arc<dyn Task>>>,
}

impl TaskManager for InlineTaskManager {
    fn add_task(&self, node: &NodeLocation, name: &str, task: Arc<dyn Task>) -> Result<()> {
        self.bound
            .write()
            .insert((node.clone(), name.to_owned()), task);
        Ok(())
    }

    fn call_task(&self, ctx: &TaskContext<'_>, name: &str, params: &[PropValue]) -> Result<()> {
        let key = (ctx.node.location().clone(), name.to_owned());
        let task = self
            .bound
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| GraphError::not_found("task", format!("{}#{name}", key.0)))?;
        debug!(node = %key.0, task = name, sender = %ctx.sender, "task.call");
        task.run(ctx, params)
    }
}
