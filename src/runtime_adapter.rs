//! Worker-Runtime Adapter (C2): abstract interface to create/delete/list/
//! inspect worker instances by logical name, so the Agent Service and the
//! Reconciler never depend on a concrete runtime library.

pub mod fake;
mod kube_backend;

use async_trait::async_trait;
use std::sync::Arc;

pub use kube_backend::KubeWorkerRuntime;

/// Observed phase of a worker instance, as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Pending,
    Running,
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("worker runtime unavailable: {0}")]
    Unavailable(String),
    #[error("worker already exists: {0}")]
    Conflict(String),
}

/// A single worker instance, as returned by `list_all`.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    pub handle: String,
    pub phase: WorkerPhase,
}

/// Abstract worker-runtime interface. The concrete backend is Kubernetes
/// (`KubeWorkerRuntime`); tests use `fake::FakeWorkerRuntime`.
#[async_trait]
pub trait WorkerRuntime: Send + Sync {
    /// Launches a worker for the given logical agent id, returning its
    /// handle (the original mints handles shaped `agent-<id>`).
    async fn launch(&self, agent_id: &str) -> Result<String, RuntimeError>;

    /// Idempotent: terminating a handle the runtime no longer knows about
    /// is a success, not an error.
    async fn terminate(&self, handle: &str, grace_seconds: u32) -> Result<(), RuntimeError>;

    /// `None` means the handle is unknown to the runtime.
    async fn inspect(&self, handle: &str) -> Result<Option<WorkerPhase>, RuntimeError>;

    /// Every worker belonging to this orchestrator, filtered by a
    /// well-known label set (`app=botcrew-agent`).
    async fn list_all(&self) -> Result<Vec<WorkerHandle>, RuntimeError>;
}

#[async_trait]
impl<T: WorkerRuntime + ?Sized> WorkerRuntime for Arc<T> {
    async fn launch(&self, agent_id: &str) -> Result<String, RuntimeError> {
        (**self).launch(agent_id).await
    }

    async fn terminate(&self, handle: &str, grace_seconds: u32) -> Result<(), RuntimeError> {
        (**self).terminate(handle, grace_seconds).await
    }

    async fn inspect(&self, handle: &str) -> Result<Option<WorkerPhase>, RuntimeError> {
        (**self).inspect(handle).await
    }

    async fn list_all(&self) -> Result<Vec<WorkerHandle>, RuntimeError> {
        (**self).list_all().await
    }
}
