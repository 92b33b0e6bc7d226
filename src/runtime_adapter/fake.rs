//! In-memory `WorkerRuntime` fake. Backs Agent Service and Reconciler unit
//! tests, grounded on the teacher's fake-adapter pattern for its own I/O
//! traits (`runtime::testing`).

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{RuntimeError, WorkerHandle, WorkerPhase, WorkerRuntime};

pub struct FakeWorkerRuntime {
    pods: Mutex<HashMap<String, WorkerPhase>>,
    fail_launch: Mutex<bool>,
}

impl FakeWorkerRuntime {
    pub fn new() -> Self {
        Self {
            pods: Mutex::new(HashMap::new()),
            fail_launch: Mutex::new(false),
        }
    }

    /// Test control: makes the next `launch` calls fail.
    pub fn set_fail_launch(&self, fail: bool) {
        *self.fail_launch.lock().unwrap() = fail;
    }

    /// Test control: overwrites the observed phase for a handle, simulating
    /// the worker crashing or hanging without going through `launch`.
    pub fn set_phase(&self, handle: &str, phase: WorkerPhase) {
        self.pods.lock().unwrap().insert(handle.to_string(), phase);
    }

    pub fn remove(&self, handle: &str) {
        self.pods.lock().unwrap().remove(handle);
    }
}

impl Default for FakeWorkerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerRuntime for FakeWorkerRuntime {
    async fn launch(&self, agent_id: &str) -> Result<String, RuntimeError> {
        if *self.fail_launch.lock().unwrap() {
            return Err(RuntimeError::Unavailable("fake launch failure".to_string()));
        }
        let handle = format!("agent-{agent_id}");
        self.pods.lock().unwrap().insert(handle.clone(), WorkerPhase::Running);
        Ok(handle)
    }

    async fn terminate(&self, handle: &str, _grace_seconds: u32) -> Result<(), RuntimeError> {
        self.pods.lock().unwrap().remove(handle);
        Ok(())
    }

    async fn inspect(&self, handle: &str) -> Result<Option<WorkerPhase>, RuntimeError> {
        Ok(self.pods.lock().unwrap().get(handle).copied())
    }

    async fn list_all(&self) -> Result<Vec<WorkerHandle>, RuntimeError> {
        Ok(self
            .pods
            .lock()
            .unwrap()
            .iter()
            .map(|(handle, phase)| WorkerHandle {
                handle: handle.clone(),
                phase: *phase,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn launch_then_inspect_reports_running() {
        let runtime = FakeWorkerRuntime::new();
        let handle = runtime.launch("a1").await.unwrap();
        assert_eq!(handle, "agent-a1");
        assert_eq!(runtime.inspect(&handle).await.unwrap(), Some(WorkerPhase::Running));
    }

    #[tokio::test]
    async fn terminate_is_idempotent_for_unknown_handle() {
        let runtime = FakeWorkerRuntime::new();
        assert!(runtime.terminate("no-such-handle", 5).await.is_ok());
    }

    #[tokio::test]
    async fn failing_launch_surfaces_unavailable() {
        let runtime = FakeWorkerRuntime::new();
        runtime.set_fail_launch(true);
        assert!(runtime.launch("a1").await.is_err());
    }
}
