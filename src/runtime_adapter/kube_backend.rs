//! Kubernetes-backed `WorkerRuntime`. Pods are labeled
//! `app=botcrew-agent,agent-id=<id>` and launched from a templated pod spec,
//! mirroring the original's `k8s/pod_spec.py` + `services/pod_manager.py`.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use kube::api::{DeleteParams, ListParams, ObjectMeta, PostParams};
use kube::{Api, Client, Config};
use std::collections::BTreeMap;

use super::{RuntimeError, WorkerHandle, WorkerPhase, WorkerRuntime};

const APP_LABEL: &str = "botcrew-agent";
const AGENT_IMAGE_ENV: &str = "BOTCREW_AGENT_IMAGE";

pub struct KubeWorkerRuntime {
    pods: Api<Pod>,
    namespace: String,
    image: String,
}

impl KubeWorkerRuntime {
    /// Tries the ambient in-cluster credential first (when co-located with
    /// the cluster), falling back to an explicit kubeconfig path.
    pub async fn connect(namespace: &str, kubeconfig_path: Option<&str>) -> Result<Self, RuntimeError> {
        let client = match Client::try_default().await {
            Ok(client) => client,
            Err(ambient_err) => {
                let path = kubeconfig_path.ok_or_else(|| {
                    RuntimeError::Unavailable(format!(
                        "no ambient credential ({ambient_err}) and no kubeconfig_path configured"
                    ))
                })?;
                let kubeconfig = kube::config::Kubeconfig::read_from(path)
                    .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;
                let config = Config::from_custom_kubeconfig(kubeconfig, &Default::default())
                    .await
                    .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;
                Client::try_from(config).map_err(|e| RuntimeError::Unavailable(e.to_string()))?
            }
        };

        let pods = Api::namespaced(client, namespace);
        let image = std::env::var(AGENT_IMAGE_ENV)
            .unwrap_or_else(|_| "botcrew/agent:latest".to_string());

        Ok(Self {
            pods,
            namespace: namespace.to_string(),
            image,
        })
    }

    fn pod_name(agent_id: &str) -> String {
        format!("agent-{agent_id}")
    }

    fn label_selector() -> String {
        format!("app={APP_LABEL}")
    }
}

#[async_trait]
impl WorkerRuntime for KubeWorkerRuntime {
    async fn launch(&self, agent_id: &str) -> Result<String, RuntimeError> {
        let name = Self::pod_name(agent_id);

        if self.pods.get_opt(&name).await.map_err(to_runtime_error)?.is_some() {
            return Err(RuntimeError::Conflict(name));
        }

        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), APP_LABEL.to_string());
        labels.insert("agent-id".to_string(), agent_id.to_string());

        let pod = Pod {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(labels),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "agent".to_string(),
                    image: Some(self.image.clone()),
                    env: Some(vec![k8s_openapi::api::core::v1::EnvVar {
                        name: "BOTCREW_AGENT_ID".to_string(),
                        value: Some(agent_id.to_string()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }],
                restart_policy: Some("Never".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        self.pods
            .create(&PostParams::default(), &pod)
            .await
            .map_err(to_runtime_error)?;

        Ok(name)
    }

    async fn terminate(&self, handle: &str, grace_seconds: u32) -> Result<(), RuntimeError> {
        let params = DeleteParams {
            grace_period_seconds: Some(grace_seconds),
            ..Default::default()
        };
        match self.pods.delete(handle, &params).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(()),
            Err(e) => Err(to_runtime_error(e)),
        }
    }

    async fn inspect(&self, handle: &str) -> Result<Option<WorkerPhase>, RuntimeError> {
        match self.pods.get_opt(handle).await.map_err(to_runtime_error)? {
            None => Ok(None),
            Some(pod) => Ok(Some(phase_of(&pod))),
        }
    }

    async fn list_all(&self) -> Result<Vec<WorkerHandle>, RuntimeError> {
        let params = ListParams::default().labels(&Self::label_selector());
        let list = self.pods.list(&params).await.map_err(to_runtime_error)?;
        Ok(list
            .items
            .into_iter()
            .filter_map(|pod| {
                let name = pod.metadata.name.clone()?;
                let phase = phase_of(&pod);
                Some(WorkerHandle { handle: name, phase })
            })
            .collect())
    }
}

fn phase_of(pod: &Pod) -> WorkerPhase {
    let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
    match phase {
        Some("Running") | Some("Succeeded") => WorkerPhase::Running,
        Some("Failed") => WorkerPhase::Failed,
        _ => WorkerPhase::Pending,
    }
}

fn to_runtime_error(err: kube::Error) -> RuntimeError {
    RuntimeError::Unavailable(err.to_string())
}
