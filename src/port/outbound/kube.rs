//! Kubeconfig and Kubernetes API ports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::LocalRegistryHosting;
use crate::error::Result;

/// Namespace holding the cluster-wide discovery ConfigMaps.
pub const DISCOVERY_NAMESPACE: &str = "kube-public";

/// ConfigMap carrying the `localRegistryHosting.v1` document.
pub const LOCAL_REGISTRY_HOSTING_CONFIGMAP: &str = "local-registry-hosting";
pub const LOCAL_REGISTRY_HOSTING_KEY: &str = "localRegistryHosting.v1";

/// ConfigMap recording the product config a cluster was created with.
pub const CLUSTER_CONFIG_CONFIGMAP: &str = "devcluster-cluster-config";
pub const CLUSTER_CONFIG_KEY: &str = "config.json";

/// A kubeconfig context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KubeContext {
    pub name: String,
    /// Name of the kubeconfig cluster entry.
    pub cluster: String,
    /// API server URL, if the cluster entry has one.
    pub server: Option<String>,
    /// `provider` of the cluster entry's `cluster_info` extension, which
    /// minikube writes.
    pub provider: Option<String>,
    pub current: bool,
}

/// The local kubeconfig.
pub trait ContextStore: Send + Sync {
    fn contexts(&self) -> Result<Vec<KubeContext>>;

    /// Remove a context. Removing a missing context is not an error.
    fn delete_context(&self, name: &str) -> Result<()>;

    /// Make `name` the current context.
    fn use_context(&self, name: &str) -> Result<()>;

    /// Point the context's cluster entry at a different API server.
    fn set_server(&self, context: &str, server: &str) -> Result<()>;
}

/// Read-only Kubernetes API access, addressed by kubeconfig context.
#[async_trait]
pub trait ClusterInspector: Send + Sync {
    /// Creation time of the oldest node, `None` if there are no nodes.
    async fn earliest_node_creation(&self, context: &str) -> Result<Option<DateTime<Utc>>>;

    async fn local_registry_hosting(&self, context: &str) -> Result<Option<LocalRegistryHosting>>;

    /// API server `gitVersion`.
    async fn server_version(&self, context: &str) -> Result<String>;

    /// The product config recorded when the cluster was created.
    async fn recorded_config(&self, context: &str) -> Result<Option<serde_json::Value>>;

    /// Drop any cached client for `context`.
    fn invalidate(&self, _context: &str) {}
}
