//! Desired and observed cluster state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::product::Product;

/// A local Kubernetes cluster: the desired spec plus the last observed status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Kubeconfig context name. Empty means "derive from the product".
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub product: Product,
    /// Minimum CPUs the engine VM must have. Zero means no constraint.
    #[serde(default)]
    pub min_cpus: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,
    /// Name of the registry to attach.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    /// Product-specific config, compared only by structural equality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub status: ClusterStatus,
}

/// Live facts about a cluster. Recomputed on every read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    pub cpus: u32,
    /// Creation time of the oldest node; `None` when the cluster is not running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_registry_hosting: Option<LocalRegistryHosting>,
    /// API server version as reported by the cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,
    /// Whether this is the kubeconfig's current context.
    #[serde(default)]
    pub current: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Cluster {
    pub fn new(product: Product) -> Self {
        Self {
            product,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_min_cpus(mut self, min_cpus: u32) -> Self {
        self.min_cpus = min_cpus;
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    #[must_use]
    pub fn with_kubernetes_version(mut self, version: impl Into<String>) -> Self {
        self.kubernetes_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = Some(config);
        self
    }

    /// True when nodes were observed for this cluster.
    pub fn is_running(&self) -> bool {
        self.status.creation_timestamp.is_some()
    }
}

/// The `localRegistryHosting.v1` discovery document (KEP-1755).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRegistryHosting {
    /// Where the registry is reachable from the workstation.
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_from_container_runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_from_cluster_network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl LocalRegistryHosting {
    /// Name of the registry container, recovered from the in-cluster address.
    pub fn registry_name(&self) -> Option<&str> {
        self.host_from_cluster_network
            .as_deref()
            .and_then(|host| host.split(':').next())
            .filter(|name| !name.is_empty())
    }
}
