//! Supported local Kubernetes backends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Provider minikube records in a cluster entry's `cluster_info` extension.
pub const MINIKUBE_PROVIDER: &str = "minikube.sigs.k8s.io";

/// Address prefix of the network minikube's docker driver creates.
const MINIKUBE_DOCKER_NETWORK: &str = "192.168.49.";

/// Identifier for a supported local Kubernetes backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Product {
    /// Kubernetes built into the desktop container engine.
    DockerDesktop,
    /// Kubernetes in Docker.
    Kind,
    /// k3s in Docker.
    K3d,
    /// Minikube on the docker driver.
    Minikube,
    /// A context we cannot attribute to a product.
    #[default]
    Unknown,
}

impl Product {
    pub const ALL: [Product; 4] = [
        Product::DockerDesktop,
        Product::Kind,
        Product::K3d,
        Product::Minikube,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Product::DockerDesktop => "docker-desktop",
            Product::Kind => "kind",
            Product::K3d => "k3d",
            Product::Minikube => "minikube",
            Product::Unknown => "unknown",
        }
    }

    /// Infer the product from the shape of a kubeconfig context.
    ///
    /// `server` is the API server URL of the context's cluster and
    /// `provider` the provider minikube records on its cluster entries.
    pub fn from_context(context: &str, server: Option<&str>, provider: Option<&str>) -> Product {
        if context == "docker-desktop" || context == "docker-for-desktop" {
            return Product::DockerDesktop;
        }
        if context.starts_with("kind-") {
            return Product::Kind;
        }
        if context.starts_with("k3d-") {
            return Product::K3d;
        }
        if context == "minikube" {
            return Product::Minikube;
        }
        if provider == Some(MINIKUBE_PROVIDER) {
            return Product::Minikube;
        }
        // Older minikube releases write no provider; their docker driver
        // network is still recognizable.
        match server.and_then(|s| s.strip_prefix("https://")) {
            Some(host) if host.starts_with(MINIKUBE_DOCKER_NETWORK) => Product::Minikube,
            _ => Product::Unknown,
        }
    }

    /// The cluster name used when the desired spec leaves it empty.
    pub fn default_cluster_name(&self) -> Option<&'static str> {
        match self {
            Product::DockerDesktop => Some("docker-desktop"),
            Product::Kind => Some("kind-kind"),
            Product::K3d => Some("k3d-k3s-default"),
            Product::Minikube => Some("minikube"),
            Product::Unknown => None,
        }
    }

    /// Prefix every cluster name of this product must carry, if any.
    pub fn name_prefix(&self) -> Option<&'static str> {
        match self {
            Product::Kind => Some("kind-"),
            Product::K3d => Some("k3d-"),
            _ => None,
        }
    }

    /// Check a cluster name against the product's naming rule.
    pub fn validate_name(&self, name: &str) -> Result<()> {
        match self {
            Product::DockerDesktop if name != "docker-desktop" => Err(Error::Validation(format!(
                "docker-desktop clusters must be named docker-desktop, got {name:?}"
            ))),
            Product::Kind | Product::K3d => {
                let prefix = self.name_prefix().unwrap_or_default();
                match name.strip_prefix(prefix) {
                    Some(rest) if !rest.is_empty() => Ok(()),
                    _ => Err(Error::Validation(format!(
                        "all {} clusters must have a name with the prefix {prefix}*, got {name:?}",
                        self.as_str()
                    ))),
                }
            }
            Product::Unknown => Err(Error::Validation(
                "a product is required to create a cluster".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Product {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "docker-desktop" | "docker-for-desktop" => Ok(Product::DockerDesktop),
            "kind" => Ok(Product::Kind),
            "k3d" => Ok(Product::K3d),
            "minikube" => Ok(Product::Minikube),
            "unknown" => Ok(Product::Unknown),
            other => Err(Error::Validation(format!(
                "unknown product {other:?} (expected one of: docker-desktop, kind, k3d, minikube)"
            ))),
        }
    }
}
