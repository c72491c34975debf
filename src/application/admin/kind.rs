use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::domain::{Cluster, LocalRegistryHosting, Product, Registry, ToolVersion};
use crate::error::{Error, Result};
use crate::port::outbound::{CommandRunner, ContainerRuntime, Invocation};

use super::{mirror, node_image, Admin};

const INSTALL_HELP: &str = "https://kind.sigs.k8s.io/docs/user/quick-start/";

/// First kind release that reads a cluster config from stdin.
const MIN_CONFIG_VERSION: ToolVersion = ToolVersion::new(0, 7, 0);

/// Docker network kind puts every node on.
pub const KIND_NETWORK: &str = "kind";

/// kind clusters, driven through the `kind` CLI.
pub struct KindAdmin {
    runner: Arc<dyn CommandRunner>,
    runtime: Arc<dyn ContainerRuntime>,
}

impl KindAdmin {
    pub fn new(runner: Arc<dyn CommandRunner>, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runner, runtime }
    }

    /// kind's own cluster name: the context name without `kind-`.
    fn cluster_name(name: &str) -> &str {
        name.strip_prefix("kind-").unwrap_or(name)
    }

    async fn nodes(&self, cluster: &str) -> Result<Vec<String>> {
        let out = super::run(
            self.runner.as_ref(),
            format!("listing nodes of kind cluster {cluster}"),
            Invocation::new("kind", ["get", "nodes", "--name", cluster]),
        )
        .await?;
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}

/// The kind `Cluster` config for `desired`, layered over its config blob.
pub fn cluster_config(desired: &Cluster, registry: Option<&Registry>) -> Result<Value> {
    let mut config = match &desired.config {
        None => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(Error::Validation(format!(
                "kind config must be a map, got {other}"
            )))
        }
    };
    config
        .entry("kind")
        .or_insert_with(|| Value::String("Cluster".into()));
    config
        .entry("apiVersion")
        .or_insert_with(|| Value::String("kind.x-k8s.io/v1alpha4".into()));

    if registry.is_some() {
        let patch = Value::String(mirror::containerd_config_patch());
        match config
            .entry("containerdConfigPatches")
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(patches) => {
                if !patches.contains(&patch) {
                    patches.push(patch);
                }
            }
            other => {
                return Err(Error::Validation(format!(
                    "kind containerdConfigPatches must be a list, got {other}"
                )))
            }
        }
    }
    Ok(Value::Object(config))
}

#[async_trait]
impl Admin for KindAdmin {
    fn product(&self) -> Product {
        Product::Kind
    }

    async fn ensure_installed(&self) -> Result<()> {
        super::ensure_on_path(self.runner.as_ref(), "kind", INSTALL_HELP)
    }

    async fn create(&self, desired: &Cluster, registry: Option<&Registry>) -> Result<()> {
        Product::Kind.validate_name(&desired.name)?;
        let name = Self::cluster_name(&desired.name);
        let version = super::tool_version(self.runner.as_ref(), "kind").await?;

        let mut args = vec![
            "create".to_string(),
            "cluster".to_string(),
            "--name".to_string(),
            name.to_string(),
        ];
        if let Some(requested) = &desired.kubernetes_version {
            let kubernetes = ToolVersion::parse_kubernetes(requested)?;
            let image = node_image::kind_node_image(&version, &kubernetes)?;
            args.extend(["--image".to_string(), image.to_string()]);
        }

        let invocation = if version >= MIN_CONFIG_VERSION {
            let config = serde_yaml::to_string(&cluster_config(desired, registry)?)?;
            debug!(%config, "kind cluster config");
            args.extend(["--config".to_string(), "-".to_string()]);
            Invocation::new("kind", args).with_stdin(config)
        } else if desired.config.is_some() || registry.is_some() {
            return Err(Error::Validation(format!(
                "kind {version} is too old for cluster config or registries; upgrade to {MIN_CONFIG_VERSION} or newer"
            )));
        } else {
            Invocation::new("kind", args)
        };

        info!(cluster = %desired.name, %version, "creating kind cluster");
        super::run(self.runner.as_ref(), format!("creating kind cluster {name}"), invocation).await?;
        Ok(())
    }

    async fn delete(&self, existing: &Cluster) -> Result<()> {
        let name = Self::cluster_name(&existing.name);
        info!(cluster = %existing.name, "deleting kind cluster");
        super::run(
            self.runner.as_ref(),
            format!("deleting kind cluster {name}"),
            Invocation::new("kind", ["delete", "cluster", "--name", name]),
        )
        .await?;
        Ok(())
    }

    async fn attach_registry(&self, desired: &Cluster, registry: &Registry) -> Result<()> {
        super::registry_container_port(registry)?;
        super::join_network(self.runtime.as_ref(), KIND_NETWORK, registry).await?;

        let name = Self::cluster_name(&desired.name);
        let script = mirror::write_hosts_script(registry);
        let hosts = mirror::hosts_toml(registry);
        for node in self.nodes(name).await? {
            debug!(%node, registry = %registry.name, "writing registry mirror config");
            super::run(
                self.runner.as_ref(),
                format!("configuring registry mirror on node {node}"),
                Invocation::new("docker", ["exec", "-i", node.as_str(), "sh", "-c", script.as_str()])
                    .with_stdin(hosts.clone()),
            )
            .await?;
        }
        Ok(())
    }

    fn local_registry_hosting(&self, _desired: &Cluster, registry: &Registry) -> Option<LocalRegistryHosting> {
        Some(mirror::network_hosting(registry))
    }

    fn in_container_server(&self, cluster: &Cluster) -> Option<String> {
        Some(format!(
            "https://{}-control-plane:6443",
            Self::cluster_name(&cluster.name)
        ))
    }
}
