use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::domain::{Cluster, LocalRegistryHosting, Product, Registry, ToolVersion};
use crate::error::{Error, Result};
use crate::port::outbound::{CommandRunner, ContainerRuntime, Invocation};

use super::{mirror, node_image, Admin};

const INSTALL_HELP: &str = "https://k3d.io/#installation";

/// Registries need `--registry-use`, added in v4.
const MIN_REGISTRY_VERSION: ToolVersion = ToolVersion::new(4, 0, 0);
/// Config files (`k3d.io/v1alpha4`) are read from v5.
const MIN_CONFIG_VERSION: ToolVersion = ToolVersion::new(5, 0, 0);
/// `k3d.io/v1alpha5` from v5.5.
const V1ALPHA5_VERSION: ToolVersion = ToolVersion::new(5, 5, 0);

/// k3d clusters, driven through the `k3d` CLI.
pub struct K3dAdmin {
    runner: Arc<dyn CommandRunner>,
    runtime: Arc<dyn ContainerRuntime>,
}

impl K3dAdmin {
    pub fn new(runner: Arc<dyn CommandRunner>, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runner, runtime }
    }

    fn cluster_name(name: &str) -> &str {
        name.strip_prefix("k3d-").unwrap_or(name)
    }
}

/// The k3d `Simple` config for `desired` on k3d `version`.
pub fn simple_config(version: &ToolVersion, desired: &Cluster, registry: Option<&Registry>) -> Result<Value> {
    let mut config = match &desired.config {
        None => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(Error::Validation(format!(
                "k3d config must be a map, got {other}"
            )))
        }
    };
    let api_version = if *version >= V1ALPHA5_VERSION {
        "k3d.io/v1alpha5"
    } else {
        "k3d.io/v1alpha4"
    };
    config.insert("apiVersion".into(), Value::String(api_version.into()));
    config.insert("kind".into(), Value::String("Simple".into()));
    config.insert(
        "metadata".into(),
        json!({ "name": K3dAdmin::cluster_name(&desired.name) }),
    );

    if let Some(requested) = &desired.kubernetes_version {
        let kubernetes = ToolVersion::parse_kubernetes(requested)?;
        config.insert("image".into(), Value::String(node_image::k3s_image(&kubernetes)?.into()));
    }

    if let Some(registry) = registry {
        let port = super::registry_container_port(registry)?;
        let entry = Value::String(format!("{}:{port}", registry.name));
        let registries = config
            .entry("registries")
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(registries) = registries else {
            return Err(Error::Validation("k3d registries must be a map".to_string()));
        };
        match registries
            .entry("use")
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(used) => {
                if !used.contains(&entry) {
                    used.push(entry);
                }
            }
            other => {
                return Err(Error::Validation(format!(
                    "k3d registries.use must be a list, got {other}"
                )))
            }
        }
    }
    Ok(Value::Object(config))
}

#[async_trait]
impl Admin for K3dAdmin {
    fn product(&self) -> Product {
        Product::K3d
    }

    async fn ensure_installed(&self) -> Result<()> {
        super::ensure_on_path(self.runner.as_ref(), "k3d", INSTALL_HELP)
    }

    async fn create(&self, desired: &Cluster, registry: Option<&Registry>) -> Result<()> {
        Product::K3d.validate_name(&desired.name)?;
        let name = Self::cluster_name(&desired.name);
        let version = super::tool_version(self.runner.as_ref(), "k3d").await?;

        if registry.is_some() && version < MIN_REGISTRY_VERSION {
            return Err(Error::Validation(format!(
                "k3d {version} does not support registries; upgrade to {MIN_REGISTRY_VERSION} or newer"
            )));
        }
        let operation = format!("creating k3d cluster {name}");
        info!(cluster = %desired.name, %version, "creating k3d cluster");

        if version >= MIN_CONFIG_VERSION {
            let config = serde_yaml::to_string(&simple_config(&version, desired, registry)?)?;
            debug!(%config, "k3d cluster config");
            // Kept alive until k3d has read it.
            let mut file = tempfile::Builder::new()
                .prefix("k3d-config-")
                .suffix(".yaml")
                .tempfile()?;
            file.write_all(config.as_bytes())?;
            file.flush()?;
            let path = file.path().to_string_lossy().into_owned();
            super::run(
                self.runner.as_ref(),
                operation,
                Invocation::new("k3d", ["cluster", "create", name, "--config", path.as_str()]),
            )
            .await?;
            return Ok(());
        }

        if desired.config.is_some() {
            return Err(Error::Validation(format!(
                "k3d {version} does not read cluster config; upgrade to {MIN_CONFIG_VERSION} or newer"
            )));
        }
        let mut args = vec!["cluster".to_string(), "create".to_string(), name.to_string()];
        if let Some(requested) = &desired.kubernetes_version {
            let kubernetes = ToolVersion::parse_kubernetes(requested)?;
            args.extend(["--image".to_string(), node_image::k3s_image(&kubernetes)?.to_string()]);
        }
        if let Some(registry) = registry {
            let port = super::registry_container_port(registry)?;
            args.extend(["--registry-use".to_string(), format!("{}:{port}", registry.name)]);
        }
        super::run(self.runner.as_ref(), operation, Invocation::new("k3d", args)).await?;
        Ok(())
    }

    async fn delete(&self, existing: &Cluster) -> Result<()> {
        let name = Self::cluster_name(&existing.name);
        info!(cluster = %existing.name, "deleting k3d cluster");
        super::run(
            self.runner.as_ref(),
            format!("deleting k3d cluster {name}"),
            Invocation::new("k3d", ["cluster", "delete", name]),
        )
        .await?;
        Ok(())
    }

    async fn attach_registry(&self, desired: &Cluster, registry: &Registry) -> Result<()> {
        super::registry_container_port(registry)?;
        let network = format!("k3d-{}", Self::cluster_name(&desired.name));
        super::join_network(self.runtime.as_ref(), &network, registry).await
    }

    fn local_registry_hosting(&self, _desired: &Cluster, registry: &Registry) -> Option<LocalRegistryHosting> {
        Some(mirror::network_hosting(registry))
    }

    fn in_container_server(&self, cluster: &Cluster) -> Option<String> {
        Some(format!(
            "https://k3d-{}-serverlb:6443",
            Self::cluster_name(&cluster.name)
        ))
    }
}
