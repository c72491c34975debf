use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::domain::{Cluster, LocalRegistryHosting, Product, Registry};
use crate::error::{Error, Result};
use crate::port::outbound::{CommandRunner, ContainerRuntime, Invocation};

use super::{mirror, Admin};

const INSTALL_HELP: &str = "https://minikube.sigs.k8s.io/docs/start/";

const DEFAULT_CONTAINER_RUNTIME: &str = "containerd";

/// Points containerd at the mirror directory and restarts it.
const ENABLE_CONFIG_PATH: &str = "sed -i 's|config_path = .*|config_path = \"/etc/containerd/certs.d\"|' /etc/containerd/config.toml && systemctl restart containerd";

/// The minikube config blob.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MinikubeConfig {
    #[serde(default)]
    pub container_runtime: Option<String>,
    /// `component.key=value` entries, passed as `--extra-config`.
    #[serde(default)]
    pub extra_configs: Vec<String>,
    /// Raw flags appended to `minikube start`.
    #[serde(default)]
    pub start_flags: Vec<String>,
}

impl MinikubeConfig {
    pub fn from_cluster(desired: &Cluster) -> Result<Self> {
        match &desired.config {
            None => Ok(Self::default()),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| Error::Validation(format!("invalid minikube config: {e}"))),
        }
    }

    /// Runtime from a `--container-runtime` start flag, if one is given.
    fn runtime_from_flags(&self) -> Option<&str> {
        let mut flags = self.start_flags.iter();
        while let Some(flag) = flags.next() {
            if let Some(value) = flag.strip_prefix("--container-runtime=") {
                return Some(value);
            }
            if flag == "--container-runtime" {
                return flags.next().map(String::as_str);
            }
        }
        None
    }

    /// The effective container runtime, rejecting contradicting settings.
    pub fn container_runtime(&self) -> Result<Option<&str>> {
        match (self.container_runtime.as_deref(), self.runtime_from_flags()) {
            (Some(field), Some(flag)) if field != flag => Err(Error::Validation(format!(
                "minikube config sets containerRuntime {field:?} but startFlags set --container-runtime={flag}"
            ))),
            (Some(field), _) => Ok(Some(field)),
            (None, flag) => Ok(flag),
        }
    }
}

/// The command line for `minikube start`.
pub fn start_args(desired: &Cluster, config: &MinikubeConfig) -> Result<Vec<String>> {
    let runtime = config.container_runtime()?;
    let mut args = vec![
        "start".to_string(),
        "-p".to_string(),
        desired.name.clone(),
        "--driver=docker".to_string(),
    ];
    if config.runtime_from_flags().is_none() {
        args.push(format!(
            "--container-runtime={}",
            runtime.unwrap_or(DEFAULT_CONTAINER_RUNTIME)
        ));
    }
    if let Some(version) = &desired.kubernetes_version {
        args.push(format!("--kubernetes-version={version}"));
    }
    args.extend(config.extra_configs.iter().map(|c| format!("--extra-config={c}")));
    args.extend(config.start_flags.iter().cloned());
    Ok(args)
}

/// minikube profiles on the docker driver.
pub struct MinikubeAdmin {
    runner: Arc<dyn CommandRunner>,
    runtime: Arc<dyn ContainerRuntime>,
}

impl MinikubeAdmin {
    pub fn new(runner: Arc<dyn CommandRunner>, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runner, runtime }
    }

    fn ssh(profile: &str, script: &str) -> Invocation {
        Invocation::new("minikube", ["ssh", "-p", profile, "--", "sudo", "sh", "-c", script])
    }
}

#[async_trait]
impl Admin for MinikubeAdmin {
    fn product(&self) -> Product {
        Product::Minikube
    }

    async fn ensure_installed(&self) -> Result<()> {
        super::ensure_on_path(self.runner.as_ref(), "minikube", INSTALL_HELP)
    }

    async fn create(&self, desired: &Cluster, _registry: Option<&Registry>) -> Result<()> {
        Product::Minikube.validate_name(&desired.name)?;
        let config = MinikubeConfig::from_cluster(desired)?;
        let args = start_args(desired, &config)?;

        info!(cluster = %desired.name, "starting minikube profile");
        super::run(
            self.runner.as_ref(),
            format!("creating minikube cluster {}", desired.name),
            Invocation::new("minikube", args),
        )
        .await?;
        Ok(())
    }

    fn restarts_stopped(&self) -> bool {
        true
    }

    async fn delete(&self, existing: &Cluster) -> Result<()> {
        info!(cluster = %existing.name, "deleting minikube profile");
        super::run(
            self.runner.as_ref(),
            format!("deleting minikube cluster {}", existing.name),
            Invocation::new("minikube", ["delete", "-p", existing.name.as_str()]),
        )
        .await?;
        Ok(())
    }

    async fn attach_registry(&self, desired: &Cluster, registry: &Registry) -> Result<()> {
        super::registry_container_port(registry)?;
        super::join_network(self.runtime.as_ref(), &desired.name, registry).await?;

        let operation = format!("configuring registry mirror on minikube {}", desired.name);
        super::run(
            self.runner.as_ref(),
            operation.clone(),
            Self::ssh(&desired.name, &mirror::write_hosts_script(registry))
                .with_stdin(mirror::hosts_toml(registry)),
        )
        .await?;
        super::run(self.runner.as_ref(), operation, Self::ssh(&desired.name, ENABLE_CONFIG_PATH)).await?;
        Ok(())
    }

    fn local_registry_hosting(&self, _desired: &Cluster, registry: &Registry) -> Option<LocalRegistryHosting> {
        Some(mirror::network_hosting(registry))
    }
}
