//! Per-product cluster administration.
//!
//! Each product drives a different backend: the desktop engine's built-in
//! Kubernetes through its settings channel, or a CLI tool (`kind`, `k3d`,
//! `minikube`) through constructed command lines. Deciding *whether* to
//! create or delete belongs to the cluster controller; an admin only
//! executes what it is told.

mod docker_desktop;
mod k3d;
mod kind;
mod minikube;
pub mod mirror;
pub mod node_image;

pub use docker_desktop::DockerDesktopAdmin;
pub use k3d::K3dAdmin;
pub use kind::KindAdmin;
pub use minikube::MinikubeAdmin;

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::desktop::SettingsClient;
use crate::domain::{Cluster, LocalRegistryHosting, Product, Registry, ToolVersion};
use crate::error::{Error, Result, ToolError};
use crate::port::outbound::{CommandOutput, CommandRunner, ContainerRuntime, Invocation, Platform};

#[async_trait]
pub trait Admin: Send + Sync {
    fn product(&self) -> Product;

    /// Fail with install guidance if the backend tool is missing.
    async fn ensure_installed(&self) -> Result<()>;

    /// Create the cluster. `registry` is already running when given.
    async fn create(&self, desired: &Cluster, registry: Option<&Registry>) -> Result<()>;

    async fn delete(&self, existing: &Cluster) -> Result<()>;

    /// Whether `create` brings a stopped cluster of the same name back up.
    ///
    /// Products that refuse to create over leftover nodes answer `false`,
    /// and the controller deletes the stopped cluster first.
    fn restarts_stopped(&self) -> bool {
        false
    }

    /// Make `registry` usable from the cluster's nodes. Must be safe to repeat.
    async fn attach_registry(&self, desired: &Cluster, registry: &Registry) -> Result<()>;

    /// The discovery document to publish for `registry`, or `None` when the
    /// product has no registry discovery.
    fn local_registry_hosting(&self, desired: &Cluster, registry: &Registry) -> Option<LocalRegistryHosting>;

    /// API server address reachable from a container on the cluster's network.
    fn in_container_server(&self, _cluster: &Cluster) -> Option<String> {
        None
    }
}

/// Collaborators shared by every admin.
#[derive(Clone)]
pub struct AdminDeps {
    pub runner: Arc<dyn CommandRunner>,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub platform: Arc<dyn Platform>,
    pub settings: Option<SettingsClient>,
}

/// Build the admin for `product`.
pub fn admin_for(product: Product, deps: &AdminDeps) -> Result<Arc<dyn Admin>> {
    let admin: Arc<dyn Admin> = match product {
        Product::DockerDesktop => Arc::new(DockerDesktopAdmin::new(deps.clone())),
        Product::Kind => Arc::new(KindAdmin::new(deps.runner.clone(), deps.runtime.clone())),
        Product::K3d => Arc::new(K3dAdmin::new(deps.runner.clone(), deps.runtime.clone())),
        Product::Minikube => Arc::new(MinikubeAdmin::new(deps.runner.clone(), deps.runtime.clone())),
        Product::Unknown => {
            return Err(Error::Validation(
                "a product is required to manage a cluster".to_string(),
            ))
        }
    };
    Ok(admin)
}

pub(crate) fn ensure_on_path(
    runner: &dyn CommandRunner,
    tool: &'static str,
    help: &str,
) -> Result<()> {
    match runner.look_path(tool) {
        Some(_) => Ok(()),
        None => Err(Error::NotInstalled {
            tool,
            help: format!("Install instructions: {help}"),
        }),
    }
}

pub(crate) async fn run(
    runner: &dyn CommandRunner,
    operation: impl Into<String>,
    invocation: Invocation,
) -> Result<CommandOutput> {
    runner
        .run(&invocation)
        .await
        .map_err(|e| Error::tool(operation, e))
}

/// Run `<tool> version` and parse the first version token.
pub(crate) async fn tool_version(runner: &dyn CommandRunner, tool: &str) -> Result<ToolVersion> {
    let out = run(runner, format!("reading {tool} version"), Invocation::new(tool, ["version"])).await?;
    ToolVersion::find_in(&out.stdout).ok_or_else(|| {
        Error::tool(
            format!("reading {tool} version"),
            ToolError::Output {
                program: tool.to_string(),
                reason: format!("no version in {:?}", out.stdout.trim()),
            },
        )
    })
}

/// The registry container's port, failing if it has not been observed yet.
pub(crate) fn registry_container_port(registry: &Registry) -> Result<u16> {
    match registry.status.container_port {
        0 => Err(Error::Validation(format!(
            "registry {} has no observed container port",
            registry.name
        ))),
        port => Ok(port),
    }
}

/// Connect `registry` to `network` unless it is already a member.
pub(crate) async fn join_network(
    runtime: &dyn ContainerRuntime,
    network: &str,
    registry: &Registry,
) -> Result<()> {
    if registry.is_on_network(network) {
        return Ok(());
    }
    tracing::info!(registry = %registry.name, %network, "connecting registry to cluster network");
    runtime.connect_network(network, &registry.name).await
}
