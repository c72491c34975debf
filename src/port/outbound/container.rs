//! Container engine port.
//!
//! The only channel for observing and mutating containers.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::{ContainerState, EngineHost};
use crate::error::Result;

/// One published (or unpublished) container port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortMapping {
    /// Host address the port is bound to.
    pub ip: Option<String>,
    pub private_port: u16,
    pub public_port: Option<u16>,
}

/// A container as listed or inspected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerInfo {
    pub id: String,
    /// Name without the leading slash.
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    pub ports: Vec<PortMapping>,
    /// Network name to the container's address on it.
    pub networks: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
}

/// A host port to publish a container port on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub host_ip: String,
    pub host_port: u16,
    pub container_port: u16,
}

/// Everything needed to create a container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub port_bindings: Vec<PortBinding>,
    /// Restart with the engine.
    pub restart_always: bool,
}

/// Container engine operations.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Address of the engine this client talks to.
    fn host(&self) -> EngineHost;

    /// Engine version. Doubles as the reachability probe.
    async fn engine_version(&self) -> Result<String>;

    /// CPUs available to the engine.
    async fn engine_cpus(&self) -> Result<u32>;

    /// All containers (running or not) created from `ancestor` or its descendants.
    async fn list_containers(&self, ancestor: &str) -> Result<Vec<ContainerInfo>>;

    /// Look up a container by id or name. `None` if it does not exist.
    async fn inspect_container(&self, id_or_name: &str) -> Result<Option<ContainerInfo>>;

    /// Create (pulling the image if needed) and return the container id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    async fn start_container(&self, id: &str) -> Result<()>;

    async fn remove_container(&self, id: &str, force: bool) -> Result<()>;

    async fn connect_network(&self, network: &str, container: &str) -> Result<()>;

    async fn disconnect_network(&self, network: &str, container: &str) -> Result<()>;
}
