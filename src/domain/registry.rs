//! Desired and observed registry state.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Registry name used when the desired spec leaves it empty.
pub const DEFAULT_REGISTRY_NAME: &str = "devcluster-registry";

/// Image the registry runs by default.
pub const DEFAULT_REGISTRY_IMAGE: &str = "docker.io/library/registry:2";

/// Image ancestor used to discover registry containers.
pub const REGISTRY_ANCESTOR: &str = "registry:2";

/// Port the registry image listens on inside its container.
pub const REGISTRY_CONTAINER_PORT: u16 = 5000;

/// Host address the registry port is published on by default.
pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1";

/// A local container registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    #[serde(default)]
    pub name: String,
    /// Host port. `None` means "keep the current one, or pick a free one".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_address: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Environment for the registry container, as `KEY=value`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(default)]
    pub status: RegistryStatus,
}

/// Live facts about a registry container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatus {
    pub container_id: String,
    pub host_port: u16,
    pub container_port: u16,
    pub listen_address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip_address: String,
    #[serde(default)]
    pub networks: Vec<String>,
    pub state: ContainerState,
    /// Things that looked off while observing the container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Registry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Address the registry is reachable at from the workstation.
    pub fn host_address(&self) -> String {
        format!("localhost:{}", self.status.host_port)
    }

    /// Address the registry is reachable at from a container on a shared network.
    pub fn cluster_network_address(&self) -> String {
        format!("{}:{}", self.name, self.status.container_port)
    }

    pub fn is_on_network(&self, network: &str) -> bool {
        self.status.networks.iter().any(|n| n == network)
    }
}

/// Container lifecycle state as reported by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    #[default]
    Unknown,
}

impl ContainerState {
    pub fn parse(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            "removing" => ContainerState::Removing,
            "exited" => ContainerState::Exited,
            "dead" => ContainerState::Dead,
            _ => ContainerState::Unknown,
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
            ContainerState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
