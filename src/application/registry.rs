//! Registry reconciliation.
//!
//! Registries are not recorded anywhere: a registry exists exactly when a
//! container built from the registry image exists.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::domain::registry::{
    DEFAULT_LISTEN_ADDRESS, DEFAULT_REGISTRY_IMAGE, DEFAULT_REGISTRY_NAME, REGISTRY_ANCESTOR,
    REGISTRY_CONTAINER_PORT,
};
use crate::domain::{ContainerState, FieldSelector, Registry, RegistryStatus};
use crate::error::{Error, Result};
use crate::port::outbound::{ContainerInfo, ContainerRuntime, ContainerSpec, PortBinding, PortForwarder};

/// Bind address on a remote engine, where a loopback port is out of the
/// forwarder's reach.
const REMOTE_ENGINE_LISTEN_ADDRESS: &str = "0.0.0.0";

/// Image and bind address for registries that do not set their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryDefaults {
    pub image: String,
    pub listen_address: String,
}

impl Default for RegistryDefaults {
    fn default() -> Self {
        Self {
            image: DEFAULT_REGISTRY_IMAGE.to_string(),
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
        }
    }
}

pub struct RegistryController {
    runtime: Arc<dyn ContainerRuntime>,
    forwarder: Option<Arc<dyn PortForwarder>>,
    defaults: RegistryDefaults,
}

impl RegistryController {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, defaults: RegistryDefaults) -> Self {
        Self {
            runtime,
            forwarder: None,
            defaults,
        }
    }

    #[must_use]
    pub fn with_forwarder(mut self, forwarder: Arc<dyn PortForwarder>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    pub async fn list(&self, selector: &FieldSelector) -> Result<Vec<Registry>> {
        let containers = self.runtime.list_containers(REGISTRY_ANCESTOR).await?;
        let mut registries: Vec<Registry> = containers
            .into_iter()
            .map(registry_from_container)
            .filter(|r| {
                let state = r.status.state.to_string();
                selector.matches(|field| match field {
                    "name" => Some(r.name.as_str()),
                    "image" => r.image.as_deref(),
                    "state" => Some(state.as_str()),
                    _ => None,
                })
            })
            .collect();
        registries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(registries)
    }

    pub async fn get(&self, name: &str) -> Result<Registry> {
        self.list(&FieldSelector::field_equals("name", name))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("registry {name}")))
    }

    async fn find(&self, name: &str) -> Result<Option<Registry>> {
        match self.get(name).await {
            Ok(registry) => Ok(Some(registry)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Converge the registry container to `desired` and return it as observed.
    pub async fn apply(&self, desired: &Registry) -> Result<Registry> {
        let mut desired = desired.clone();
        if desired.name.is_empty() {
            desired.name = DEFAULT_REGISTRY_NAME.to_string();
        }

        let listen_address = self.listen_address(&desired);
        let mut port = desired.port;
        if let Some(existing) = self.find(&desired.name).await? {
            let port_changed = desired.port.is_some_and(|p| p != existing.status.host_port);
            let listen_changed = !existing.status.listen_address.is_empty()
                && existing.status.listen_address != listen_address;
            let running = existing.status.state == ContainerState::Running;
            if running && !port_changed && !listen_changed {
                debug!(registry = %existing.name, port = existing.status.host_port, "registry up to date");
                self.maybe_forward(existing.status.host_port).await?;
                return Ok(existing);
            }

            if port.is_none() {
                port = self.previous_port(&existing).await?;
            }
            info!(
                registry = %existing.name,
                state = %existing.status.state,
                old_port = existing.status.host_port,
                "recreating registry"
            );
            self.runtime.remove_container(&existing.status.container_id, true).await?;
        }

        let host_port = match port {
            Some(port) => port,
            None => free_port().await?,
        };
        let spec = ContainerSpec {
            name: desired.name.clone(),
            image: desired.image.clone().unwrap_or_else(|| self.defaults.image.clone()),
            env: desired.env.clone(),
            labels: desired.labels.clone(),
            port_bindings: vec![PortBinding {
                host_ip: listen_address,
                host_port,
                container_port: REGISTRY_CONTAINER_PORT,
            }],
            restart_always: true,
        };
        info!(registry = %spec.name, image = %spec.image, port = host_port, "starting registry");
        let id = self.runtime.create_container(&spec).await?;
        self.runtime.start_container(&id).await?;
        self.maybe_forward(host_port).await?;

        self.get(&desired.name).await
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        let registry = self.get(name).await?;
        info!(registry = %name, "deleting registry");
        self.runtime.remove_container(&registry.status.container_id, true).await
    }

    /// Where to publish the registry port. An explicit address wins; on a
    /// remote engine the port must be reachable from this machine.
    fn listen_address(&self, desired: &Registry) -> String {
        if let Some(address) = &desired.listen_address {
            return address.clone();
        }
        if self.runtime.host().is_local() {
            self.defaults.listen_address.clone()
        } else {
            REMOTE_ENGINE_LISTEN_ADDRESS.to_string()
        }
    }

    /// Host port a stopped registry was bound to. Stopped containers do not
    /// list their ports, so fall back to the container's configured bindings.
    async fn previous_port(&self, existing: &Registry) -> Result<Option<u16>> {
        if existing.status.host_port != 0 {
            return Ok(Some(existing.status.host_port));
        }
        let inspected = self.runtime.inspect_container(&existing.status.container_id).await?;
        Ok(inspected
            .map(registry_from_container)
            .map(|r| r.status.host_port)
            .filter(|port| *port != 0))
    }

    async fn maybe_forward(&self, port: u16) -> Result<()> {
        let host = self.runtime.host();
        if host.is_local() {
            return Ok(());
        }
        let Some(remote) = host.hostname() else {
            warn!(host = %host.as_str(), "cannot forward registry port: engine host has no hostname");
            return Ok(());
        };
        match &self.forwarder {
            Some(forwarder) => forwarder.forward(port, &remote).await,
            None => {
                warn!(%remote, port, "registry is on a remote engine and no forwarder is configured");
                Ok(())
            }
        }
    }
}

/// Pick a free host port.
pub async fn free_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    Ok(listener.local_addr()?.port())
}

fn registry_from_container(container: ContainerInfo) -> Registry {
    let mut warnings = Vec::new();
    let published: Vec<_> = container
        .ports
        .iter()
        .filter(|p| p.private_port == REGISTRY_CONTAINER_PORT && p.public_port.is_some())
        .collect();

    let (host_port, listen_address) = match published.as_slice() {
        [] => {
            if container.state == ContainerState::Running {
                warnings.push(format!(
                    "registry port {REGISTRY_CONTAINER_PORT} is not published on the host"
                ));
            }
            (0, String::new())
        }
        [first, rest @ ..] => {
            if rest.iter().any(|p| p.public_port != first.public_port) {
                warnings.push(format!(
                    "registry port {REGISTRY_CONTAINER_PORT} is published on several host ports; using {}",
                    first.public_port.unwrap_or_default()
                ));
            }
            (
                first.public_port.unwrap_or_default(),
                first.ip.clone().unwrap_or_default(),
            )
        }
    };
    if container.ports.iter().any(|p| p.private_port != REGISTRY_CONTAINER_PORT) {
        warnings.push("registry container exposes unexpected ports".to_string());
    }

    let ip_address = container
        .networks
        .values()
        .find(|ip| !ip.is_empty())
        .cloned()
        .unwrap_or_default();

    Registry {
        name: container.name,
        port: (host_port != 0).then_some(host_port),
        image: Some(container.image),
        listen_address: (!listen_address.is_empty()).then(|| listen_address.clone()),
        labels: container.labels,
        env: Vec::new(),
        status: RegistryStatus {
            container_id: container.id,
            host_port,
            container_port: REGISTRY_CONTAINER_PORT,
            listen_address,
            ip_address,
            networks: container.networks.into_keys().collect(),
            state: container.state,
            warnings,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::outbound::PortMapping;

    fn container(ports: Vec<PortMapping>, state: ContainerState) -> ContainerInfo {
        ContainerInfo {
            id: "abc123".into(),
            name: "kind-registry".into(),
            image: "registry:2".into(),
            state,
            ports,
            networks: [("kind".to_string(), "172.18.0.4".to_string())].into_iter().collect(),
            labels: Default::default(),
        }
    }

    #[test]
    fn derives_host_port_from_registry_port() {
        let registry = registry_from_container(container(
            vec![PortMapping {
                ip: Some("127.0.0.1".into()),
                private_port: 5000,
                public_port: Some(5001),
            }],
            ContainerState::Running,
        ));

        assert_eq!(registry.status.host_port, 5001);
        assert_eq!(registry.status.listen_address, "127.0.0.1");
        assert_eq!(registry.status.networks, vec!["kind".to_string()]);
        assert_eq!(registry.status.ip_address, "172.18.0.4");
        assert!(registry.status.warnings.is_empty());
    }

    #[test]
    fn unexpected_port_shape_warns_instead_of_failing() {
        let registry = registry_from_container(container(
            vec![PortMapping {
                ip: None,
                private_port: 8080,
                public_port: Some(8080),
            }],
            ContainerState::Running,
        ));

        assert_eq!(registry.status.host_port, 0);
        assert_eq!(registry.status.warnings.len(), 2);
    }

    #[tokio::test]
    async fn free_port_is_nonzero() {
        assert_ne!(free_port().await.unwrap(), 0);
    }
}
