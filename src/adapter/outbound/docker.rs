//! Container engine adapter backed by bollard.
//!
//! Connects the same way the `docker` CLI does: `DOCKER_HOST` when set,
//! otherwise the platform's default local socket or pipe.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::CreateImageOptions;
use bollard::models::{
    ContainerInspectResponse, ContainerSummary, HostConfig, PortBinding as BollardPortBinding, RestartPolicy,
    RestartPolicyNameEnum,
};
use bollard::network::{ConnectNetworkOptions, DisconnectNetworkOptions};
use bollard::Docker;
use futures_util::TryStreamExt;
use tracing::{debug, info};

use crate::domain::{ContainerState, EngineHost};
use crate::error::Result;
use crate::port::outbound::{ContainerInfo, ContainerRuntime, ContainerSpec, PortMapping};

#[cfg(unix)]
const DEFAULT_HOST: &str = "unix:///var/run/docker.sock";
#[cfg(windows)]
const DEFAULT_HOST: &str = "npipe:////./pipe/docker_engine";
#[cfg(not(any(unix, windows)))]
const DEFAULT_HOST: &str = "";

/// The container engine, through its HTTP API.
pub struct DockerRuntime {
    docker: Docker,
    host: EngineHost,
}

impl DockerRuntime {
    /// Connect using `DOCKER_HOST` or the local default.
    ///
    /// Nothing is sent until the first call; an unreachable engine shows up
    /// as an error from [`ContainerRuntime::engine_version`].
    pub fn connect() -> Result<Self> {
        let host = std::env::var("DOCKER_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let docker = Docker::connect_with_defaults()?;
        debug!(%host, "container engine client configured");
        Ok(Self {
            docker,
            host: EngineHost::new(host),
        })
    }

    async fn pull(&self, image: &str) -> Result<()> {
        info!(%image, "pulling image");
        self.docker
            .create_image(
                Some(CreateImageOptions {
                    from_image: image,
                    ..Default::default()
                }),
                None,
                None,
            )
            .try_collect::<Vec<_>>()
            .await?;
        Ok(())
    }
}

fn is_not_found(err: &BollardError) -> bool {
    matches!(err, BollardError::DockerResponseServerError { status_code: 404, .. })
}

fn btree<K: Ord, V>(map: Option<HashMap<K, V>>) -> BTreeMap<K, V> {
    map.map(|m| m.into_iter().collect()).unwrap_or_default()
}

fn from_summary(summary: ContainerSummary) -> ContainerInfo {
    let name = summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_default();
    let ports = summary
        .ports
        .unwrap_or_default()
        .into_iter()
        .map(|p| PortMapping {
            ip: p.ip,
            private_port: p.private_port,
            public_port: p.public_port,
        })
        .collect();
    let networks = summary
        .network_settings
        .and_then(|s| s.networks)
        .map(|nets| {
            nets.into_iter()
                .map(|(name, endpoint)| (name, endpoint.ip_address.unwrap_or_default()))
                .collect()
        })
        .unwrap_or_default();

    ContainerInfo {
        id: summary.id.unwrap_or_default(),
        name,
        image: summary.image.unwrap_or_default(),
        state: ContainerState::parse(summary.state.as_deref().unwrap_or_default()),
        ports,
        networks,
        labels: btree(summary.labels),
    }
}

/// Parse `5000/tcp` into `5000`.
fn container_port(key: &str) -> Option<u16> {
    key.split('/').next()?.parse().ok()
}

fn from_inspect(inspect: ContainerInspectResponse) -> ContainerInfo {
    let live_ports = inspect
        .network_settings
        .as_ref()
        .and_then(|s| s.ports.clone())
        .filter(|ports| ports.values().any(Option::is_some));
    // Stopped containers have no live ports; fall back to their configured bindings.
    let bindings = live_ports.or_else(|| inspect.host_config.as_ref().and_then(|h| h.port_bindings.clone()));

    let mut ports = Vec::new();
    for (key, bound) in bindings.unwrap_or_default() {
        let Some(private_port) = container_port(&key) else {
            continue;
        };
        match bound {
            Some(bound) if !bound.is_empty() => {
                ports.extend(bound.into_iter().map(|b| PortMapping {
                    ip: b.host_ip.filter(|ip| !ip.is_empty()),
                    private_port,
                    public_port: b.host_port.and_then(|p| p.parse().ok()),
                }));
            }
            _ => ports.push(PortMapping {
                ip: None,
                private_port,
                public_port: None,
            }),
        }
    }

    let networks = inspect
        .network_settings
        .and_then(|s| s.networks)
        .map(|nets| {
            nets.into_iter()
                .map(|(name, endpoint)| (name, endpoint.ip_address.unwrap_or_default()))
                .collect()
        })
        .unwrap_or_default();
    let (image, labels) = match inspect.config {
        Some(config) => (config.image.unwrap_or_default(), btree(config.labels)),
        None => (String::new(), BTreeMap::new()),
    };
    let state = inspect
        .state
        .and_then(|s| s.status)
        .map(|s| ContainerState::parse(&s.to_string()))
        .unwrap_or_default();

    ContainerInfo {
        id: inspect.id.unwrap_or_default(),
        name: inspect
            .name
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_default(),
        image,
        state,
        ports,
        networks,
        labels,
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    fn host(&self) -> EngineHost {
        self.host.clone()
    }

    async fn engine_version(&self) -> Result<String> {
        let version = self.docker.version().await?;
        Ok(version.version.unwrap_or_default())
    }

    async fn engine_cpus(&self) -> Result<u32> {
        let info = self.docker.info().await?;
        Ok(info
            .ncpu
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or_default())
    }

    async fn list_containers(&self, ancestor: &str) -> Result<Vec<ContainerInfo>> {
        let filters = HashMap::from([("ancestor".to_string(), vec![ancestor.to_string()])]);
        let summaries = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                filters,
                ..Default::default()
            }))
            .await?;
        Ok(summaries.into_iter().map(from_summary).collect())
    }

    async fn inspect_container(&self, id_or_name: &str) -> Result<Option<ContainerInfo>> {
        match self
            .docker
            .inspect_container(id_or_name, None::<InspectContainerOptions>)
            .await
        {
            Ok(inspect) => Ok(Some(from_inspect(inspect))),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        self.pull(&spec.image).await?;

        let mut port_bindings: HashMap<String, Option<Vec<BollardPortBinding>>> = HashMap::new();
        let mut exposed_ports = HashMap::new();
        for binding in &spec.port_bindings {
            let key = format!("{}/tcp", binding.container_port);
            exposed_ports.insert(key.clone(), HashMap::new());
            port_bindings
                .entry(key)
                .or_insert_with(|| Some(Vec::new()))
                .get_or_insert_with(Vec::new)
                .push(BollardPortBinding {
                    host_ip: Some(binding.host_ip.clone()),
                    host_port: Some(binding.host_port.to_string()),
                });
        }

        let restart_policy = spec.restart_always.then(|| RestartPolicy {
            name: Some(RestartPolicyNameEnum::ALWAYS),
            maximum_retry_count: None,
        });
        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            labels: Some(spec.labels.clone().into_iter().collect()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                restart_policy,
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: spec.name.clone(),
                    platform: None,
                }),
                config,
            )
            .await?;
        debug!(name = %spec.name, id = %created.id, "container created");
        Ok(created.id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }

    async fn connect_network(&self, network: &str, container: &str) -> Result<()> {
        self.docker
            .connect_network(
                network,
                ConnectNetworkOptions {
                    container,
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    async fn disconnect_network(&self, network: &str, container: &str) -> Result<()> {
        self.docker
            .disconnect_network(
                network,
                DisconnectNetworkOptions {
                    container,
                    force: false,
                },
            )
            .await?;
        Ok(())
    }
}
