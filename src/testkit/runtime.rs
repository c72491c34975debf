//! In-memory container engine.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{ContainerState, EngineHost};
use crate::error::{Error, Result};
use crate::port::outbound::{ContainerInfo, ContainerRuntime, ContainerSpec, PortMapping};

struct Container {
    info: ContainerInfo,
    /// Configured bindings; only listed while running.
    bindings: Vec<PortMapping>,
}

struct State {
    host: EngineHost,
    cpus: u32,
    version_failures: usize,
    version_probes: usize,
    next_id: usize,
    next_ip: u8,
    containers: Vec<Container>,
    mutations: Vec<String>,
}

/// Containers live in a list; every mutating call is recorded.
pub struct FakeRuntime {
    state: Mutex<State>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                host: EngineHost::new("unix:///var/run/docker.sock"),
                cpus: 4,
                version_failures: 0,
                version_probes: 0,
                next_id: 1,
                next_ip: 2,
                containers: Vec::new(),
                mutations: Vec::new(),
            }),
        }
    }

    #[must_use]
    pub fn with_host(self, host: &str) -> Self {
        self.state.lock().host = EngineHost::new(host);
        self
    }

    #[must_use]
    pub fn with_cpus(self, cpus: u32) -> Self {
        self.state.lock().cpus = cpus;
        self
    }

    pub fn set_cpus(&self, cpus: u32) {
        self.state.lock().cpus = cpus;
    }

    /// Make the next `n` version probes fail.
    pub fn fail_version_probes(&self, n: usize) {
        self.state.lock().version_failures = n;
    }

    /// Never answer a version probe.
    pub fn go_offline(&self) {
        self.state.lock().version_failures = usize::MAX;
    }

    pub fn version_probes(&self) -> usize {
        self.state.lock().version_probes
    }

    /// Seed a container. Its ports are published on `host_port` when given.
    pub fn add_container(&self, name: &str, image: &str, host_port: Option<u16>, state: ContainerState) -> String {
        let mut s = self.state.lock();
        let id = format!("ctr-{}", s.next_id);
        s.next_id += 1;
        let bindings = host_port
            .map(|port| {
                vec![PortMapping {
                    ip: Some("127.0.0.1".to_string()),
                    private_port: 5000,
                    public_port: Some(port),
                }]
            })
            .unwrap_or_default();
        s.containers.push(Container {
            info: ContainerInfo {
                id: id.clone(),
                name: name.to_string(),
                image: image.to_string(),
                state,
                ..ContainerInfo::default()
            },
            bindings,
        });
        id
    }

    pub fn set_state(&self, name: &str, state: ContainerState) {
        let mut s = self.state.lock();
        if let Some(c) = s.containers.iter_mut().find(|c| c.info.name == name) {
            c.info.state = state;
        }
    }

    /// Mutating calls in order, e.g. `create kind-registry` or `remove ctr-1`.
    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().mutations.clone()
    }

    pub fn container(&self, name: &str) -> Option<ContainerInfo> {
        let s = self.state.lock();
        s.containers
            .iter()
            .find(|c| c.info.name == name)
            .map(|c| ContainerInfo {
                ports: c.bindings.clone(),
                ..c.info.clone()
            })
    }

    fn position(state: &State, id_or_name: &str) -> Option<usize> {
        state
            .containers
            .iter()
            .position(|c| c.info.id == id_or_name || c.info.name == id_or_name)
    }
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_ancestor(image: &str, ancestor: &str) -> bool {
    image == ancestor || image.ends_with(&format!("/{ancestor}"))
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    fn host(&self) -> EngineHost {
        self.state.lock().host.clone()
    }

    async fn engine_version(&self) -> Result<String> {
        let mut s = self.state.lock();
        s.version_probes += 1;
        if s.version_failures > 0 {
            if s.version_failures != usize::MAX {
                s.version_failures -= 1;
            }
            return Err(Error::Unreachable {
                host: s.host.as_str().to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok("27.3.1".to_string())
    }

    async fn engine_cpus(&self) -> Result<u32> {
        Ok(self.state.lock().cpus)
    }

    async fn list_containers(&self, ancestor: &str) -> Result<Vec<ContainerInfo>> {
        let s = self.state.lock();
        Ok(s.containers
            .iter()
            .filter(|c| matches_ancestor(&c.info.image, ancestor))
            .map(|c| {
                let mut info = c.info.clone();
                if info.state == ContainerState::Running {
                    info.ports = c.bindings.clone();
                }
                info
            })
            .collect())
    }

    async fn inspect_container(&self, id_or_name: &str) -> Result<Option<ContainerInfo>> {
        let s = self.state.lock();
        Ok(Self::position(&s, id_or_name).map(|i| {
            let c = &s.containers[i];
            ContainerInfo {
                ports: c.bindings.clone(),
                ..c.info.clone()
            }
        }))
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let mut s = self.state.lock();
        if Self::position(&s, &spec.name).is_some() {
            return Err(Error::Validation(format!(
                "conflict: container name {} is already in use",
                spec.name
            )));
        }
        let id = format!("ctr-{}", s.next_id);
        s.next_id += 1;
        s.mutations.push(format!("create {}", spec.name));
        let bindings = spec
            .port_bindings
            .iter()
            .map(|b| PortMapping {
                ip: Some(b.host_ip.clone()),
                private_port: b.container_port,
                public_port: Some(b.host_port),
            })
            .collect();
        s.containers.push(Container {
            info: ContainerInfo {
                id: id.clone(),
                name: spec.name.clone(),
                image: spec.image.clone(),
                state: ContainerState::Created,
                labels: spec.labels.clone(),
                ..ContainerInfo::default()
            },
            bindings,
        });
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        let mut s = self.state.lock();
        let i = Self::position(&s, id).ok_or_else(|| Error::NotFound(format!("container {id}")))?;
        s.containers[i].info.state = ContainerState::Running;
        s.mutations.push(format!("start {id}"));
        Ok(())
    }

    async fn remove_container(&self, id: &str, _force: bool) -> Result<()> {
        let mut s = self.state.lock();
        let i = Self::position(&s, id).ok_or_else(|| Error::NotFound(format!("container {id}")))?;
        s.containers.remove(i);
        s.mutations.push(format!("remove {id}"));
        Ok(())
    }

    async fn connect_network(&self, network: &str, container: &str) -> Result<()> {
        let mut s = self.state.lock();
        let i = Self::position(&s, container).ok_or_else(|| Error::NotFound(format!("container {container}")))?;
        let ip = format!("172.18.0.{}", s.next_ip);
        s.next_ip = s.next_ip.wrapping_add(1);
        let networks: &mut BTreeMap<String, String> = &mut s.containers[i].info.networks;
        networks.insert(network.to_string(), ip);
        s.mutations.push(format!("connect {network} {container}"));
        Ok(())
    }

    async fn disconnect_network(&self, network: &str, container: &str) -> Result<()> {
        let mut s = self.state.lock();
        let i = Self::position(&s, container).ok_or_else(|| Error::NotFound(format!("container {container}")))?;
        s.containers[i].info.networks.remove(network);
        s.mutations.push(format!("disconnect {network} {container}"));
        Ok(())
    }
}
