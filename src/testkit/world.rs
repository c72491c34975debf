//! A scripted workstation: kubeconfig, clusters and backend CLIs in memory.
//!
//! [`FakeWorld`] plays three roles at once so that one piece of state backs
//! them all: the kubeconfig ([`ContextStore`]), the Kubernetes API
//! ([`ClusterInspector`]) and the external tools ([`CommandRunner`]). The
//! tool emulation understands just enough of `kind`, `k3d`, `minikube` and
//! `kubectl apply` for the controllers to observe the effects of their own
//! commands.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::ConfigMap;
use parking_lot::Mutex;

use crate::domain::{LocalRegistryHosting, MINIKUBE_PROVIDER};
use crate::error::{Error, Result, ToolError};
use crate::port::outbound::kube::{
    CLUSTER_CONFIG_CONFIGMAP, CLUSTER_CONFIG_KEY, LOCAL_REGISTRY_HOSTING_CONFIGMAP,
    LOCAL_REGISTRY_HOSTING_KEY,
};
use crate::port::outbound::{
    ClusterInspector, CommandOutput, CommandRunner, ContextStore, Invocation, KubeContext,
};

pub const DEFAULT_KUBERNETES_VERSION: &str = "v1.29.2";

const DOCKER_DESKTOP: &str = "docker-desktop";
const DOCKER_DESKTOP_SERVER: &str = "https://kubernetes.docker.internal:6443";

struct FakeCluster {
    /// Stopped clusters keep their nodes but do not answer.
    running: bool,
    created: DateTime<Utc>,
    version: String,
    config_maps: BTreeMap<String, BTreeMap<String, String>>,
}

struct State {
    contexts: BTreeMap<String, KubeContext>,
    current: Option<String>,
    clusters: BTreeMap<String, FakeCluster>,
    invocations: Vec<Invocation>,
    spawned: Vec<Invocation>,
    config_files: Vec<String>,
    tool_versions: BTreeMap<String, String>,
    uninstalled: BTreeSet<String>,
    failing: Vec<(String, Vec<String>)>,
    fail_hosting: bool,
    invalidations: usize,
    next_port: u16,
    /// Context checks the desktop Kubernetes takes to come up once enabled;
    /// `None` means it never does.
    desktop_boot_checks: Option<usize>,
    desktop_booting: Option<usize>,
}

impl State {
    fn add_context(&mut self, name: &str, server: &str) {
        let provider = server
            .starts_with("https://192.168.49.")
            .then(|| MINIKUBE_PROVIDER.to_string());
        self.contexts.insert(
            name.to_string(),
            KubeContext {
                name: name.to_string(),
                cluster: name.to_string(),
                server: Some(server.to_string()),
                provider,
                current: false,
            },
        );
    }

    fn add_cluster(&mut self, name: &str, server: &str, version: &str) {
        self.add_context(name, server);
        self.clusters.insert(
            name.to_string(),
            FakeCluster {
                running: true,
                created: Utc::now(),
                version: version.to_string(),
                config_maps: BTreeMap::new(),
            },
        );
    }

    fn remove_cluster(&mut self, name: &str) -> bool {
        self.contexts.remove(name);
        if self.current.as_deref() == Some(name) {
            self.current = None;
        }
        self.clusters.remove(name).is_some()
    }

    fn set_desktop_kubernetes(&mut self, enabled: bool) {
        let running = self.clusters.get(DOCKER_DESKTOP).is_some_and(|c| c.running);
        if enabled {
            if !running && self.desktop_booting.is_none() {
                self.desktop_booting = self.desktop_boot_checks;
            }
        } else {
            self.desktop_booting = None;
            if let Some(cluster) = self.clusters.get_mut(DOCKER_DESKTOP) {
                cluster.running = false;
            }
        }
    }

    /// Advance a pending desktop Kubernetes start by one check.
    fn tick_desktop(&mut self) {
        let Some(left) = self.desktop_booting else {
            return;
        };
        if left > 1 {
            self.desktop_booting = Some(left - 1);
            return;
        }
        self.desktop_booting = None;
        match self.clusters.get_mut(DOCKER_DESKTOP) {
            Some(cluster) => cluster.running = true,
            None => self.add_cluster(DOCKER_DESKTOP, DOCKER_DESKTOP_SERVER, DEFAULT_KUBERNETES_VERSION),
        }
        if !self.contexts.contains_key(DOCKER_DESKTOP) {
            self.add_context(DOCKER_DESKTOP, DOCKER_DESKTOP_SERVER);
        }
    }

    fn local_server(&mut self) -> String {
        let port = self.next_port;
        self.next_port += 1;
        format!("https://127.0.0.1:{port}")
    }

    fn version_output(&self, program: &str) -> String {
        let version = self.tool_versions.get(program).map(String::as_str).unwrap_or("");
        match program {
            "kind" => format!("kind {version} go1.22.1 linux/amd64\n"),
            "k3d" => format!("k3d version {version}\nk3s version v1.29.6-k3s2 (default)\n"),
            _ => format!("{program} version {version}\n"),
        }
    }
}

/// A cheap handle; clones share state.
#[derive(Clone)]
pub struct FakeWorld {
    state: Arc<Mutex<State>>,
}

impl Default for FakeWorld {
    fn default() -> Self {
        Self::new()
    }
}

fn exit(program: &str, stderr: impl Into<String>) -> ToolError {
    ToolError::Exit {
        program: program.to_string(),
        code: Some(1),
        stderr: stderr.into(),
    }
}

/// Kubernetes version baked into a `kindest/node` or `rancher/k3s` image tag.
fn version_from_image(image: &str) -> Option<String> {
    let tag = image.rsplit_once(':')?.1;
    let tag = tag.split('@').next()?;
    Some(tag.split("-k3s").next()?.to_string())
}

impl FakeWorld {
    pub fn new() -> Self {
        let tool_versions = [("kind", "v0.22.0"), ("k3d", "v5.6.0"), ("minikube", "v1.33.1")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            state: Arc::new(Mutex::new(State {
                contexts: BTreeMap::new(),
                current: None,
                clusters: BTreeMap::new(),
                invocations: Vec::new(),
                spawned: Vec::new(),
                config_files: Vec::new(),
                tool_versions,
                uninstalled: BTreeSet::new(),
                failing: Vec::new(),
                fail_hosting: false,
                invalidations: 0,
                next_port: 40000,
                desktop_boot_checks: Some(3),
                desktop_booting: None,
            })),
        }
    }

    /// A running cluster with a kubeconfig context of the same name.
    pub fn add_cluster(&self, name: &str, server: &str, version: &str) {
        self.state.lock().add_cluster(name, server, version);
    }

    /// A cluster whose nodes still exist but do not answer.
    pub fn add_stopped_cluster(&self, name: &str, server: &str) {
        let mut state = self.state.lock();
        state.add_cluster(name, server, DEFAULT_KUBERNETES_VERSION);
        if let Some(cluster) = state.clusters.get_mut(name) {
            cluster.running = false;
        }
    }

    /// A kubeconfig context with no cluster behind it.
    pub fn add_orphan_context(&self, name: &str, server: &str) {
        self.state.lock().add_context(name, server);
    }

    /// The desktop engine switched its Kubernetes on or off.
    pub fn set_desktop_kubernetes(&self, enabled: bool) {
        self.state.lock().set_desktop_kubernetes(enabled);
    }

    /// How many kubeconfig reads the desktop Kubernetes needs before its
    /// context appears; `None` keeps it from ever starting.
    pub fn set_desktop_boot_checks(&self, checks: Option<usize>) {
        self.state.lock().desktop_boot_checks = checks;
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.state.lock().clusters.get(name).is_some_and(|c| c.running)
    }

    pub fn has_cluster(&self, name: &str) -> bool {
        self.state.lock().clusters.contains_key(name)
    }

    pub fn fail_hosting_lookups(&self) {
        self.state.lock().fail_hosting = true;
    }

    /// Make commands of `program` whose arguments start with `prefix` exit 1.
    pub fn fail_command(&self, program: &str, prefix: &[&str]) {
        self.state
            .lock()
            .failing
            .push((program.to_string(), prefix.iter().map(|s| s.to_string()).collect()));
    }

    pub fn set_tool_version(&self, program: &str, version: &str) {
        self.state
            .lock()
            .tool_versions
            .insert(program.to_string(), version.to_string());
    }

    pub fn uninstall(&self, program: &str) {
        self.state.lock().uninstalled.insert(program.to_string());
    }

    pub fn context(&self, name: &str) -> Option<KubeContext> {
        let state = self.state.lock();
        state.contexts.get(name).map(|c| KubeContext {
            current: state.current.as_deref() == Some(name),
            ..c.clone()
        })
    }

    pub fn current_context(&self) -> Option<String> {
        self.state.lock().current.clone()
    }

    /// Data of a ConfigMap applied to `cluster`.
    pub fn config_map(&self, cluster: &str, name: &str) -> Option<BTreeMap<String, String>> {
        self.state
            .lock()
            .clusters
            .get(cluster)
            .and_then(|c| c.config_maps.get(name).cloned())
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.state.lock().invocations.clone()
    }

    /// Invocations of `program` whose arguments start with `prefix`.
    pub fn calls(&self, program: &str, prefix: &[&str]) -> Vec<Invocation> {
        self.state
            .lock()
            .invocations
            .iter()
            .filter(|i| i.program == program && i.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn spawned(&self) -> Vec<Invocation> {
        self.state.lock().spawned.clone()
    }

    /// Contents of every `--config` file a tool read, in order.
    pub fn config_files(&self) -> Vec<String> {
        self.state.lock().config_files.clone()
    }

    pub fn invalidations(&self) -> usize {
        self.state.lock().invalidations
    }

    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        Arc::new(self.clone())
    }

    pub fn inspector(&self) -> Arc<dyn ClusterInspector> {
        Arc::new(self.clone())
    }

    pub fn contexts(&self) -> Arc<dyn ContextStore> {
        Arc::new(self.clone())
    }

    fn emulate(state: &mut State, invocation: &Invocation) -> std::result::Result<String, ToolError> {
        let program = invocation.program.as_str();
        let args: Vec<&str> = invocation.args.iter().map(String::as_str).collect();
        match (program, args.as_slice()) {
            (_, ["version", ..]) => Ok(state.version_output(program)),

            ("kind", ["create", "cluster", "--name", name, ..]) => {
                let context = format!("kind-{name}");
                if state.clusters.contains_key(&context) {
                    return Err(exit(
                        "kind",
                        format!("node(s) already exist for a cluster with the name \"{name}\""),
                    ));
                }
                let version = invocation
                    .flag_value("--image")
                    .and_then(version_from_image)
                    .unwrap_or_else(|| DEFAULT_KUBERNETES_VERSION.to_string());
                let server = state.local_server();
                state.add_cluster(&context, &server, &version);
                state.current = Some(context);
                Ok(String::new())
            }
            ("kind", ["get", "nodes", "--name", name]) => Ok(format!("{name}-control-plane\n")),
            ("kind", ["delete", "cluster", "--name", name]) => {
                state.remove_cluster(&format!("kind-{name}"));
                Ok(String::new())
            }

            ("k3d", ["cluster", "create", name, ..]) => {
                let context = format!("k3d-{name}");
                if state.clusters.contains_key(&context) {
                    return Err(exit("k3d", format!("Failed to create cluster '{name}' because a cluster with that name already exists")));
                }
                let image = match invocation.flag_value("--config") {
                    Some(path) => {
                        let text = std::fs::read_to_string(path)
                            .map_err(|e| exit("k3d", format!("reading config {path}: {e}")))?;
                        let image = serde_yaml::from_str::<serde_json::Value>(&text)
                            .ok()
                            .and_then(|config| config["image"].as_str().map(str::to_string));
                        state.config_files.push(text);
                        image
                    }
                    None => invocation.flag_value("--image").map(str::to_string),
                };
                let version = image
                    .as_deref()
                    .and_then(version_from_image)
                    .unwrap_or_else(|| DEFAULT_KUBERNETES_VERSION.to_string());
                let server = state.local_server();
                state.add_cluster(&context, &server, &version);
                state.current = Some(context);
                Ok(String::new())
            }
            ("k3d", ["cluster", "delete", name]) => {
                state.remove_cluster(&format!("k3d-{name}"));
                Ok(String::new())
            }

            ("minikube", ["start", "-p", name, ..]) => {
                let version = args
                    .iter()
                    .find_map(|a| a.strip_prefix("--kubernetes-version="))
                    .unwrap_or(DEFAULT_KUBERNETES_VERSION)
                    .to_string();
                match state.clusters.get_mut(*name) {
                    Some(cluster) => cluster.running = true,
                    None => state.add_cluster(name, "https://192.168.49.2:8443", &version),
                }
                state.current = Some(name.to_string());
                Ok(String::new())
            }
            ("minikube", ["delete", "-p", name]) => {
                state.remove_cluster(name);
                Ok(String::new())
            }

            ("kubectl", ["--context", context, "apply", "-f", "-"]) => {
                let manifest = invocation.stdin_text().unwrap_or_default();
                let config_map: ConfigMap = serde_yaml::from_str(manifest)
                    .map_err(|e| exit("kubectl", format!("error parsing manifest: {e}")))?;
                let cluster = state
                    .clusters
                    .get_mut(*context)
                    .filter(|c| c.running)
                    .ok_or_else(|| exit("kubectl", format!("context {context} is unreachable")))?;
                let name = config_map.metadata.name.unwrap_or_default();
                cluster
                    .config_maps
                    .insert(name.clone(), config_map.data.unwrap_or_default());
                Ok(format!("configmap/{name} configured\n"))
            }

            _ => Ok(String::new()),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeWorld {
    fn look_path(&self, program: &str) -> Option<PathBuf> {
        let state = self.state.lock();
        (!state.uninstalled.contains(program)).then(|| PathBuf::from(format!("/usr/local/bin/{program}")))
    }

    async fn run(&self, invocation: &Invocation) -> std::result::Result<CommandOutput, ToolError> {
        let mut state = self.state.lock();
        state.invocations.push(invocation.clone());
        if state.uninstalled.contains(&invocation.program) {
            return Err(ToolError::Spawn {
                program: invocation.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            });
        }
        let fails = state.failing.iter().any(|(program, prefix)| {
            *program == invocation.program
                && invocation.starts_with(&prefix.iter().map(String::as_str).collect::<Vec<_>>())
        });
        if fails {
            return Err(exit(&invocation.program, "injected failure"));
        }
        Self::emulate(&mut state, invocation).map(CommandOutput::stdout)
    }

    async fn spawn_detached(&self, invocation: &Invocation) -> std::result::Result<(), ToolError> {
        self.state.lock().spawned.push(invocation.clone());
        Ok(())
    }
}

impl ContextStore for FakeWorld {
    fn contexts(&self) -> Result<Vec<KubeContext>> {
        let mut state = self.state.lock();
        state.tick_desktop();
        Ok(state
            .contexts
            .values()
            .map(|c| KubeContext {
                current: state.current.as_deref() == Some(c.name.as_str()),
                ..c.clone()
            })
            .collect())
    }

    fn delete_context(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.contexts.remove(name);
        if state.current.as_deref() == Some(name) {
            state.current = None;
        }
        Ok(())
    }

    fn use_context(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state.contexts.contains_key(name) {
            return Err(Error::NotFound(format!("context {name}")));
        }
        state.current = Some(name.to_string());
        Ok(())
    }

    fn set_server(&self, context: &str, server: &str) -> Result<()> {
        let mut state = self.state.lock();
        let entry = state
            .contexts
            .get_mut(context)
            .ok_or_else(|| Error::NotFound(format!("context {context}")))?;
        entry.server = Some(server.to_string());
        Ok(())
    }
}

impl FakeWorld {
    fn with_cluster<T>(&self, context: &str, f: impl FnOnce(&FakeCluster) -> Result<T>) -> Result<T> {
        let state = self.state.lock();
        let cluster = state
            .clusters
            .get(context)
            .filter(|c| c.running)
            .ok_or_else(|| Error::Unreachable {
                host: format!("context {context}"),
                reason: "connection refused".to_string(),
            })?;
        f(cluster)
    }
}

#[async_trait]
impl ClusterInspector for FakeWorld {
    async fn earliest_node_creation(&self, context: &str) -> Result<Option<DateTime<Utc>>> {
        self.with_cluster(context, |c| Ok(Some(c.created)))
    }

    async fn local_registry_hosting(&self, context: &str) -> Result<Option<LocalRegistryHosting>> {
        if self.state.lock().fail_hosting {
            return Err(Error::Validation("configmaps is forbidden".to_string()));
        }
        self.with_cluster(context, |c| {
            match c
                .config_maps
                .get(LOCAL_REGISTRY_HOSTING_CONFIGMAP)
                .and_then(|data| data.get(LOCAL_REGISTRY_HOSTING_KEY))
            {
                Some(doc) => Ok(Some(serde_yaml::from_str(doc)?)),
                None => Ok(None),
            }
        })
    }

    async fn server_version(&self, context: &str) -> Result<String> {
        self.with_cluster(context, |c| Ok(c.version.clone()))
    }

    async fn recorded_config(&self, context: &str) -> Result<Option<serde_json::Value>> {
        self.with_cluster(context, |c| {
            match c
                .config_maps
                .get(CLUSTER_CONFIG_CONFIGMAP)
                .and_then(|data| data.get(CLUSTER_CONFIG_KEY))
            {
                Some(doc) => Ok(Some(serde_json::from_str(doc)?)),
                None => Ok(None),
            }
        })
    }

    fn invalidate(&self, _context: &str) {
        self.state.lock().invalidations += 1;
    }
}
