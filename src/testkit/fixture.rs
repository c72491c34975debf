//! Canonical collaborators and a fully wired controller pair.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::application::admin::AdminDeps;
use crate::application::desktop::SettingsClient;
use crate::application::machine::MachineTiming;
use crate::application::retry::RetryPolicy;
use crate::application::{ClusterController, ControllerContext, RegistryController, RegistryDefaults};
use crate::domain::{ContainerState, Registry, RegistryStatus};
use crate::port::outbound::{CommandRunner, ContainerRuntime};

use super::clock::FakeClock;
use super::platform::FakePlatform;
use super::runtime::FakeRuntime;
use super::settings::FakeSettings;
use super::world::FakeWorld;

/// Settings document of a desktop engine with Kubernetes off and 2 CPUs.
pub fn desktop_settings() -> Value {
    json!({
        "cpus": {"value": 2, "locked": false, "min": 1, "max": 8},
        "kubernetesEnabled": {"value": false, "locked": false},
        "memoryMiB": 4096
    })
}

/// The Kubernetes switch in a written settings document, flat or legacy.
fn kubernetes_enabled(document: &Value) -> Option<bool> {
    document
        .get("kubernetesEnabled")
        .or_else(|| document.pointer("/vm/kubernetes/enabled"))
        .and_then(Value::as_bool)
}

/// Short, deterministic polling for use with [`FakeClock`].
pub fn timing() -> MachineTiming {
    MachineTiming {
        start: RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(60)),
        restart: RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(120)),
        settle: Duration::from_secs(2),
    }
}

pub fn admin_deps() -> AdminDeps {
    desktop_admin_deps(desktop_settings()).0
}

/// Admin deps on a desktop engine whose settings serve `document`.
pub fn desktop_admin_deps(document: Value) -> (AdminDeps, Arc<FakeSettings>) {
    let settings = Arc::new(FakeSettings::new(document));
    let deps = AdminDeps {
        runner: FakeWorld::new().runner(),
        runtime: Arc::new(FakeRuntime::new()),
        platform: Arc::new(FakePlatform::desktop()),
        settings: Some(SettingsClient::new(settings.clone())),
    };
    (deps, settings)
}

pub fn tool_deps() -> (Arc<dyn CommandRunner>, Arc<dyn ContainerRuntime>) {
    (FakeWorld::new().runner(), Arc::new(FakeRuntime::new()))
}

/// A registry as observed running on `host_port`.
pub fn running_registry(name: &str, host_port: u16) -> Registry {
    Registry {
        name: name.to_string(),
        port: Some(host_port),
        image: Some("registry:2".to_string()),
        status: RegistryStatus {
            container_id: format!("ctr-{name}"),
            host_port,
            container_port: 5000,
            listen_address: "127.0.0.1".to_string(),
            state: ContainerState::Running,
            ..RegistryStatus::default()
        },
        ..Registry::default()
    }
}

pub fn controller_context() -> ControllerContext {
    ControllerContext::new(admin_deps(), Arc::new(FakeClock::new()), timing())
        .with_minikube_home(PathBuf::from("/nonexistent/.minikube"))
}

/// Both controllers wired over one set of fakes.
pub struct Harness {
    pub world: FakeWorld,
    pub runtime: Arc<FakeRuntime>,
    pub settings: Arc<FakeSettings>,
    pub clock: Arc<FakeClock>,
    pub clusters: ClusterController,
    pub registries: Arc<RegistryController>,
    pub minikube_home: tempfile::TempDir,
}

impl Harness {
    /// A plain local daemon with 4 CPUs.
    pub fn new() -> Self {
        Self::build(FakePlatform::plain_daemon(), FakeRuntime::new(), desktop_settings())
    }

    /// A desktop engine that serves [`desktop_settings`].
    pub fn desktop(platform: FakePlatform) -> Self {
        Self::build(platform, FakeRuntime::new().with_cpus(2), desktop_settings())
    }

    pub fn build(platform: FakePlatform, runtime: FakeRuntime, settings: Value) -> Self {
        let world = FakeWorld::new();
        let runtime = Arc::new(runtime);
        let desktop = world.clone();
        let settings = Arc::new(FakeSettings::new(settings).on_submit(move |document| {
            if let Some(enabled) = kubernetes_enabled(document) {
                desktop.set_desktop_kubernetes(enabled);
            }
        }));
        let clock = Arc::new(FakeClock::new());
        let minikube_home = tempfile::tempdir().expect("temp minikube home");

        let registries = Arc::new(RegistryController::new(runtime.clone(), RegistryDefaults::default()));
        let deps = AdminDeps {
            runner: world.runner(),
            runtime: runtime.clone(),
            platform: Arc::new(platform),
            settings: Some(SettingsClient::new(settings.clone())),
        };
        let context = ControllerContext::new(deps, clock.clone(), timing())
            .with_minikube_home(minikube_home.path().to_path_buf());
        let clusters = ClusterController::new(context, world.contexts(), world.inspector(), registries.clone());

        Self {
            world,
            runtime,
            settings,
            clock,
            clusters,
            registries,
            minikube_home,
        }
    }

    /// Write a minikube profile config recording `cpus`.
    pub fn minikube_profile(&self, profile: &str, cpus: u32) {
        let dir = self.minikube_home.path().join("profiles").join(profile);
        std::fs::create_dir_all(&dir).expect("create profile dir");
        std::fs::write(dir.join("config.json"), json!({"Name": profile, "CPUs": cpus}).to_string())
            .expect("write profile config");
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
