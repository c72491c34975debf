//! Composition root: wires the real adapters into the controllers.

use std::sync::Arc;

use tracing::debug;

use crate::adapter::outbound::{
    platform, DesktopSocket, DockerRuntime, KubeInspector, KubeconfigFile, ProcessRunner, SocatForwarder,
};
use crate::application::admin::AdminDeps;
use crate::application::desktop::SettingsClient;
use crate::application::retry::SystemClock;
use crate::application::{ClusterController, ControllerContext, RegistryController};
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::{CommandRunner, ContainerRuntime};

/// The controllers, ready to use.
pub struct App {
    pub clusters: ClusterController,
    pub registries: Arc<RegistryController>,
}

/// Connect to the container engine and kubeconfig described by `config`.
pub fn build(config: &Config) -> Result<App> {
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(DockerRuntime::connect()?);
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);
    let platform = platform::detect(&runtime.host());

    let channels = platform.settings_channels();
    let settings = (!channels.is_empty()).then(|| SettingsClient::new(Arc::new(DesktopSocket::new(channels))));
    debug!(os = %platform.os(), settings = settings.is_some(), "platform detected");

    let registries = Arc::new(
        RegistryController::new(runtime.clone(), config.registry.defaults())
            .with_forwarder(Arc::new(SocatForwarder::new(runner.clone()))),
    );

    let kubeconfig = KubeconfigFile::resolve(config.kubeconfig.path.as_deref())?;
    let inspector = Arc::new(KubeInspector::new(kubeconfig.path().to_path_buf()));

    let deps = AdminDeps {
        runner,
        runtime,
        platform,
        settings,
    };
    let context = ControllerContext::new(deps, Arc::new(SystemClock), config.timing.machine_timing());
    let clusters = ClusterController::new(context, Arc::new(kubeconfig), inspector, registries.clone())
        .with_status_concurrency(config.timing.status_concurrency)
        .with_ready_policy(config.timing.cluster_ready());

    Ok(App {
        clusters,
        registries,
    })
}
