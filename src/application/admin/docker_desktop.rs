use async_trait::async_trait;
use tracing::info;

use crate::domain::{Cluster, LocalRegistryHosting, Product, Registry};
use crate::error::{Error, Result};

use super::{Admin, AdminDeps};

/// The desktop engine's built-in Kubernetes, switched on and off through
/// its settings channel.
pub struct DockerDesktopAdmin {
    deps: AdminDeps,
}

impl DockerDesktopAdmin {
    pub fn new(deps: AdminDeps) -> Self {
        Self { deps }
    }

    fn settings(&self) -> Result<&crate::application::desktop::SettingsClient> {
        self.deps.settings.as_ref().ok_or_else(|| {
            Error::Validation(format!(
                "docker-desktop clusters are not supported on {}",
                self.deps.platform.os()
            ))
        })
    }
}

#[async_trait]
impl Admin for DockerDesktopAdmin {
    fn product(&self) -> Product {
        Product::DockerDesktop
    }

    async fn ensure_installed(&self) -> Result<()> {
        Ok(())
    }

    async fn create(&self, desired: &Cluster, registry: Option<&Registry>) -> Result<()> {
        Product::DockerDesktop.validate_name(&desired.name)?;
        if desired.kubernetes_version.is_some() {
            return Err(Error::Validation(
                "docker-desktop does not support choosing a kubernetesVersion".to_string(),
            ));
        }
        let host = self.deps.runtime.host();
        if !self.deps.platform.is_desktop_engine(&host) {
            return Err(Error::Validation(format!(
                "docker-desktop clusters need the local desktop engine, but the engine is at {}",
                host.as_str()
            )));
        }
        if let Some(registry) = registry {
            info!(registry = %registry.name, "docker-desktop pulls from localhost registries directly");
        }

        self.settings()?.set_kubernetes_enabled(true).await?;
        Ok(())
    }

    fn restarts_stopped(&self) -> bool {
        true
    }

    async fn delete(&self, _existing: &Cluster) -> Result<()> {
        let settings = self.settings()?;
        settings.reset_kubernetes().await?;
        settings.set_kubernetes_enabled(false).await?;
        Ok(())
    }

    async fn attach_registry(&self, _desired: &Cluster, _registry: &Registry) -> Result<()> {
        Ok(())
    }

    fn local_registry_hosting(&self, _desired: &Cluster, registry: &Registry) -> Option<LocalRegistryHosting> {
        Some(LocalRegistryHosting {
            host: registry.host_address(),
            ..LocalRegistryHosting::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::fixture;
    use serde_json::json;

    #[tokio::test]
    async fn create_enables_kubernetes() {
        let (deps, settings) = fixture::desktop_admin_deps(json!({"kubernetesEnabled": false, "cpus": 4}));
        let admin = DockerDesktopAdmin::new(deps);

        admin.create(&Cluster::new(Product::DockerDesktop).with_name("docker-desktop"), None).await.unwrap();

        assert_eq!(settings.last_submitted().unwrap()["kubernetesEnabled"], json!(true));
    }

    #[tokio::test]
    async fn create_rejects_kubernetes_version() {
        let (deps, settings) = fixture::desktop_admin_deps(json!({"kubernetesEnabled": false}));
        let admin = DockerDesktopAdmin::new(deps);
        let desired = Cluster::new(Product::DockerDesktop)
            .with_name("docker-desktop")
            .with_kubernetes_version("v1.29.0");

        let err = admin.create(&desired, None).await.unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(settings.fetch_count(), 0);
    }

    #[tokio::test]
    async fn delete_resets_then_disables() {
        let (deps, settings) = fixture::desktop_admin_deps(json!({"kubernetesEnabled": true}));
        let admin = DockerDesktopAdmin::new(deps);

        admin.delete(&Cluster::new(Product::DockerDesktop).with_name("docker-desktop")).await.unwrap();

        assert_eq!(settings.reset_count(), 1);
        assert_eq!(settings.last_submitted().unwrap()["kubernetesEnabled"], json!(false));
    }
}
