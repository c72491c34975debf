//! Machine whose CPU count lives in a profile file on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::Cluster;
use crate::error::{Error, Result};

use super::Machine;

#[derive(Debug, Deserialize)]
struct ProfileConfig {
    #[serde(rename = "CPUs", default)]
    cpus: u32,
}

/// A minikube profile on top of the container engine.
///
/// Reachability and restarts are the backing machine's business; only the
/// CPU count comes from the profile.
pub struct ProfileMachine {
    profile: String,
    home: PathBuf,
    backing: Arc<dyn Machine>,
}

impl ProfileMachine {
    pub fn new(profile: impl Into<String>, home: PathBuf, backing: Arc<dyn Machine>) -> Self {
        Self {
            profile: profile.into(),
            home,
            backing,
        }
    }

    /// `$MINIKUBE_HOME/.minikube`, or `~/.minikube`.
    pub fn default_home() -> Option<PathBuf> {
        home_from(std::env::var_os("MINIKUBE_HOME").map(PathBuf::from), dirs::home_dir())
    }

    pub fn config_path(&self) -> PathBuf {
        profile_config_path(&self.home, &self.profile)
    }
}

const MINIKUBE_DIR: &str = ".minikube";

/// minikube nests its state under `.minikube` unless the override already names it.
fn home_from(minikube_home: Option<PathBuf>, user_home: Option<PathBuf>) -> Option<PathBuf> {
    match minikube_home.filter(|path| !path.as_os_str().is_empty()) {
        Some(path) if path.file_name().is_some_and(|name| name == MINIKUBE_DIR) => Some(path),
        Some(path) => Some(path.join(MINIKUBE_DIR)),
        None => user_home.map(|home| home.join(MINIKUBE_DIR)),
    }
}

fn profile_config_path(home: &Path, profile: &str) -> PathBuf {
    home.join("profiles").join(profile).join("config.json")
}

#[async_trait]
impl Machine for ProfileMachine {
    async fn cpus(&self) -> Result<u32> {
        let path = self.config_path();
        let raw = tokio::fs::read(&path).await.map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(format!("profile config {}", path.display())),
            _ => Error::Io(err),
        })?;
        let config: ProfileConfig = serde_json::from_slice(&raw)?;
        Ok(config.cpus)
    }

    async fn ensure_exists(&self) -> Result<()> {
        self.backing.ensure_exists().await
    }

    async fn restart(&self, desired: &Cluster, existing: &Cluster) -> Result<()> {
        self.backing.restart(desired, existing).await
    }
}
