//! The kubeconfig file as a [`ContextStore`].

use std::path::{Path, PathBuf};

use kube::config::Kubeconfig;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::port::outbound::{ContextStore, KubeContext};

/// Reads and rewrites one kubeconfig file.
pub struct KubeconfigFile {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl KubeconfigFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Explicit path, else the first `KUBECONFIG` entry, else `~/.kube/config`.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path.to_path_buf()));
        }
        if let Some(first) = std::env::var_os("KUBECONFIG")
            .as_ref()
            .and_then(|paths| std::env::split_paths(paths).find(|p| !p.as_os_str().is_empty()))
        {
            return Ok(Self::new(first));
        }
        dirs::home_dir()
            .map(|home| Self::new(home.join(".kube").join("config")))
            .ok_or_else(|| Error::NotFound("home directory for the default kubeconfig".to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Kubeconfig> {
        if !self.path.exists() {
            return Ok(Kubeconfig::default());
        }
        Ok(Kubeconfig::read_from(&self.path)?)
    }

    fn write(&self, config: &Kubeconfig) -> Result<()> {
        let yaml = serde_yaml::to_string(config)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, yaml)?;
        Ok(())
    }

    fn modify(&self, edit: impl FnOnce(&mut Kubeconfig) -> Result<bool>) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut config = self.read()?;
        if edit(&mut config)? {
            self.write(&config)?;
        }
        Ok(())
    }
}

fn cluster_provider(cluster: &kube::config::Cluster) -> Option<String> {
    cluster
        .extensions
        .as_ref()?
        .iter()
        .find(|e| e.name == "cluster_info")?
        .extension
        .get("provider")?
        .as_str()
        .map(str::to_string)
}

impl ContextStore for KubeconfigFile {
    fn contexts(&self) -> Result<Vec<KubeContext>> {
        let config = self.read()?;
        let current = config.current_context.as_deref();
        Ok(config
            .contexts
            .iter()
            .map(|named| {
                let cluster = named
                    .context
                    .as_ref()
                    .map(|c| c.cluster.clone())
                    .unwrap_or_default();
                let entry = config
                    .clusters
                    .iter()
                    .find(|c| c.name == cluster)
                    .and_then(|c| c.cluster.as_ref());
                KubeContext {
                    current: current == Some(named.name.as_str()),
                    name: named.name.clone(),
                    server: entry.and_then(|c| c.server.clone()),
                    provider: entry.and_then(cluster_provider),
                    cluster,
                }
            })
            .collect())
    }

    fn delete_context(&self, name: &str) -> Result<()> {
        self.modify(|config| {
            let Some(index) = config.contexts.iter().position(|c| c.name == name) else {
                return Ok(false);
            };
            let removed = config.contexts.remove(index);
            if config.current_context.as_deref() == Some(name) {
                config.current_context = None;
            }

            // Cluster and user entries go too once no other context uses them.
            if let Some(context) = removed.context {
                if !config
                    .contexts
                    .iter()
                    .any(|c| c.context.as_ref().is_some_and(|o| o.cluster == context.cluster))
                {
                    config.clusters.retain(|c| c.name != context.cluster);
                }
                if let Some(user) = context.user {
                    if !config
                        .contexts
                        .iter()
                        .any(|c| c.context.as_ref().and_then(|o| o.user.as_ref()) == Some(&user))
                    {
                        config.auth_infos.retain(|u| u.name != user);
                    }
                }
            }
            debug!(context = %name, "removed kubeconfig context");
            Ok(true)
        })
    }

    fn use_context(&self, name: &str) -> Result<()> {
        self.modify(|config| {
            if !config.contexts.iter().any(|c| c.name == name) {
                return Err(Error::NotFound(format!("kubeconfig context {name}")));
            }
            if config.current_context.as_deref() == Some(name) {
                return Ok(false);
            }
            config.current_context = Some(name.to_string());
            Ok(true)
        })
    }

    fn set_server(&self, context: &str, server: &str) -> Result<()> {
        self.modify(|config| {
            let cluster = config
                .contexts
                .iter()
                .find(|c| c.name == context)
                .and_then(|c| c.context.as_ref())
                .map(|c| c.cluster.clone())
                .ok_or_else(|| Error::NotFound(format!("kubeconfig context {context}")))?;
            let entry = config
                .clusters
                .iter_mut()
                .find(|c| c.name == cluster)
                .and_then(|c| c.cluster.as_mut())
                .ok_or_else(|| Error::NotFound(format!("kubeconfig cluster {cluster}")))?;
            if entry.server.as_deref() == Some(server) {
                return Ok(false);
            }
            entry.server = Some(server.to_string());
            Ok(true)
        })
    }
}
