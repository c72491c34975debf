//! The container engine's own VM (or the bare local daemon).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::application::desktop::{SettingsClient, SettingsPatch};
use crate::application::retry::{human, Clock, RetryPolicy};
use crate::domain::{Cluster, Product};
use crate::error::{Error, Result};
use crate::port::outbound::{CommandRunner, ContainerRuntime, Platform};

use super::Machine;

/// Polling intervals and deadlines for engine start and restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineTiming {
    pub start: RetryPolicy,
    pub restart: RetryPolicy,
    /// Pause between a settings write and the first readiness probe.
    pub settle: Duration,
}

impl Default for MachineTiming {
    fn default() -> Self {
        Self {
            start: RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(60)),
            restart: RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(120)),
            settle: Duration::from_secs(2),
        }
    }
}

/// Machine backed by the container engine.
pub struct DesktopMachine {
    runtime: Arc<dyn ContainerRuntime>,
    runner: Arc<dyn CommandRunner>,
    platform: Arc<dyn Platform>,
    settings: Option<SettingsClient>,
    clock: Arc<dyn Clock>,
    timing: MachineTiming,
}

impl DesktopMachine {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        runner: Arc<dyn CommandRunner>,
        platform: Arc<dyn Platform>,
        settings: Option<SettingsClient>,
        clock: Arc<dyn Clock>,
        timing: MachineTiming,
    ) -> Self {
        Self {
            runtime,
            runner,
            platform,
            settings,
            clock,
            timing,
        }
    }

    async fn reachable(&self) -> bool {
        match self.runtime.engine_version().await {
            Ok(_) => true,
            Err(err) => {
                debug!(error = %err, "container engine not reachable yet");
                false
            }
        }
    }

    fn settings(&self) -> Result<&SettingsClient> {
        self.settings.as_ref().ok_or_else(|| {
            Error::Validation(format!(
                "no settings channel for the container engine on {}",
                self.platform.os()
            ))
        })
    }
}

#[async_trait]
impl Machine for DesktopMachine {
    async fn cpus(&self) -> Result<u32> {
        self.runtime.engine_cpus().await
    }

    async fn ensure_exists(&self) -> Result<()> {
        let host = self.runtime.host();
        let probe = match self.runtime.engine_version().await {
            Ok(version) => {
                debug!(%version, host = %host.as_str(), "container engine reachable");
                return Ok(());
            }
            Err(err) => err,
        };

        if !self.platform.is_desktop_engine(&host) {
            return Err(Error::Unreachable {
                host: host.as_str().to_string(),
                reason: probe.to_string(),
            });
        }
        let Some(start) = self.platform.start_engine() else {
            return Err(Error::Unreachable {
                host: host.as_str().to_string(),
                reason: format!("{probe}; the engine cannot be started automatically on {}", self.platform.os()),
            });
        };

        self.runner
            .spawn_detached(&start)
            .await
            .map_err(|e| Error::tool("starting the container engine", e))?;

        let deadline = self.timing.start.deadline;
        info!("waiting {} for the container engine to start", human(deadline));
        self.timing
            .start
            .poll(self.clock.as_ref(), || self.reachable())
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "timed out after {} waiting for the container engine to start",
                    human(deadline)
                ))
            })?;
        info!("container engine started");
        Ok(())
    }

    async fn restart(&self, desired: &Cluster, existing: &Cluster) -> Result<()> {
        let needs_cpus = existing.status.cpus < desired.min_cpus;
        if needs_cpus && !self.platform.can_resize_cpus() {
            return Err(Error::Validation(format!(
                "cannot automatically set minimum CPU to {} on this platform",
                desired.min_cpus
            )));
        }

        let patch = SettingsPatch {
            kubernetes_enabled: (desired.product == Product::DockerDesktop).then_some(true),
            min_cpus: needs_cpus.then_some(desired.min_cpus),
        };
        if patch.is_empty() {
            return Ok(());
        }

        let written = self.settings()?.update(patch).await?;
        if !written {
            return Ok(());
        }

        self.clock.sleep(self.timing.settle).await;

        let deadline = self.timing.restart.deadline;
        info!("waiting {} for the container engine to restart", human(deadline));
        self.timing
            .restart
            .poll(self.clock.as_ref(), || self.reachable())
            .await
            .map_err(|_| {
                warn!("container engine did not come back after settings change");
                Error::Timeout(format!(
                    "timed out after {} waiting for the container engine to restart",
                    human(deadline)
                ))
            })?;
        Ok(())
    }
}
