//! The VM or engine a cluster runs on.
//!
//! A machine has to be reachable before any cluster work starts, reports
//! the CPUs it can give the cluster, and can be restarted with more CPUs or
//! with the engine's built-in Kubernetes switched on.

mod desktop;
mod profile;

pub use desktop::{DesktopMachine, MachineTiming};
pub use profile::ProfileMachine;

use async_trait::async_trait;

use crate::domain::Cluster;
use crate::error::Result;

#[async_trait]
pub trait Machine: Send + Sync {
    async fn cpus(&self) -> Result<u32>;

    /// Make sure the machine is up, starting it if the platform allows.
    async fn ensure_exists(&self) -> Result<()>;

    /// Restart so that `desired` can be satisfied. `existing` is the cluster
    /// as observed before the restart.
    async fn restart(&self, desired: &Cluster, existing: &Cluster) -> Result<()>;
}
