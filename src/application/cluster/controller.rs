//! Cluster reconciliation.
//!
//! # Apply
//!
//! ```text
//! desired ──► default name ─► admin + machine ─► installed? ─► engine up?
//!                                                                │
//!        existing? ◄─────────────────────────────────────────────┘
//!                │
//!                ├── cpus short ──► machine.restart
//!                ▼
//!        registry (materialized before any create)
//!                │
//!                ├── drifted ──► admin.delete ─► admin.create
//!                ├── stopped ──► admin.delete ─► admin.create  (unless the product restarts it)
//!                ├── missing ──► admin.create
//!                └── same ─────► (no-op)
//!                │
//!                ▼
//!        wait for context + nodes (after a create)
//!                │
//!                ▼
//!        attach registry ─► publish hosting ─► kubeconfig ─► observed
//! ```
//!
//! Multi-step applies are not transactional. A failure part way through
//! (say, attaching the registry after a successful create) leaves whatever
//! was already done in place, and the next apply picks up from there.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{stream, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::application::admin::Admin;
use crate::application::registry::RegistryController;
use crate::application::retry::{human, RetryPolicy};
use crate::domain::{Cluster, FieldSelector, Product, Registry, ToolVersion};
use crate::error::{Error, Result};
use crate::port::outbound::{ClusterInspector, ContextStore, KubeContext};

use super::context::ControllerContext;
use super::{publish, status};

/// Default bound on concurrent status lookups in [`ClusterController::list`].
pub const DEFAULT_STATUS_CONCURRENCY: usize = 8;

/// How long a freshly created cluster gets to write its context and
/// report nodes.
pub const DEFAULT_CLUSTER_READY: RetryPolicy =
    RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(180));

pub struct ClusterController {
    context: ControllerContext,
    contexts: Arc<dyn ContextStore>,
    inspector: Arc<dyn ClusterInspector>,
    registries: Arc<RegistryController>,
    status_concurrency: usize,
    ready: RetryPolicy,
}

impl ClusterController {
    pub fn new(
        context: ControllerContext,
        contexts: Arc<dyn ContextStore>,
        inspector: Arc<dyn ClusterInspector>,
        registries: Arc<RegistryController>,
    ) -> Self {
        Self {
            context,
            contexts,
            inspector,
            registries,
            status_concurrency: DEFAULT_STATUS_CONCURRENCY,
            ready: DEFAULT_CLUSTER_READY,
        }
    }

    #[must_use]
    pub fn with_status_concurrency(mut self, limit: usize) -> Self {
        self.status_concurrency = limit.max(1);
        self
    }

    #[must_use]
    pub fn with_ready_policy(mut self, ready: RetryPolicy) -> Self {
        self.ready = ready;
        self
    }

    fn find_context(&self, name: &str) -> Result<KubeContext> {
        self.contexts
            .contexts()?
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::NotFound(format!("cluster {name}")))
    }

    async fn observe(&self, mut cluster: Cluster) -> Cluster {
        let machine = self.context.machine_for(cluster.product, &cluster.name).await;
        status::populate(&mut cluster, self.inspector.as_ref(), machine.as_ref()).await;
        cluster
    }

    pub async fn get(&self, name: &str) -> Result<Cluster> {
        let context = self.find_context(name)?;
        Ok(self.observe(status::from_context(&context)).await)
    }

    /// Clusters matching `selector` (fields `name` and `product`).
    ///
    /// The selector is applied before any status lookups.
    pub async fn list(&self, selector: &FieldSelector) -> Result<Vec<Cluster>> {
        let candidates: Vec<Cluster> = self
            .contexts
            .contexts()?
            .iter()
            .map(status::from_context)
            .filter(|c| {
                selector.matches(|field| match field {
                    "name" => Some(c.name.as_str()),
                    "product" => Some(c.product.as_str()),
                    _ => None,
                })
            })
            .collect();

        let mut clusters: Vec<Cluster> = stream::iter(candidates)
            .map(|cluster| self.observe(cluster))
            .buffer_unordered(self.status_concurrency)
            .collect()
            .await;
        clusters.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clusters)
    }

    /// Converge the workstation to `desired` and return the cluster as observed.
    #[instrument(skip_all, fields(product = %desired.product, cluster = %desired.name))]
    pub async fn apply(&self, desired: &Cluster) -> Result<Cluster> {
        let mut desired = desired.clone();
        if desired.product == Product::Unknown {
            return Err(Error::Validation("a product is required to create a cluster".to_string()));
        }
        if desired.name.is_empty() {
            desired.name = desired
                .product
                .default_cluster_name()
                .unwrap_or_default()
                .to_string();
        }
        desired.product.validate_name(&desired.name)?;
        if let Some(version) = &desired.kubernetes_version {
            ToolVersion::parse_kubernetes(version)?;
        }

        let admin = self.context.admin_for(desired.product).await?;
        let machine = self.context.machine_for(desired.product, &desired.name).await;
        admin.ensure_installed().await?;
        machine.ensure_exists().await?;

        let (mut existing, present) = match self.get(&desired.name).await {
            Ok(existing) => (existing, true),
            Err(err) if err.is_not_found() => {
                let mut missing = Cluster::new(desired.product).with_name(desired.name.clone());
                missing.status.cpus = match machine.cpus().await {
                    Ok(cpus) => cpus,
                    Err(err) => {
                        debug!(error = %err, "machine cpus unknown before create");
                        desired.min_cpus
                    }
                };
                (missing, false)
            }
            Err(err) => return Err(err),
        };

        if existing.status.cpus < desired.min_cpus {
            info!(have = existing.status.cpus, want = desired.min_cpus, "raising machine CPUs");
            machine.restart(&desired, &existing).await?;
        }

        let registry = match &desired.registry {
            Some(name) => Some(self.registries.apply(&Registry::named(name.clone())).await?),
            None => None,
        };

        // A stopped kind or k3d cluster keeps its node containers, and
        // creating over them fails.
        let stale = if existing.is_running() {
            drift(&desired, &existing)?
        } else if present && !admin.restarts_stopped() {
            Some("cluster is not running".to_string())
        } else {
            None
        };
        if let Some(reason) = &stale {
            info!(%reason, "deleting cluster to recreate it");
            admin.delete(&existing).await?;
            self.forget(&desired.name)?;
        }

        let create = !existing.is_running() || stale.is_some();
        if create {
            admin.create(&desired, registry.as_ref()).await?;
            self.inspector.invalidate(&desired.name);
            self.wait_until_ready(&desired.name).await?;
            if let Some(config) = &desired.config {
                let runner = self.context.deps().runner.clone();
                publish::apply(runner.as_ref(), &desired.name, &publish::cluster_config_map(config)?).await?;
            }
            existing.status.local_registry_hosting = None;
        } else {
            debug!("cluster up to date");
        }

        if let Some(registry) = &registry {
            self.attach_registry(admin.as_ref(), &desired, registry, &existing).await?;
        }

        if self.context.deps().platform.in_container() {
            if let Some(server) = admin.in_container_server(&desired) {
                info!(%server, "pointing kubeconfig at the in-network API server");
                self.contexts.set_server(&desired.name, &server)?;
                self.inspector.invalidate(&desired.name);
            }
        }

        self.contexts.use_context(&desired.name)?;
        self.get(&desired.name).await
    }

    /// Wait for a new cluster's context to be written and its nodes to answer.
    async fn wait_until_ready(&self, name: &str) -> Result<()> {
        let deadline = self.ready.deadline;
        let clock = self.context.clock().clone();
        let checks = self
            .ready
            .poll(clock.as_ref(), || self.is_ready(name))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "timed out after {} waiting for cluster {name} to become ready",
                    human(deadline)
                ))
            })?;
        debug!(cluster = %name, checks, "cluster ready");
        Ok(())
    }

    async fn is_ready(&self, name: &str) -> bool {
        if let Err(err) = self.find_context(name) {
            debug!(cluster = %name, error = %err, "no kubeconfig context yet");
            return false;
        }
        match self.inspector.earliest_node_creation(name).await {
            Ok(created) => created.is_some(),
            Err(err) => {
                debug!(cluster = %name, error = %err, "API server not answering yet");
                false
            }
        }
    }

    async fn attach_registry(
        &self,
        admin: &dyn Admin,
        desired: &Cluster,
        registry: &Registry,
        existing: &Cluster,
    ) -> Result<()> {
        let expected = admin.local_registry_hosting(desired, registry);
        if expected.is_some() && existing.status.local_registry_hosting == expected {
            debug!(registry = %registry.name, "registry already attached");
            return Ok(());
        }

        info!(registry = %registry.name, "attaching registry");
        admin.attach_registry(desired, registry).await?;
        if let Some(hosting) = expected {
            let runner = self.context.deps().runner.clone();
            publish::apply(runner.as_ref(), &desired.name, &publish::hosting_config_map(&hosting)?).await?;
        }
        Ok(())
    }

    /// Delete the cluster and its kubeconfig context.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let existing = self.get(name).await?;
        let admin = self.context.admin_for(existing.product).await?;
        admin.ensure_installed().await?;
        info!(cluster = %name, product = %existing.product, "deleting cluster");
        admin.delete(&existing).await?;
        self.forget(name)
    }

    fn forget(&self, name: &str) -> Result<()> {
        if let Err(err) = self.contexts.delete_context(name) {
            warn!(cluster = %name, error = %err, "could not remove kubeconfig context");
            return Err(err);
        }
        self.inspector.invalidate(name);
        Ok(())
    }
}

/// Why an existing, running cluster no longer matches `desired`.
fn drift(desired: &Cluster, existing: &Cluster) -> Result<Option<String>> {
    if existing.product != desired.product {
        return Ok(Some(format!(
            "product changed from {} to {}",
            existing.product, desired.product
        )));
    }

    if let (Some(want), Some(have)) = (&desired.kubernetes_version, &existing.status.kubernetes_version) {
        let want = ToolVersion::parse_kubernetes(want)?;
        if let Some(have) = ToolVersion::parse(have) {
            if !want.same_minor(&have) {
                return Ok(Some(format!(
                    "Kubernetes version changed from {have} to {want}"
                )));
            }
        }
    }

    if desired.config != existing.config {
        return Ok(Some("cluster config changed".to_string()));
    }

    if let (Some(want), Some(have)) = (&desired.registry, &existing.registry) {
        if want != have {
            return Ok(Some(format!("registry changed from {have} to {want}")));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn running(product: Product, name: &str) -> Cluster {
        let mut cluster = Cluster::new(product).with_name(name);
        cluster.status.creation_timestamp = Some(chrono::Utc::now());
        cluster.status.kubernetes_version = Some("v1.29.2".into());
        cluster
    }

    #[test]
    fn unchanged_cluster_has_no_drift() {
        let existing = running(Product::Kind, "kind-kind");
        let desired = Cluster::new(Product::Kind).with_name("kind-kind").with_min_cpus(8);
        assert_eq!(drift(&desired, &existing).unwrap(), None);
    }

    #[test]
    fn config_change_is_drift() {
        let existing = running(Product::Kind, "kind-kind");
        let desired = Cluster::new(Product::Kind)
            .with_name("kind-kind")
            .with_config(json!({"nodes": [{"role": "control-plane"}]}));
        assert_eq!(drift(&desired, &existing).unwrap().as_deref(), Some("cluster config changed"));
    }

    #[test]
    fn kubernetes_minor_change_is_drift() {
        let existing = running(Product::Kind, "kind-kind");
        let same = Cluster::new(Product::Kind).with_name("kind-kind").with_kubernetes_version("v1.29.8");
        let newer = Cluster::new(Product::Kind).with_name("kind-kind").with_kubernetes_version("v1.30.0");
        assert_eq!(drift(&same, &existing).unwrap(), None);
        assert!(drift(&newer, &existing).unwrap().unwrap().contains("v1.30.0"));
    }

    #[test]
    fn switching_registry_is_drift() {
        let mut existing = running(Product::Kind, "kind-kind");
        existing.registry = Some("old-registry".into());
        let desired = Cluster::new(Product::Kind).with_name("kind-kind").with_registry("kind-registry");
        assert!(drift(&desired, &existing).unwrap().is_some());
    }
}
