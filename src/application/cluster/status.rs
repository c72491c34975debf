//! Observed cluster status, gathered field by field.
//!
//! Each field is an independent lookup. A lookup that fails is logged and
//! leaves its field empty; it never fails the read as a whole.

use std::fmt::Display;

use tracing::warn;

use crate::application::machine::Machine;
use crate::domain::{Cluster, Product};
use crate::port::outbound::{ClusterInspector, KubeContext};

/// A cluster with only the fields the kubeconfig gives for free.
pub fn from_context(context: &KubeContext) -> Cluster {
    let product = Product::from_context(
        &context.name,
        context.server.as_deref(),
        context.provider.as_deref(),
    );
    let mut cluster = Cluster::new(product).with_name(context.name.clone());
    cluster.status.current = context.current;
    cluster
}

/// Fill in `cluster.status` with concurrent lookups.
pub async fn populate(cluster: &mut Cluster, inspector: &dyn ClusterInspector, machine: &dyn Machine) {
    let name = cluster.name.as_str();
    let (created, hosting, cpus, version, config) = tokio::join!(
        inspector.earliest_node_creation(name),
        inspector.local_registry_hosting(name),
        machine.cpus(),
        inspector.server_version(name),
        inspector.recorded_config(name),
    );

    let mut first_error = None;
    let created = field(name, "creationTimestamp", created, &mut first_error).flatten();
    let hosting = field(name, "localRegistryHosting", hosting, &mut first_error).flatten();
    let cpus = field(name, "cpus", cpus, &mut first_error).unwrap_or_default();
    let version = field(name, "kubernetesVersion", version, &mut first_error);
    let config = field(name, "config", config, &mut first_error).flatten();

    cluster.registry = hosting
        .as_ref()
        .and_then(|h| h.registry_name())
        .map(str::to_string);
    cluster.config = config;
    cluster.status.creation_timestamp = created;
    cluster.status.local_registry_hosting = hosting;
    cluster.status.cpus = cpus;
    cluster.status.kubernetes_version = version;
    // An unreachable API server is expected for stopped clusters; only
    // report errors for clusters that answered at all.
    cluster.status.error = if cluster.status.creation_timestamp.is_some() {
        first_error
    } else {
        None
    };
}

fn field<T, E: Display>(
    cluster: &str,
    field: &'static str,
    result: Result<T, E>,
    first_error: &mut Option<String>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(%cluster, field, error = %err, "could not read cluster status field");
            first_error.get_or_insert_with(|| format!("reading {field}: {err}"));
            None
        }
    }
}
