//! containerd registry mirror configuration for cluster nodes.
//!
//! Nodes resolve `localhost:<host port>` image references through a
//! `hosts.toml` under containerd's `config_path`, which redirects pulls to
//! the registry container on the cluster network.

use crate::domain::{LocalRegistryHosting, Registry};

/// containerd's registry host configuration directory on every node.
pub const CERTS_DIR: &str = "/etc/containerd/certs.d";

const HOSTING_HELP: &str =
    "https://github.com/kubernetes/enhancements/tree/master/keps/sig-cluster-lifecycle/generic/1755-communicating-a-local-registry";

/// containerd config patch pointing the CRI registry config at [`CERTS_DIR`].
pub fn containerd_config_patch() -> String {
    format!("[plugins.\"io.containerd.grpc.v1.cri\".registry]\n  config_path = \"{CERTS_DIR}\"")
}

/// Directory holding the mirror entry for `registry`.
pub fn hosts_dir(registry: &Registry) -> String {
    format!("{CERTS_DIR}/{}", registry.host_address())
}

/// `hosts.toml` body redirecting pulls to the registry's in-network address.
pub fn hosts_toml(registry: &Registry) -> String {
    format!("[host.\"http://{}\"]\n", registry.cluster_network_address())
}

/// Shell script that writes stdin to the node's `hosts.toml` for `registry`.
pub fn write_hosts_script(registry: &Registry) -> String {
    let dir = hosts_dir(registry);
    format!("mkdir -p {dir} && cat > {dir}/hosts.toml")
}

/// Discovery document for a registry reachable over a shared container network.
pub fn network_hosting(registry: &Registry) -> LocalRegistryHosting {
    let in_network = registry.cluster_network_address();
    LocalRegistryHosting {
        host: registry.host_address(),
        host_from_container_runtime: Some(in_network.clone()),
        host_from_cluster_network: Some(in_network),
        help: Some(HOSTING_HELP.to_string()),
    }
}
