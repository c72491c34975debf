//! ConfigMaps the controller writes into a cluster.
//!
//! The Kubernetes client is only used for reads; writes go through
//! `kubectl apply` so they land with the user's own credentials.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;

use crate::domain::LocalRegistryHosting;
use crate::error::Result;
use crate::port::outbound::kube::{
    CLUSTER_CONFIG_CONFIGMAP, CLUSTER_CONFIG_KEY, DISCOVERY_NAMESPACE, LOCAL_REGISTRY_HOSTING_CONFIGMAP,
    LOCAL_REGISTRY_HOSTING_KEY,
};
use crate::port::outbound::{CommandRunner, Invocation};

fn config_map(name: &str, key: &str, value: String) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(DISCOVERY_NAMESPACE.to_string()),
            ..ObjectMeta::default()
        },
        data: Some(BTreeMap::from([(key.to_string(), value)])),
        ..ConfigMap::default()
    }
}

/// The `local-registry-hosting` ConfigMap.
pub fn hosting_config_map(hosting: &LocalRegistryHosting) -> Result<ConfigMap> {
    Ok(config_map(
        LOCAL_REGISTRY_HOSTING_CONFIGMAP,
        LOCAL_REGISTRY_HOSTING_KEY,
        serde_yaml::to_string(hosting)?,
    ))
}

/// The ConfigMap recording the config blob a cluster was created with.
pub fn cluster_config_map(config: &serde_json::Value) -> Result<ConfigMap> {
    Ok(config_map(
        CLUSTER_CONFIG_CONFIGMAP,
        CLUSTER_CONFIG_KEY,
        serde_json::to_string(config)?,
    ))
}

/// `kubectl apply` a manifest against `context`.
///
/// k8s-openapi serializes `apiVersion` and `kind` along with the object.
pub async fn apply(runner: &dyn CommandRunner, context: &str, manifest: &ConfigMap) -> Result<()> {
    let body = serde_yaml::to_string(manifest)?;
    let name = manifest.metadata.name.as_deref().unwrap_or_default();
    runner
        .run(
            &Invocation::new("kubectl", ["--context", context, "apply", "-f", "-"]).with_stdin(body),
        )
        .await
        .map_err(|e| crate::error::Error::tool(format!("publishing ConfigMap {name} to {context}"), e))?;
    Ok(())
}
