//! Read-only Kubernetes API access through kube-rs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{ConfigMap, Node};
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use parking_lot::Mutex;
use tracing::debug;

use crate::domain::LocalRegistryHosting;
use crate::error::Result;
use crate::port::outbound::kube::{
    CLUSTER_CONFIG_CONFIGMAP, CLUSTER_CONFIG_KEY, DISCOVERY_NAMESPACE, LOCAL_REGISTRY_HOSTING_CONFIGMAP,
    LOCAL_REGISTRY_HOSTING_KEY,
};
use crate::port::outbound::ClusterInspector;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(15);

/// [`ClusterInspector`] with one cached client per kubeconfig context.
pub struct KubeInspector {
    kubeconfig: PathBuf,
    clients: Mutex<HashMap<String, Client>>,
}

impl KubeInspector {
    pub fn new(kubeconfig: PathBuf) -> Self {
        Self {
            kubeconfig,
            clients: Mutex::new(HashMap::new()),
        }
    }

    async fn client(&self, context: &str) -> Result<Client> {
        if let Some(client) = self.clients.lock().get(context) {
            return Ok(client.clone());
        }

        let kubeconfig = Kubeconfig::read_from(&self.kubeconfig)?;
        let options = KubeConfigOptions {
            context: Some(context.to_string()),
            ..KubeConfigOptions::default()
        };
        let mut config = Config::from_custom_kubeconfig(kubeconfig, &options).await?;
        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);
        let client = Client::try_from(config)?;
        debug!(%context, "built Kubernetes client");

        // Two callers may race to build the same client; either result is fine.
        Ok(self
            .clients
            .lock()
            .entry(context.to_string())
            .or_insert(client)
            .clone())
    }

    async fn discovery_value(&self, context: &str, name: &str, key: &str) -> Result<Option<String>> {
        let client = self.client(context).await?;
        let config_maps: Api<ConfigMap> = Api::namespaced(client, DISCOVERY_NAMESPACE);
        let value = config_maps
            .get_opt(name)
            .await?
            .and_then(|cm| cm.data)
            .and_then(|mut data| data.remove(key));
        Ok(value)
    }
}

#[async_trait]
impl ClusterInspector for KubeInspector {
    async fn earliest_node_creation(&self, context: &str) -> Result<Option<DateTime<Utc>>> {
        let client = self.client(context).await?;
        let nodes: Api<Node> = Api::all(client);
        let list = nodes.list(&ListParams::default()).await?;
        Ok(list
            .items
            .iter()
            .filter_map(|node| node.metadata.creation_timestamp.as_ref())
            .map(|time| time.0)
            .min())
    }

    async fn local_registry_hosting(&self, context: &str) -> Result<Option<LocalRegistryHosting>> {
        let raw = self
            .discovery_value(context, LOCAL_REGISTRY_HOSTING_CONFIGMAP, LOCAL_REGISTRY_HOSTING_KEY)
            .await?;
        Ok(match raw {
            Some(raw) => Some(serde_yaml::from_str(&raw)?),
            None => None,
        })
    }

    async fn server_version(&self, context: &str) -> Result<String> {
        let client = self.client(context).await?;
        Ok(client.apiserver_version().await?.git_version)
    }

    async fn recorded_config(&self, context: &str) -> Result<Option<serde_json::Value>> {
        let raw = self
            .discovery_value(context, CLUSTER_CONFIG_CONFIGMAP, CLUSTER_CONFIG_KEY)
            .await?;
        Ok(match raw {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        })
    }

    fn invalidate(&self, context: &str) {
        self.clients.lock().remove(context);
    }
}
