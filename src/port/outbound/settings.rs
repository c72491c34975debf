//! Desktop engine settings channel port.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// One candidate local channel to the desktop engine's backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsChannel {
    /// Unix socket path or Windows named pipe name.
    pub address: PathBuf,
    pub settings_endpoint: &'static str,
    pub reset_endpoint: &'static str,
}

/// Whole-document access to the engine settings.
#[async_trait]
pub trait SettingsTransport: Send + Sync {
    /// GET the settings document in its read shape.
    async fn fetch(&self) -> Result<Value>;

    /// POST a fully collapsed settings document.
    async fn submit(&self, document: &Value) -> Result<()>;

    /// Ask the engine to wipe its built-in Kubernetes cluster.
    async fn reset_kubernetes(&self) -> Result<()>;
}
