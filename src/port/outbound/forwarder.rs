//! Port forwarding for registries on a remote engine.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait PortForwarder: Send + Sync {
    /// Make `remote_host:port` reachable at `localhost:port`.
    async fn forward(&self, port: u16, remote_host: &str) -> Result<()>;
}
