//! Keeps a registry on a remote engine reachable at `localhost`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::{Error, Result};
use crate::port::outbound::{CommandRunner, Invocation, PortForwarder};

const SOCAT_HELP: &str = "http://www.dest-unreach.org/socat/";

/// Forwards `localhost:<port>` to the engine host with a background `socat`.
///
/// Registries on a remote engine publish on all interfaces so the tunnel can
/// reach them.
pub struct SocatForwarder {
    runner: Arc<dyn CommandRunner>,
}

impl SocatForwarder {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub fn invocation(port: u16, remote_host: &str) -> Invocation {
        Invocation::new(
            "socat",
            [
                format!("TCP-LISTEN:{port},reuseaddr,fork"),
                format!("TCP:{remote_host}:{port}"),
            ],
        )
    }
}

#[async_trait]
impl PortForwarder for SocatForwarder {
    async fn forward(&self, port: u16, remote_host: &str) -> Result<()> {
        if self.runner.look_path("socat").is_none() {
            return Err(Error::NotInstalled {
                tool: "socat",
                help: format!("A remote container engine needs socat to reach registries at localhost. {SOCAT_HELP}"),
            });
        }
        info!(port, %remote_host, "forwarding registry port");
        self.runner
            .spawn_detached(&Self::invocation(port, remote_host))
            .await
            .map_err(|e| Error::tool(format!("forwarding localhost:{port} to {remote_host}"), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwards_same_port_on_both_ends() {
        let invocation = SocatForwarder::invocation(5001, "10.0.0.7");
        assert_eq!(invocation.args, ["TCP-LISTEN:5001,reuseaddr,fork", "TCP:10.0.0.7:5001"]);
    }
}
