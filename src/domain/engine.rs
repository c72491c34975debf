//! Where the container engine lives.

use url::Url;

/// A container engine address, as found in `DOCKER_HOST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineHost {
    raw: String,
}

impl EngineHost {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Hostname of a TCP or SSH engine. Socket and pipe engines have none.
    pub fn hostname(&self) -> Option<String> {
        let url = Url::parse(&self.raw).ok()?;
        match url.scheme() {
            "tcp" | "ssh" | "http" | "https" => url.host_str().map(str::to_string),
            _ => None,
        }
    }

    /// True when containers publish ports on this machine.
    pub fn is_local(&self) -> bool {
        if self.raw.is_empty() {
            return true;
        }
        match Url::parse(&self.raw) {
            Ok(url) => match url.scheme() {
                "unix" | "npipe" => true,
                _ => matches!(
                    url.host_str(),
                    Some("localhost" | "127.0.0.1" | "[::1]" | "::1")
                ),
            },
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sockets_and_loopback_are_local() {
        assert!(EngineHost::new("").is_local());
        assert!(EngineHost::new("unix:///var/run/docker.sock").is_local());
        assert!(EngineHost::new("npipe:////./pipe/docker_engine").is_local());
        assert!(EngineHost::new("tcp://127.0.0.1:2375").is_local());
    }

    #[test]
    fn remote_hosts_expose_hostname() {
        let host = EngineHost::new("ssh://builder@build-box.internal");
        assert!(!host.is_local());
        assert_eq!(host.hostname().as_deref(), Some("build-box.internal"));
        assert_eq!(EngineHost::new("unix:///var/run/docker.sock").hostname(), None);
    }
}
