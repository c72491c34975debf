//! HTTP over the desktop engine's local backend socket or named pipe.
//!
//! The socket's name and the settings endpoint moved between engine
//! releases, so every request walks the platform's candidate channels in
//! order and uses the first that accepts a connection.

use std::path::Path;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SettingsError};
use crate::port::outbound::{SettingsChannel, SettingsTransport};

/// [`SettingsTransport`] over a Unix socket or Windows named pipe.
pub struct DesktopSocket {
    channels: Vec<SettingsChannel>,
}

impl DesktopSocket {
    pub fn new(channels: Vec<SettingsChannel>) -> Self {
        Self { channels }
    }

    async fn request(
        &self,
        method: Method,
        endpoint: impl Fn(&SettingsChannel) -> &'static str,
        body: Option<Vec<u8>>,
    ) -> Result<Bytes> {
        let mut tried = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            match connect(&channel.address).await {
                Ok(io) => {
                    let path = endpoint(channel);
                    debug!(address = %channel.address.display(), %method, path, "settings request");
                    return send(io, method, path, body).await;
                }
                Err(err) => {
                    debug!(address = %channel.address.display(), error = %err, "settings channel unavailable");
                    tried.push(channel.address.display().to_string());
                }
            }
        }
        Err(SettingsError::NoChannel {
            tried: tried.join(", "),
        }
        .into())
    }
}

#[cfg(unix)]
async fn connect(address: &Path) -> std::io::Result<TokioIo<tokio::net::UnixStream>> {
    tokio::net::UnixStream::connect(address).await.map(TokioIo::new)
}

#[cfg(windows)]
async fn connect(
    address: &Path,
) -> std::io::Result<TokioIo<tokio::net::windows::named_pipe::NamedPipeClient>> {
    tokio::net::windows::named_pipe::ClientOptions::new()
        .open(address)
        .map(TokioIo::new)
}

#[cfg(not(any(unix, windows)))]
async fn connect(_address: &Path) -> std::io::Result<TokioIo<tokio::net::TcpStream>> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "no local settings channel on this platform",
    ))
}

fn transport(err: impl std::fmt::Display) -> SettingsError {
    SettingsError::Transport(err.to_string())
}

async fn send<T>(io: TokioIo<T>, method: Method, path: &'static str, body: Option<Vec<u8>>) -> Result<Bytes>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin + 'static,
{
    let (mut sender, connection) = http1::handshake(io).await.map_err(transport)?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            debug!(error = %err, "settings connection closed");
        }
    });

    let mut request = Request::builder()
        .method(method.clone())
        .uri(path)
        .header(HOST, "localhost");
    if body.is_some() {
        request = request.header(CONTENT_TYPE, "application/json");
    }
    let request = request
        .body(Full::new(Bytes::from(body.unwrap_or_default())))
        .map_err(transport)?;

    let response = sender.send_request(request).await.map_err(transport)?;
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .map_err(transport)?
        .to_bytes();

    if !status.is_success() {
        return Err(SettingsError::Status {
            method: if method == Method::GET { "GET" } else { "POST" },
            endpoint: path.to_string(),
            status: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).trim().to_string(),
        }
        .into());
    }
    Ok(bytes)
}

#[async_trait]
impl SettingsTransport for DesktopSocket {
    async fn fetch(&self) -> Result<Value> {
        let bytes = self.request(Method::GET, |c| c.settings_endpoint, None).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn submit(&self, document: &Value) -> Result<()> {
        let body = serde_json::to_vec(document)?;
        self.request(Method::POST, |c| c.settings_endpoint, Some(body)).await?;
        Ok(())
    }

    async fn reset_kubernetes(&self) -> Result<()> {
        self.request(Method::POST, |c| c.reset_endpoint, None).await?;
        Ok(())
    }
}
