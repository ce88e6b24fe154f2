//! Unary RPC transport to a worker's unix-domain socket.
//!
//! One HTTP/1 handshake per call over `tokio::net::UnixStream`. The URI host
//! is ignored by the worker; routing happens on the `/<service>/<method>`
//! path with JSON bodies, matching the Connect unary protocol the worker
//! serves.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("dial {path}: {source}")]
    Dial {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("http: {0}")]
    Http(#[from] hyper::Error),
    #[error("request build: {0}")]
    Request(#[from] hyper::http::Error),
    #[error("{method}: worker returned status {status}")]
    Status {
        method: String,
        status: hyper::StatusCode,
    },
    #[error("decode {method} response: {source}")]
    Decode {
        method: String,
        source: serde_json::Error,
    },
    #[error("encode request: {0}")]
    Encode(serde_json::Error),
}

/// A dialer pinned to one worker socket.
#[derive(Debug, Clone)]
pub struct RpcChannel {
    socket_path: PathBuf,
}

impl RpcChannel {
    pub fn new(socket_path: &Path) -> Self {
        Self {
            socket_path: socket_path.to_path_buf(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Issue one unary call: POST `/{service}/{method}` with a JSON body,
    /// decode the JSON response.
    pub async fn unary<Req, Resp>(
        &self,
        service: &str,
        method: &str,
        request: &Req,
    ) -> Result<Resp, RpcError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let stream = tokio::net::UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| RpcError::Dial {
                path: self.socket_path.clone(),
                source,
            })?;
        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let body = serde_json::to_vec(request).map_err(RpcError::Encode)?;
        let req = Request::builder()
            .method("POST")
            .uri(format!("http://unix/{service}/{method}"))
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(body)))?;

        let resp = sender.send_request(req).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RpcError::Status {
                method: format!("{service}/{method}"),
                status,
            });
        }

        let bytes = resp.into_body().collect().await?.to_bytes();
        serde_json::from_slice(&bytes).map_err(|source| RpcError::Decode {
            method: format!("{service}/{method}"),
            source,
        })
    }
}
