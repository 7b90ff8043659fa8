//! A single HTTP/1.1 connection to the backend.
//!
//! # Responsibilities
//! - Dial the backend with a bounded connect time
//! - Run the HTTP/1 handshake and own the connection driver task
//! - Send one request at a time and hand back the response head
//!
//! The value is a plain composite: hyper's `SendRequest` (request
//! serialization and the write buffer) plus the spawned driver that owns the
//! socket and its read buffer. Dropping the value aborts the driver, which
//! closes the socket.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::client::conn::http1::{self, SendRequest};
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time;

use crate::backend::BackendError;

/// Body type sent to the backend: the client's request body, boxed.
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

static BACKEND_CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a backend connection, for tracing reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendConnectionId(u64);

impl BackendConnectionId {
    fn next() -> Self {
        Self(BACKEND_CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BackendConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backend-{}", self.0)
    }
}

/// An established connection to the backend, usable by one handler at a time.
pub struct BackendConnection {
    id: BackendConnectionId,
    sender: SendRequest<ProxyBody>,
    driver: JoinHandle<()>,
}

impl BackendConnection {
    /// Dial `address` and complete the HTTP/1 handshake.
    pub async fn connect(address: &str, connect_timeout: Duration) -> Result<Self, BackendError> {
        let stream = match time::timeout(connect_timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(BackendError::Connect {
                    address: address.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(BackendError::ConnectTimeout {
                    address: address.to_string(),
                    timeout: connect_timeout,
                })
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(address = %address, error = %e, "Failed to set TCP_NODELAY on backend socket");
        }

        let (sender, conn) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(BackendError::Handshake)?;

        let id = BackendConnectionId::next();
        let driver = tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(backend_connection = %id, error = %e, "Backend connection ended with error");
            }
        });

        tracing::debug!(backend_connection = %id, address = %address, "Backend connection established");

        Ok(Self { id, sender, driver })
    }

    pub fn id(&self) -> BackendConnectionId {
        self.id
    }

    /// Send one request and wait for the response head.
    ///
    /// hyper records the request method, so framing that depends on it (no
    /// body for HEAD) is applied when the response is parsed.
    pub async fn send(&mut self, request: Request<ProxyBody>) -> Result<Response<Incoming>, BackendError> {
        self.sender.ready().await.map_err(BackendError::Send)?;
        self.sender
            .send_request(request)
            .await
            .map_err(BackendError::Send)
    }

    /// True once the backend closed its side or the driver stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed() || self.driver.is_finished()
    }
}

impl fmt::Debug for BackendConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConnection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for BackendConnection {
    fn drop(&mut self) {
        self.driver.abort();
        tracing::trace!(backend_connection = %self.id, "Backend connection closed");
    }
}
