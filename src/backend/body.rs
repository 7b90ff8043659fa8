//! Response body relayed straight from a backend connection.
//!
//! The backend connection stays leased to the body until the last frame has
//! been read, then goes back to the pool. A body that errors or is dropped
//! early leaves the connection mid-response, so it is closed instead.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use hyper::body::{Body, Bytes, Frame, Incoming, SizeHint};

use crate::backend::{BackendConnection, BackendPool};

struct Lease {
    conn: BackendConnection,
    pool: Arc<BackendPool>,
}

/// Streams a backend response body and releases its connection at the end.
pub struct PooledBody {
    inner: Incoming,
    lease: Option<Lease>,
}

impl PooledBody {
    pub fn new(inner: Incoming, conn: BackendConnection, pool: Arc<BackendPool>) -> Self {
        Self {
            inner,
            lease: Some(Lease { conn, pool }),
        }
    }

    fn finish(&mut self) {
        if let Some(Lease { conn, pool }) = self.lease.take() {
            pool.release_detached(conn);
        }
    }

    fn abandon(&mut self) {
        if let Some(Lease { conn, .. }) = self.lease.take() {
            tracing::debug!(backend_connection = %conn.id(), "Response body not finished, closing backend connection");
        }
    }
}

impl Body for PooledBody {
    type Data = Bytes;
    type Error = hyper::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let polled = Pin::new(&mut self.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) => self.finish(),
            Poll::Ready(Some(Ok(_))) if self.inner.is_end_stream() => self.finish(),
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!(error = %e, "Backend response body failed");
                self.abandon();
            }
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for PooledBody {
    fn drop(&mut self) {
        // hyper stops polling once `is_end_stream` holds (HEAD, empty and
        // fully read length-delimited bodies), so a drop there is a finish.
        if self.inner.is_end_stream() {
            self.finish();
        } else {
            self.abandon();
        }
    }
}

impl std::fmt::Debug for PooledBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBody")
            .field("backend_connection", &self.lease.as_ref().map(|lease| lease.conn.id()))
            .finish()
    }
}
