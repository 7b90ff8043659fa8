//! Per-connection request/response cycle.
//!
//! # Responsibilities
//! - Drive HTTP/1 on one client connection until it closes
//! - Forward each request over a pooled backend connection
//! - Tally the response's declared length and stamp the running total
//!   into the response head before it reaches the client
//! - Stream the backend body through; its connection goes back to the pool
//!   when the body ends
//!
//! # Design Decisions
//! - hyper's HTTP/1 dispatcher is the request loop: it parses requests in
//!   order and writes each response before reading the next request
//! - Any failure before the response head is ready is returned as a service
//!   error, which makes hyper close the client connection without writing a
//!   response
//! - The one response not produced by the backend: a request hyper cannot
//!   parse is answered with hyper's own `400 Bad Request`, then the
//!   connection is closed
//! - Bodies are never buffered whole, so endless and slow backend bodies are
//!   relayed as they arrive

use std::sync::Arc;

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpStream;

use crate::backend::{BackendError, BackendPool, PooledBody};
use crate::net::{ClientId, ClientSlot};
use crate::observability::metrics;
use crate::stats::StatsLedger;

/// Errors that abort a cycle and close the client connection.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Shared state every connection handler works against.
#[derive(Debug)]
pub struct ProxyContext {
    pub pool: Arc<BackendPool>,
    pub ledger: Arc<StatsLedger>,
    pub stats_header: HeaderName,
}

/// Serve one client connection until the client leaves or a cycle fails.
pub async fn serve_connection(stream: TcpStream, ctx: Arc<ProxyContext>, slot: ClientSlot) {
    let client = slot.id();
    let service = service_fn(move |request| {
        let ctx = Arc::clone(&ctx);
        async move { forward(request, &ctx, client).await }
    });

    let result = http1::Builder::new()
        .keep_alive(true)
        .serve_connection(TokioIo::new(stream), service)
        .await;

    match result {
        Ok(()) => {
            tracing::debug!(client = %client, peer_addr = %slot.peer(), "Client connection finished");
        }
        // Cycle and body failures are logged where they happen.
        Err(e) if e.is_user() => {
            tracing::debug!(client = %client, peer_addr = %slot.peer(), error = %e, "Client connection aborted");
        }
        Err(e) => {
            tracing::warn!(
                client = %client,
                peer_addr = %slot.peer(),
                error = %e,
                "Client connection failed"
            );
        }
    }

    drop(slot);
}

async fn forward(
    request: Request<Incoming>,
    ctx: &ProxyContext,
    client: ClientId,
) -> Result<Response<PooledBody>, ProxyError> {
    let path = request.uri().path().to_owned();

    match proxy_cycle(request, ctx, &path).await {
        Ok(response) => {
            tracing::info!(client = %client, "proxied {}: got {}", path, response.status().as_u16());
            Ok(response)
        }
        Err(e) => {
            tracing::warn!(
                client = %client,
                path = %path,
                error = %e,
                "Proxy cycle failed, closing client connection"
            );
            Err(e)
        }
    }
}

async fn proxy_cycle(
    request: Request<Incoming>,
    ctx: &ProxyContext,
    path: &str,
) -> Result<Response<PooledBody>, ProxyError> {
    let mut backend = ctx.pool.acquire().await?;

    // On error `backend` is dropped here, which closes it.
    let response = backend.send(request.map(|body| body.boxed())).await?;
    let (mut parts, body) = response.into_parts();

    let total = ctx.ledger.record(path, declared_length(&parts.headers));
    parts
        .headers
        .insert(ctx.stats_header.clone(), HeaderValue::from(total));
    metrics::record_request(parts.status.as_u16());

    let body = PooledBody::new(body, backend, Arc::clone(&ctx.pool));
    Ok(Response::from_parts(parts, body))
}

/// The response's `Content-Length`, or 0 when absent or unparseable
/// (chunked and close-delimited bodies).
fn declared_length(headers: &HeaderMap) -> u64 {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}
