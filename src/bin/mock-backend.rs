//! Stand-in backend for trying the proxy by hand.
//!
//! Answers every request with a fixed body and a `Content-Length`, keeping
//! connections alive so the proxy's pool has something to reuse.

use std::convert::Infallible;
use std::net::SocketAddr;

use clap::Parser;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "mock-backend")]
#[command(about = "Fixed-response HTTP/1.1 backend for local testing", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "127.0.0.1:8081")]
    listen: SocketAddr,

    #[arg(short, long, default_value = "Hello from the pretend website!")]
    body: String,
}

async fn respond(request: Request<Incoming>, body: Bytes) -> Result<Response<Full<Bytes>>, Infallible> {
    tracing::debug!(method = %request.method(), path = %request.uri().path(), "Request");
    Ok(Response::new(Full::new(body)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mock_backend=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let body = Bytes::from(cli.body);

    let listener = TcpListener::bind(cli.listen).await?;
    tracing::info!(address = %listener.local_addr()?, "Mock backend listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "Accept failed");
                continue;
            }
        };

        let body = body.clone();
        tokio::spawn(async move {
            let service = service_fn(move |request| respond(request, body.clone()));
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!(peer_addr = %peer, error = %e, "Connection error");
            }
        });
    }
}
