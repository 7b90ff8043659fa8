//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::convert::Infallible;
use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use tally_proxy::backend::BackendPool;
use tally_proxy::net::{ClientConnections, Listener};
use tally_proxy::{ProxyConfig, ProxyServer, Shutdown, StatsLedger};

/// A keep-alive HTTP/1.1 backend on an ephemeral port.
pub struct TestBackend {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
}

impl TestBackend {
    /// TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Start a backend whose responses come from `handler`.
pub async fn spawn_backend<F, Fut>(handler: F) -> TestBackend
where
    F: Fn(Request<Incoming>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let handler = handler.clone();
            tokio::spawn(async move {
                let service = service_fn(move |request| {
                    let handler = handler.clone();
                    async move { Ok::<_, Infallible>(handler(request).await) }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    TestBackend { addr, connections }
}

/// Start a backend answering every request with `200 OK` and `body`.
pub async fn fixed_backend(body: &'static str) -> TestBackend {
    spawn_backend(move |_| async move { text(StatusCode::OK, body) }).await
}

/// Build a response; hyper adds `Content-Length` from the body.
pub fn text(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_owned())));
    *response.status_mut() = status;
    response
}

/// Start a backend that writes raw bytes: for each request head it reads, it
/// sends whatever `respond` returns for that request line, then keeps the
/// socket open for the next request.
pub async fn raw_backend<F>(respond: F) -> TestBackend
where
    F: Fn(&str) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let respond = respond.clone();
            tokio::spawn(async move {
                let (read, mut write) = stream.into_split();
                let mut reader = BufReader::new(read);
                loop {
                    let mut request_line = String::new();
                    match reader.read_line(&mut request_line).await {
                        Ok(0) | Err(_) => return,
                        Ok(_) => {}
                    }
                    let mut line = String::new();
                    loop {
                        line.clear();
                        match reader.read_line(&mut line).await {
                            Ok(0) | Err(_) => return,
                            Ok(_) if line.trim_end().is_empty() => break,
                            Ok(_) => {}
                        }
                    }
                    if write.write_all(&respond(request_line.trim_end())).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    TestBackend { addr, connections }
}

/// An address nothing is listening on.
pub fn unreachable_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// A proxy running on an ephemeral port. Stops accepting when dropped.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub ledger: Arc<StatsLedger>,
    pub pool: Arc<BackendPool>,
    pub clients: ClientConnections,
    shutdown: Shutdown,
}

impl Drop for RunningProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a proxy in front of `backend`, letting the test adjust the config.
pub async fn start_proxy(backend: SocketAddr, configure: impl FnOnce(&mut ProxyConfig)) -> RunningProxy {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.backend.address = backend.to_string();
    configure(&mut config);

    let server = ProxyServer::new(&config).unwrap();
    let ledger = server.ledger();
    let pool = server.pool();
    let clients = server.clients();

    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, stop).await;
    });

    RunningProxy {
        addr,
        ledger,
        pool,
        clients,
        shutdown,
    }
}

/// A parsed response as the client saw it on the wire.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    /// Header names lowercased, in wire order.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Hand-rolled HTTP/1.1 client on one persistent TCP connection, so tests can
/// see exactly what crosses the wire and when the proxy hangs up.
pub struct RawClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl RawClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer,
        }
    }

    pub async fn send(&mut self, method: &str, path: &str) {
        let request = format!("{} {} HTTP/1.1\r\nHost: proxy.test\r\n\r\n", method, path);
        self.writer.write_all(request.as_bytes()).await.unwrap();
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    /// Send a GET and wait for its response.
    pub async fn get(&mut self, path: &str) -> RawResponse {
        self.send("GET", path).await;
        self.read_response()
            .await
            .expect("proxy closed the connection instead of responding")
    }

    /// Read one response; `None` if the proxy closed the connection.
    ///
    /// The body is framed by `Content-Length` or chunked encoding; use
    /// `read_head` for responses that carry no body (HEAD).
    pub async fn read_response(&mut self) -> Option<RawResponse> {
        let mut response = self.read_head().await?;
        if response.header("transfer-encoding") == Some("chunked") {
            loop {
                let chunk = self.read_chunk().await;
                if chunk.is_empty() {
                    break;
                }
                response.body.extend_from_slice(&chunk);
            }
        } else {
            let length = response
                .header("content-length")
                .map(|v| v.parse::<usize>().unwrap())
                .unwrap_or(0);
            let mut body = vec![0; length];
            self.reader.read_exact(&mut body).await.unwrap();
            response.body = body;
        }
        Some(response)
    }

    /// Read a status line and headers only; `None` if the proxy closed the
    /// connection.
    pub async fn read_head(&mut self) -> Option<RawResponse> {
        let mut line = String::new();
        match self.reader.read_line(&mut line).await {
            Ok(0) => return None,
            Err(e) if e.kind() == ErrorKind::ConnectionReset => return None,
            Err(e) => panic!("read failed: {}", e),
            Ok(_) => {}
        }

        let status = line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| panic!("bad status line {:?}", line));

        let mut headers = Vec::new();
        loop {
            line.clear();
            self.reader.read_line(&mut line).await.unwrap();
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                break;
            }
            let (name, value) = trimmed.split_once(':').unwrap();
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }

        Some(RawResponse {
            status,
            headers,
            body: Vec::new(),
        })
    }

    /// Read one chunk of a chunked body; empty for the terminating chunk.
    pub async fn read_chunk(&mut self) -> Vec<u8> {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        let size_field = line.trim_end().split(';').next().unwrap_or("");
        let size = usize::from_str_radix(size_field.trim(), 16)
            .unwrap_or_else(|_| panic!("bad chunk size line {:?}", line));

        let mut chunk = vec![0; size];
        self.reader.read_exact(&mut chunk).await.unwrap();
        if size == 0 {
            // Optional trailers, then the final CRLF.
            loop {
                line.clear();
                self.reader.read_line(&mut line).await.unwrap();
                if line.trim_end().is_empty() {
                    break;
                }
            }
        } else {
            let mut crlf = [0; 2];
            self.reader.read_exact(&mut crlf).await.unwrap();
        }
        chunk
    }
}
