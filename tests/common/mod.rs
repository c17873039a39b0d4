//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use edge_gateway::auth::context::is_auth_field;
use edge_gateway::auth::signer;
use edge_gateway::config::{CredentialConfig, GatewayConfig};
use edge_gateway::auth::CredentialStatus;
use edge_gateway::{HttpServer, Shutdown};

pub const ACCESS_KEY: &str = "test-access-key";
pub const SECRET_KEY: &str = "test-secret-key";

/// What the mock upstream answers with.
#[derive(Clone)]
pub struct UpstreamReply {
    pub status: u16,
    pub chunks: Vec<Vec<u8>>,
}

impl UpstreamReply {
    pub fn ok(body: &str) -> Self {
        Self {
            status: 200,
            chunks: vec![body.as_bytes().to_vec()],
        }
    }
}

/// A mock upstream that records every raw request head it receives.
#[derive(Clone)]
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl MockUpstream {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<String> {
        self.requests.lock().unwrap().last().cloned()
    }
}

/// Start an upstream that always replies with `reply` using chunked encoding.
pub async fn start_mock_upstream(reply: UpstreamReply) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = MockUpstream {
        addr: listener.local_addr().unwrap(),
        hits: Arc::new(AtomicUsize::new(0)),
        requests: Arc::new(Mutex::new(Vec::new())),
    };

    let state = upstream.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let state = state.clone();
            let reply = reply.clone();
            tokio::spawn(async move {
                serve_connection(socket, state, reply).await;
            });
        }
    });

    upstream
}

async fn serve_connection(mut socket: TcpStream, state: MockUpstream, reply: UpstreamReply) {
    let mut head = Vec::new();
    let mut buf = [0u8; 4096];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    state.hits.fetch_add(1, Ordering::SeqCst);
    state.requests.lock().unwrap().push(String::from_utf8_lossy(&head).into_owned());

    let reason = match reply.status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    let head = format!(
        "HTTP/1.1 {} {}\r\nTransfer-Encoding: chunked\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        reply.status, reason
    );
    if socket.write_all(head.as_bytes()).await.is_err() {
        return;
    }
    for chunk in &reply.chunks {
        let frame = format!("{:x}\r\n", chunk.len());
        if socket.write_all(frame.as_bytes()).await.is_err()
            || socket.write_all(chunk).await.is_err()
            || socket.write_all(b"\r\n").await.is_err()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    let _ = socket.write_all(b"0\r\n\r\n").await;
    let _ = socket.shutdown().await;
}

/// Gateway config pointing at `upstream` with one active test credential.
pub fn gateway_config(upstream: SocketAddr, allow_list: &[&str]) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.address = upstream.to_string();
    config.upstream.timeout_secs = 2;
    config.admission.allow_list = allow_list.iter().map(|s| s.to_string()).collect();
    config.observability.metrics_enabled = false;
    config.credentials.push(CredentialConfig {
        access_key: ACCESS_KEY.into(),
        secret_key: SECRET_KEY.into(),
        status: CredentialStatus::Active,
    });
    config
}

/// Start the gateway on an ephemeral port. Trigger the returned handle to stop it.
pub async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    (addr, shutdown)
}

pub fn now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

/// Authentication headers for `path_and_query` signed with the test credential.
pub fn signed_headers(path_and_query: &str, nonce: &str) -> reqwest::header::HeaderMap {
    let params: Vec<(String, String)> = path_and_query
        .split_once('?')
        .map(|(_, q)| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .filter(|(k, _)| !is_auth_field(k))
                .collect()
        })
        .unwrap_or_default();
    let timestamp = now();
    let sign = signer::sign(SECRET_KEY.as_bytes(), ACCESS_KEY, nonce, timestamp, &params);

    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert("accesskey", ACCESS_KEY.parse().unwrap());
    headers.insert("nonce", nonce.parse().unwrap());
    headers.insert("timestamp", timestamp.to_string().parse().unwrap());
    headers.insert("sign", sign.parse().unwrap());
    headers
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
