//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Path, routing::get, Json, Router};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use edge_gateway::config::{ConfigHandle, GatewayConfig, ReloadCoordinator};
use edge_gateway::discovery::ServiceDiscovery;
use edge_gateway::lifecycle::{GatewayBuilder, Shutdown};

/// Request head as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

async fn read_head(socket: &mut TcpStream) -> Option<SeenRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let text = String::from_utf8_lossy(&buf).to_string();
    let mut lines = text.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers = lines
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    Some(SeenRequest {
        method,
        target,
        headers,
    })
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a simple mock backend that returns a fixed response.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move |_seen| async move { (200, response.to_string()) }).await
}

/// Start a programmable mock backend; `f` sees each request head.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(SeenRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(seen) = read_head(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(seen).await;
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_line(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// Backend that answers after `delay`.
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    start_programmable_backend(move |_seen| async move {
        tokio::time::sleep(delay).await;
        (200, "slow".to_string())
    })
    .await
}

/// Backend that sends its headers and `head`, stalls for `stall`, then sends `tail`.
pub async fn start_stalling_body_backend(
    head: &'static str,
    stall: Duration,
    tail: &'static str,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if read_head(&mut socket).await.is_none() {
                    return;
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    head.len() + tail.len(),
                    head
                );
                let _ = socket.write_all(response.as_bytes()).await;
                tokio::time::sleep(stall).await;
                let _ = socket.write_all(tail.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Minimal Consul health endpoint: every service resolves to `instance`.
pub async fn start_mock_consul(instance: SocketAddr) -> String {
    let app = Router::new().route(
        "/v1/health/service/{name}",
        get(move |Path(name): Path<String>| async move {
            Json(json!([{
                "Node": { "Address": "127.0.0.1" },
                "Service": {
                    "ID": format!("{name}-1"),
                    "Service": name,
                    "Address": instance.ip().to_string(),
                    "Port": instance.port(),
                    "Meta": {}
                }
            }]))
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn temp_config_path() -> PathBuf {
    std::env::temp_dir().join(format!("edge-gateway-it-{}.toml", uuid::Uuid::new_v4()))
}

/// A gateway running in the background on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub config: ConfigHandle,
    pub coordinator: Arc<ReloadCoordinator>,
    pub shutdown: Arc<Shutdown>,
    pub config_path: PathBuf,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
        let _ = std::fs::remove_file(&self.config_path);
    }
}

pub async fn start_gateway(
    config: GatewayConfig,
    discovery: Option<Arc<dyn ServiceDiscovery>>,
) -> TestGateway {
    let config_path = temp_config_path();
    std::fs::write(&config_path, toml::to_string(&config).unwrap()).unwrap();

    let mut builder = GatewayBuilder::new(config_path.clone(), config);
    if let Some(discovery) = discovery {
        builder = builder.discovery(discovery);
    }
    let gateway = builder.build().await;
    let handle = gateway.config.clone();
    let coordinator = Arc::clone(&gateway.coordinator);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Arc::new(Shutdown::new());
    let run_shutdown = Arc::clone(&shutdown);
    tokio::spawn(async move {
        let _ = gateway.run(listener, run_shutdown).await;
    });

    TestGateway {
        addr,
        config: handle,
        coordinator,
        shutdown,
        config_path,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn static_route(path: &str, target: SocketAddr, timeout: &str) -> edge_gateway::config::RouteConfig {
    edge_gateway::config::RouteConfig {
        path: path.to_string(),
        target_url: Some(format!("http://{target}")),
        service_name: None,
        timeout: timeout.to_string(),
    }
}
