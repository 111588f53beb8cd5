//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use sinkplot::config::{App, Config, Route, Sink, Upstream};
use sinkplot::lifecycle::ManagerError;
use sinkplot::{Manager, ManagerOptions};

/// Reserve a free loopback port. The port is released before returning.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Read until the end of the request head so the client never sees a reset.
async fn read_request_head(socket: &mut TcpStream) {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    return;
                }
            }
        }
    }
}

/// Start a simple mock backend that returns a fixed response.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (200, response.to_string()) }).await
}

/// Start a mock backend that waits `delay` before answering.
pub async fn start_slow_backend(delay: Duration, response: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move {
        tokio::time::sleep(delay).await;
        (200, response.to_string())
    })
    .await
}

/// Start a programmable mock backend with async support.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
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
                        read_request_head(&mut socket).await;
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// A client that never reuses connections, so each request sees the
/// routing table current at send time.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

pub fn upstream(addr: SocketAddr) -> Upstream {
    Upstream {
        address: addr.ip().to_string(),
        port: i64::from(addr.port()),
        weight: None,
    }
}

pub fn route(path: &str, sink: &str) -> Route {
    Route {
        path: path.into(),
        sink: sink.into(),
        ..Default::default()
    }
}

pub fn sink(name: &str, upstreams: &[SocketAddr]) -> Sink {
    Sink {
        name: name.into(),
        strategy: None,
        upstreams: upstreams.iter().copied().map(upstream).collect(),
    }
}

pub fn config(listeners: &[u16], routes: Vec<Route>, sinks: Vec<Sink>) -> Config {
    Config {
        app: App {
            name: "it".into(),
            listeners: listeners.iter().map(|p| i64::from(*p)).collect(),
            routes,
            sinks,
        },
    }
}

pub fn options(shutdown_timeout: Duration) -> ManagerOptions {
    ManagerOptions {
        bind_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        control_address: SocketAddr::from(([127, 0, 0, 1], 0)),
        shutdown_timeout,
        ..Default::default()
    }
}

pub struct Running {
    pub manager: Arc<Manager>,
    pub task: JoinHandle<Result<(), ManagerError>>,
    pub control: SocketAddr,
}

/// Start a manager in the background and wait until every port accepts.
pub async fn spawn_manager(options: ManagerOptions, config: Config) -> Running {
    let ports: Vec<u16> = config.app.listener_ports();
    let manager = Arc::new(Manager::new(options));
    let task = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.start(config).await })
    };

    let mut control = None;
    for _ in 0..100 {
        control = manager.control_addr();
        if control.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let control = control.expect("control endpoint never came up");

    for port in ports {
        wait_for_port(port).await;
    }

    Running {
        manager,
        task,
        control,
    }
}

pub async fn wait_for_port(port: u16) {
    for _ in 0..100 {
        if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("port {port} never accepted connections");
}
