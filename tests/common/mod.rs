//! Shared utilities for integration and load testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use request_supervisor::http::SupervisedServer;
use request_supervisor::supervisor::LogWriter;
use request_supervisor::Supervisor;

/// A running server bound to an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stop accepting and wait for in-flight requests.
    #[allow(dead_code)]
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Start `supervisor` behind axum on 127.0.0.1 with a random port.
pub async fn start_server(supervisor: Supervisor) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let shutdown = async move {
            let _ = rx.await;
        };
        let _ = SupervisedServer::new(supervisor)
            .run_until(listener, shutdown)
            .await;
    });

    TestServer {
        addr,
        shutdown: Some(tx),
        handle: Some(handle),
    }
}

/// Access-log writer backed by memory.
pub fn memory_log() -> (Arc<Mutex<Vec<u8>>>, Arc<dyn LogWriter>) {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let writer: Arc<dyn LogWriter> = buffer.clone();
    (buffer, writer)
}

pub fn log_lines(buffer: &Arc<Mutex<Vec<u8>>>) -> Vec<String> {
    String::from_utf8(buffer.lock().unwrap().clone())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
