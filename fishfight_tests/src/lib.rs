//! Helpers shared by the integration tests.

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use axum::{body::Body, http::Request, response::Response, Router};
use fishfight_server::{broadcast::Frame, gateway::build_router, GameServer, ServerHandle};
use fishfight_shared::{
    config::ServerConfig,
    net::{decode, ServerMsg},
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::broadcast, task::JoinHandle};

/// Seeded config on an ephemeral loopback port.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        server_addr: "127.0.0.1:0".to_string(),
        seed: Some(7),
        ..Default::default()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// A server task running in the background plus a router wired to it.
pub struct TestServer {
    pub handle: ServerHandle,
    pub router: Router,
    pub task: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    pub fn start(cfg: ServerConfig) -> Self {
        let server = GameServer::new(cfg.clone());
        let handle = server.handle();
        let router = build_router(handle.clone(), &cfg);
        let task = tokio::spawn(server.run());
        Self {
            handle,
            router,
            task,
        }
    }

    /// Serves the router on an ephemeral loopback port in the background.
    pub async fn serve(&self) -> anyhow::Result<SocketAddr> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind ephemeral")?;
        let addr = listener.local_addr()?;
        let app = self.router.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(addr)
    }

    /// Stops the server task and waits for it.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.handle.console("quit").await?;
        self.task.await?
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    post_raw(uri, body.to_string())
}

pub fn post_raw(uri: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .expect("valid request")
}

pub async fn body_json(resp: Response) -> anyhow::Result<Value> {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// A 40x40 drawing with mouth on the right and back on the left.
pub fn fish_payload(id: Option<&str>) -> Value {
    let mut body = json!({
        "strokes": [[{"x": 5, "y": 20}, {"x": 35, "y": 20}], [{"x": 20, "y": 10}, {"x": 20, "y": 30}]],
        "bounds": {"minX": 0, "minY": 0, "maxX": 40, "maxY": 40},
        "anchors": {"mouth": {"x": 35, "y": 20}, "back": {"x": 5, "y": 20}}
    });
    if let Some(id) = id {
        body["id"] = json!(id);
    }
    body
}

/// Reads frames until one matches `pred`, failing after `timeout`.
pub async fn next_matching(
    updates: &mut broadcast::Receiver<Frame>,
    timeout: Duration,
    mut pred: impl FnMut(&ServerMsg) -> bool,
) -> anyhow::Result<ServerMsg> {
    tokio::time::timeout(timeout, async {
        loop {
            let frame = updates.recv().await?;
            let msg = decode(&frame)?;
            if pred(&msg) {
                return Ok::<_, anyhow::Error>(msg);
            }
        }
    })
    .await?
}
