//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p fishfight_server -- [--addr 0.0.0.0:3000] [--tick-hz 30]
//!       [--broadcast-hz 15] [--seed 42] [--static-dir ./public]
//!
//! `PORT` in the environment overrides the port of the listen address.
//!
//! Console commands:
//!   status    - Show server status
//!   drawings  - List stored drawings
//!   quit      - Shutdown server

use std::env;
use std::io::{BufRead, Write};

use anyhow::Context;
use fishfight_server::{gateway::build_router, GameServer};
use fishfight_shared::config::ServerConfig;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

fn parse_args() -> ServerConfig {
    let mut cfg = ServerConfig::default();
    if let Ok(port) = env::var("PORT") {
        match port.parse::<u16>() {
            Ok(port) => cfg = cfg.with_port(port),
            Err(_) => warn!(%port, "Ignoring unparsable PORT"),
        }
    }

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().unwrap_or(30);
                i += 2;
            }
            "--broadcast-hz" if i + 1 < args.len() => {
                cfg.broadcast_hz = args[i + 1].parse().unwrap_or(15);
                i += 2;
            }
            "--seed" if i + 1 < args.len() => {
                cfg.seed = args[i + 1].parse().ok();
                i += 2;
            }
            "--static-dir" if i + 1 < args.len() => {
                cfg.static_dir = Some(args[i + 1].clone());
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args();
    info!(
        addr = %cfg.server_addr,
        tick_hz = cfg.tick_hz,
        broadcast_hz = cfg.broadcast_hz,
        "Starting server"
    );

    let mut server = GameServer::new(cfg.clone());
    let app = build_router(server.handle(), &cfg);

    let listener = tokio::net::TcpListener::bind(cfg.server_addr.as_str())
        .await
        .with_context(|| format!("bind {}", cfg.server_addr))?;
    let local = listener.local_addr().context("local_addr")?;
    info!(%local, "Server listening");
    info!("  Local:   http://localhost:{}", local.port());

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "HTTP server exited unexpectedly");
        }
    });

    // Set up console input channel.
    let (console_tx, console_rx) = mpsc::channel::<String>(32);
    server.set_console_input(console_rx);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Server ready. Type 'status' for info, 'drawings' to list drawings, 'quit' to exit.");
    println!();

    server.run().await
}
