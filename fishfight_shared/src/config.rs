//! Configuration system.
//!
//! Loads server configuration from JSON strings (file IO left to app).

use serde::{Deserialize, Serialize};

/// World rectangle every actor position wraps around.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldSize {
    pub w: f32,
    pub h: f32,
}

impl Default for WorldSize {
    fn default() -> Self {
        Self {
            w: 1920.0,
            h: 1080.0,
        }
    }
}

/// Per-actor motion constants applied at spawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActorTuning {
    /// Noise phase advance per second.
    pub noise_speed: f32,
    /// Max linear speed in px/sec.
    pub speed_scale: f32,
    /// Max turn rate in rad/sec.
    pub turn_speed: f32,
}

impl Default for ActorTuning {
    fn default() -> Self {
        Self {
            noise_speed: 0.35,
            speed_scale: 100.0,
            turn_speed: 1.8,
        }
    }
}

/// Root server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, e.g. `0.0.0.0:3000`.
    pub server_addr: String,
    /// Fixed simulation tick rate.
    pub tick_hz: u32,
    /// Snapshot rate; lower than `tick_hz`.
    #[serde(default = "default_broadcast_hz")]
    pub broadcast_hz: u32,
    #[serde(default)]
    pub world: WorldSize,
    #[serde(default)]
    pub tuning: ActorTuning,
    /// Fixed RNG seed. `None` seeds from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Directory served as static files for the browser client.
    #[serde(default)]
    pub static_dir: Option<String>,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_broadcast_hz() -> u32 {
    15
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: "0.0.0.0:3000".to_string(),
            tick_hz: 30,
            broadcast_hz: default_broadcast_hz(),
            world: WorldSize::default(),
            tuning: ActorTuning::default(),
            seed: None,
            static_dir: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Replaces the port of `server_addr`, keeping the host.
    pub fn with_port(mut self, port: u16) -> Self {
        let host = match self.server_addr.rsplit_once(':') {
            Some((host, _)) => host.to_string(),
            None => self.server_addr.clone(),
        };
        self.server_addr = format!("{host}:{port}");
        self
    }

    /// Simulation step length in seconds.
    pub fn tick_dt(&self) -> f32 {
        1.0 / self.tick_hz.max(1) as f32
    }
}
