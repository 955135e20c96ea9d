//! `fishfight_server`
//!
//! Server-side systems:
//! - Drawing registry (append-only, in memory)
//! - Actor factory (drawing -> simulated creature)
//! - Fixed timestep simulation with noise-driven steering and predation
//! - Snapshot broadcast at a lower rate than the tick rate
//!
//! Networking model:
//! - HTTP: drawing submission and listing
//! - WebSocket: server-pushed `state`, `eaten` and `newDrawing` frames

pub mod actor;
pub mod broadcast;
pub mod clock;
pub mod gateway;
pub mod registry;
pub mod server;
pub mod sim;

pub use server::{GameServer, ServerHandle};
