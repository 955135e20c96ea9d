//! `fishfight_shared`
//!
//! Types shared by the fish-fight server and anything that talks to it.
//!
//! Design goals:
//! - Deterministic and side-effect free (no sockets, no clocks except `now_millis`).
//! - Wire records match the JSON browser clients already read.
//! - No `unsafe`.

pub mod config;
pub mod math;
pub mod net;
pub mod noise;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::math::*;
    pub use crate::net::*;
    pub use crate::noise::*;
}
