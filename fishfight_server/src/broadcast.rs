//! Broadcast scheduling and fan-out.
//!
//! The simulation ticks at `tick_hz`; snapshots go out at the lower
//! `broadcast_hz`. `BroadcastGate` decides after each batch of ticks whether a
//! snapshot is due. `Broadcaster` serializes a message once and hands the same
//! text frame to every connection through a `tokio::sync::broadcast` channel.
//! A slow connection lags and skips frames on its own side; nothing here waits
//! for it.

use std::{sync::Arc, time::Duration};

use fishfight_shared::net::{encode, ServerMsg};
use tokio::{sync::broadcast, time::Instant};

/// Pre-serialized JSON text frame shared by all connections.
pub type Frame = Arc<str>;

/// Frames buffered per connection before it starts skipping.
pub const CHANNEL_CAPACITY: usize = 256;

/// Time-windowed snapshot gate.
///
/// Due times advance on a fixed schedule rather than from the last send, so
/// tick jitter does not pull the average rate below `broadcast_hz`.
#[derive(Debug, Clone)]
pub struct BroadcastGate {
    interval: Duration,
    next_due: Option<Instant>,
}

impl BroadcastGate {
    pub fn new(broadcast_hz: u32) -> Self {
        Self {
            interval: Duration::from_nanos(1_000_000_000 / u64::from(broadcast_hz.max(1))),
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true (and books the next slot) when a snapshot is due at `now`.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now < due => false,
            Some(due) => {
                let next = due + self.interval;
                // Fell more than a whole window behind: restart the schedule.
                self.next_due = Some(if next <= now { now + self.interval } else { next });
                true
            }
            None => {
                self.next_due = Some(now + self.interval);
                true
            }
        }
    }
}

/// Fan-out hub for real-time frames.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<Frame>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(CHANNEL_CAPACITY)
    }
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.tx.subscribe()
    }

    /// Number of live subscribers (connected clients).
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Serializes and sends `msg` to every subscriber. Returns how many
    /// subscribers it reached; zero when nobody is connected.
    pub fn send(&self, msg: &ServerMsg) -> anyhow::Result<usize> {
        let frame: Frame = encode(msg)?.into();
        Ok(self.tx.send(frame).unwrap_or(0))
    }
}
