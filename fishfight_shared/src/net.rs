//! Wire types.
//!
//! Goals:
//! - One definition of every record that crosses the HTTP or WebSocket boundary.
//! - Field names exactly as browser clients read them (camelCase JSON).
//! - Keep serialization explicit: every real-time frame is a `ServerMsg`.
//!
//! Real-time frames are JSON text: `{"event": "<name>", "data": {...}}`.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{config::WorldSize, math::Vec2};

/// One polyline of a drawing.
pub type Stroke = Vec<Vec2>;

/// Axis-aligned bounding box in drawing space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub const fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Finite and not inverted on either axis.
    pub fn is_well_formed(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(self.min_x, self.min_y)
    }
}

/// Mouth and back points, in the same space as strokes and bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchors {
    pub mouth: Vec2,
    pub back: Vec2,
}

/// A stored creature drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    pub id: String,
    pub strokes: Vec<Stroke>,
    pub bounds: Bounds,
    pub anchors: Option<Anchors>,
    /// Creation time, unix millis.
    pub timestamp: i64,
}

/// Replicated actor state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorState {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub heading: f32,
    pub scale: f32,
    pub mouth_offset: Vec2,
    pub back_offset: Vec2,
    pub w: f32,
    pub h: f32,
}

/// Full world snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Server time, unix millis.
    pub t: i64,
    pub world: WorldSize,
    pub actors: Vec<ActorState>,
}

/// One predation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EatenEvent {
    pub eater_id: String,
    pub prey_id: String,
}

/// Server -> client real-time message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Periodic (and on-connect) full snapshot.
    State(Snapshot),
    /// Sent once per predation, immediately.
    Eaten(EatenEvent),
    /// Sent once per accepted submission, to every client.
    NewDrawing(Drawing),
}

impl ServerMsg {
    /// Event name as it appears on the wire.
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMsg::State(_) => "state",
            ServerMsg::Eaten(_) => "eaten",
            ServerMsg::NewDrawing(_) => "newDrawing",
        }
    }
}

/// Current unix time in millis.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Serializes a message into a text frame.
pub fn encode(msg: &ServerMsg) -> anyhow::Result<String> {
    serde_json::to_string(msg).with_context(|| format!("serialize {}", msg.event_name()))
}

pub fn decode(s: &str) -> anyhow::Result<ServerMsg> {
    serde_json::from_str(s).context("deserialize server msg")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn state_frame_uses_client_field_names() {
        let msg = ServerMsg::State(Snapshot {
            t: 42,
            world: WorldSize { w: 800.0, h: 400.0 },
            actors: vec![ActorState {
                id: "a".into(),
                x: 1.0,
                y: 2.0,
                vx: 0.5,
                vy: -0.5,
                heading: 0.0,
                scale: 1.0,
                mouth_offset: Vec2::new(15.0, 0.0),
                back_offset: Vec2::new(-15.0, 0.0),
                w: 40.0,
                h: 40.0,
            }],
        });
        let value: serde_json::Value = serde_json::from_str(&encode(&msg).unwrap()).unwrap();
        assert_eq!(value["event"], "state");
        assert_eq!(value["data"]["world"], json!({"w": 800.0, "h": 400.0}));
        let actor = &value["data"]["actors"][0];
        assert_eq!(actor["mouthOffset"], json!({"x": 15.0, "y": 0.0}));
        assert_eq!(actor["backOffset"]["x"], -15.0);
        assert_eq!(actor["vx"], 0.5);
    }

    #[test]
    fn eaten_and_new_drawing_event_names() {
        let eaten = ServerMsg::Eaten(EatenEvent {
            eater_id: "a".into(),
            prey_id: "b".into(),
        });
        let value: serde_json::Value = serde_json::from_str(&encode(&eaten).unwrap()).unwrap();
        assert_eq!(value, json!({"event": "eaten", "data": {"eaterId": "a", "preyId": "b"}}));

        let drawing = ServerMsg::NewDrawing(Drawing {
            id: "d".into(),
            strokes: vec![],
            bounds: Bounds::new(0.0, 0.0, 10.0, 10.0),
            anchors: None,
            timestamp: 1,
        });
        let text = encode(&drawing).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["event"], "newDrawing");
        assert_eq!(value["data"]["bounds"]["maxX"], 10.0);
        assert!(value["data"]["anchors"].is_null());
        assert_eq!(decode(&text).unwrap(), drawing);
    }

    #[test]
    fn bounds_well_formed() {
        assert!(Bounds::new(0.0, 0.0, 0.0, 0.0).is_well_formed());
        assert!(!Bounds::new(5.0, 0.0, 1.0, 3.0).is_well_formed());
        assert!(!Bounds::new(0.0, f32::NAN, 1.0, 3.0).is_well_formed());
    }
}
