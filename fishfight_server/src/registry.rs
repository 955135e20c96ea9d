//! Drawing registry.
//!
//! Append-only, in-memory store of submitted drawings. Records are never
//! mutated or removed; a restart loses them. Validation of raw request bodies
//! also lives here so the HTTP layer and tests share one definition of
//! "well-formed".

use fishfight_shared::net::{now_millis, Anchors, Bounds, Drawing, Stroke};
use rand::Rng;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

const MISSING_FIELDS: &str = "expected strokes[] and bounds{}";

/// Submission errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

fn invalid(msg: impl Into<String>) -> RegistryError {
    RegistryError::InvalidPayload(msg.into())
}

/// A validated submission that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingSubmission {
    pub id: Option<String>,
    pub strokes: Vec<Stroke>,
    pub bounds: Bounds,
    pub anchors: Option<Anchors>,
}

impl DrawingSubmission {
    /// Parses and validates a raw JSON request body.
    pub fn from_json(body: &[u8]) -> Result<Self, RegistryError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| invalid(format!("malformed JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Validates an already-parsed body.
    ///
    /// `strokes` must be an array (possibly empty) of point arrays and
    /// `bounds` must be present with `min <= max` on both axes. Every
    /// coordinate must fit a finite `f32`. `anchors` and
    /// `id` are optional; `null` counts as absent.
    pub fn from_value(value: Value) -> Result<Self, RegistryError> {
        let Value::Object(mut body) = value else {
            return Err(invalid(MISSING_FIELDS));
        };

        let strokes = match body.remove("strokes") {
            Some(v @ Value::Array(_)) => serde_json::from_value::<Vec<Stroke>>(v)
                .map_err(|e| invalid(format!("strokes: {e}")))?,
            _ => return Err(invalid(MISSING_FIELDS)),
        };
        if !strokes.iter().flatten().all(|p| p.is_finite()) {
            return Err(invalid("strokes: coordinates must be finite"));
        }

        let bounds = match body.remove("bounds") {
            None | Some(Value::Null) => return Err(invalid(MISSING_FIELDS)),
            Some(v) => {
                serde_json::from_value::<Bounds>(v).map_err(|e| invalid(format!("bounds: {e}")))?
            }
        };
        if !bounds.is_well_formed() {
            return Err(invalid("bounds: min must not exceed max"));
        }

        let anchors = match body.remove("anchors") {
            None | Some(Value::Null) => None,
            Some(v) => Some(
                serde_json::from_value::<Anchors>(v)
                    .map_err(|e| invalid(format!("anchors: {e}")))?,
            ),
        };
        if anchors.is_some_and(|a| !(a.mouth.is_finite() && a.back.is_finite())) {
            return Err(invalid("anchors: coordinates must be finite"));
        }

        let id = match body.remove("id") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(_) => return Err(invalid("id: expected a string")),
        };

        Ok(Self {
            id,
            strokes,
            bounds,
            anchors,
        })
    }
}

/// Builds a server-side id: `<unix millis>_<random 0..=1e6>`.
pub fn generate_id<R: Rng + ?Sized>(now_ms: i64, rng: &mut R) -> String {
    format!("{}_{}", now_ms, rng.gen_range(0..=1_000_000u32))
}

/// Insertion-ordered drawing store.
#[derive(Debug, Default)]
pub struct DrawingRegistry {
    drawings: Vec<Drawing>,
}

impl DrawingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the registry with previously stored records, keeping their order.
    pub fn from_drawings(drawings: Vec<Drawing>) -> Self {
        Self { drawings }
    }

    /// Stores a validated submission and returns the stored record.
    ///
    /// A caller-supplied id that is already present is stored again as a
    /// separate record.
    pub fn submit<R: Rng + ?Sized>(&mut self, sub: DrawingSubmission, rng: &mut R) -> &Drawing {
        let timestamp = now_millis();
        let id = match sub.id {
            Some(id) => id,
            None => generate_id(timestamp, rng),
        };
        if self.contains(&id) {
            warn!(%id, "Drawing id submitted again; storing duplicate record");
        }

        let index = self.drawings.len();
        self.drawings.push(Drawing {
            id,
            strokes: sub.strokes,
            bounds: sub.bounds,
            anchors: sub.anchors,
            timestamp,
        });
        &self.drawings[index]
    }

    /// All records in insertion order.
    pub fn list_all(&self) -> &[Drawing] {
        &self.drawings
    }

    /// First record stored under `id`.
    pub fn get(&self, id: &str) -> Option<&Drawing> {
        self.drawings.iter().find(|d| d.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.drawings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawings.is_empty()
    }
}
