//! Actors and the factory that builds them from drawings.
//!
//! An actor's local space is centred on the middle of its drawing's bounding
//! box. Anchor offsets are stored in that space, unrotated and unscaled, so
//! world-space anchors are `pos + rotate(offset, heading) * scale`.

use std::f32::consts::TAU;

use fishfight_shared::{
    config::{ActorTuning, WorldSize},
    math::Vec2,
    net::{ActorState, Drawing},
    noise::GradientNoise,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Smallest width/height an actor can have.
pub const MIN_ACTOR_SIZE: f32 = 32.0;
/// Mouth radius as a fraction of the smaller side.
pub const MOUTH_RADIUS_FRACTION: f32 = 0.12;
pub const MIN_MOUTH_RADIUS: f32 = 8.0;
/// Scale multiplier applied per meal.
pub const GROWTH_PER_MEAL: f32 = 1.15;
pub const MAX_SCALE: f32 = 4.0;

/// Unscaled actor dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub w: f32,
    pub h: f32,
}

/// A live simulated creature.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    /// Same as the owning drawing's id.
    pub id: String,
    /// World position of the local centre.
    pub pos: Vec2,
    /// Facing, radians.
    pub heading: f32,
    /// Velocity from the last tick.
    pub vel: Vec2,
    pub size: Size,
    pub mouth_offset: Vec2,
    pub back_offset: Vec2,
    pub scale: f32,
    /// Phase into the turn noise field.
    pub turn_phase: f32,
    /// Phase into the speed noise field.
    pub speed_phase: f32,
    pub tuning: ActorTuning,
}

impl Actor {
    /// Builds an actor for `drawing` at a random spot in `world`.
    ///
    /// Never fails: zero-area drawings still get a `MIN_ACTOR_SIZE` box.
    pub fn spawn<R: Rng + ?Sized>(
        drawing: &Drawing,
        world: WorldSize,
        tuning: ActorTuning,
        rng: &mut R,
    ) -> Self {
        let bounds = &drawing.bounds;
        let size = Size {
            w: bounds.width().ceil().max(MIN_ACTOR_SIZE),
            h: bounds.height().ceil().max(MIN_ACTOR_SIZE),
        };
        let center = Vec2::new(size.w / 2.0, size.h / 2.0);
        let to_local = |p: Vec2| p - bounds.min() - center;

        let (heading, mouth_offset, back_offset) = match drawing.anchors {
            Some(a) => {
                let axis = a.mouth - a.back;
                (axis.y.atan2(axis.x), to_local(a.mouth), to_local(a.back))
            }
            None => (rng.gen::<f32>() * TAU, Vec2::ZERO, Vec2::ZERO),
        };

        Self {
            id: drawing.id.clone(),
            pos: Vec2::new(rng.gen::<f32>() * world.w, rng.gen::<f32>() * world.h),
            heading,
            vel: Vec2::ZERO,
            size,
            mouth_offset,
            back_offset,
            scale: 1.0,
            turn_phase: rng.gen::<f32>() * GradientNoise::PERIOD,
            speed_phase: rng.gen::<f32>() * GradientNoise::PERIOD,
            tuning,
        }
    }

    /// Maps a local-space offset into world space.
    pub fn to_world(&self, offset: Vec2) -> Vec2 {
        self.pos + offset.rotate(self.heading) * self.scale
    }

    pub fn world_mouth(&self) -> Vec2 {
        self.to_world(self.mouth_offset)
    }

    pub fn world_back(&self) -> Vec2 {
        self.to_world(self.back_offset)
    }

    pub fn mouth_radius(&self) -> f32 {
        (self.size.w.min(self.size.h) * MOUTH_RADIUS_FRACTION * self.scale).max(MIN_MOUTH_RADIUS)
    }

    /// Half of the scaled bounding box, per axis.
    pub fn half_extent(&self) -> Vec2 {
        Vec2::new(self.size.w, self.size.h) * (self.scale / 2.0)
    }

    /// Applies one meal's growth, capped at `MAX_SCALE`.
    pub fn grow(&mut self) {
        self.scale = (self.scale * GROWTH_PER_MEAL).min(MAX_SCALE);
    }

    pub fn to_state(&self) -> ActorState {
        ActorState {
            id: self.id.clone(),
            x: self.pos.x,
            y: self.pos.y,
            vx: self.vel.x,
            vy: self.vel.y,
            heading: self.heading,
            scale: self.scale,
            mouth_offset: self.mouth_offset,
            back_offset: self.back_offset,
            w: self.size.w,
            h: self.size.h,
        }
    }
}
