//! Simulation engine.
//!
//! Owns the live actor set and advances it one fixed step at a time:
//! 1. Motion from two noise fields (turn rate, speed).
//! 2. Toroidal wrap per axis.
//! 3. Predator/prey resolution over every ordered pair.
//! 4. Removal of eaten actors.
//!
//! Determinism notes:
//! - Actors live in a `Vec` in spawn order, so pair scans are stable.
//! - Predation geometry is captured once per tick before any outcome is
//!   applied; growth and removals are deferred until the scan ends.

use std::f32::consts::TAU;

use fishfight_shared::{
    config::WorldSize,
    math::Vec2,
    net::{EatenEvent, Snapshot},
    noise::{advance_phase, GradientNoise},
};
use rand::Rng;
use tracing::debug;

use crate::actor::Actor;

pub struct Simulation {
    world: WorldSize,
    turn_field: GradientNoise,
    speed_field: GradientNoise,
    actors: Vec<Actor>,
}

impl Simulation {
    /// Creates an empty simulation with freshly seeded noise fields.
    pub fn new<R: Rng + ?Sized>(world: WorldSize, rng: &mut R) -> Self {
        Self {
            world,
            turn_field: GradientNoise::new(rng),
            speed_field: GradientNoise::new(rng),
            actors: Vec::new(),
        }
    }

    pub fn world(&self) -> WorldSize {
        self.world
    }

    /// Live actors in spawn order.
    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Actor> {
        self.actors.iter().find(|a| a.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Actor> {
        self.actors.iter_mut().find(|a| a.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Adds an actor unless one with the same id is alive. Returns whether it
    /// was added.
    pub fn insert(&mut self, actor: Actor) -> bool {
        if self.contains(&actor.id) {
            return false;
        }
        self.actors.push(actor);
        true
    }

    /// Advances every actor by `dt` seconds and returns this tick's meals.
    pub fn step(&mut self, dt: f32) -> Vec<EatenEvent> {
        for actor in &mut self.actors {
            steer(actor, &self.turn_field, &self.speed_field, dt);
            wrap(actor, self.world);
        }
        self.resolve_predation()
    }

    fn resolve_predation(&mut self) -> Vec<EatenEvent> {
        let n = self.actors.len();
        let probes: Vec<(Vec2, Vec2, f32)> = self
            .actors
            .iter()
            .map(|a| (a.world_mouth(), a.world_back(), a.mouth_radius()))
            .collect();

        let mut eaten = vec![false; n];
        let mut meals = vec![0u32; n];
        let mut events = Vec::new();

        for i in 0..n {
            if eaten[i] {
                continue;
            }
            let (mouth, _, mouth_r) = probes[i];
            for j in 0..n {
                if i == j || eaten[j] {
                    continue;
                }
                let (_, back, prey_r) = probes[j];
                if mouth.distance(back) <= mouth_r + prey_r {
                    eaten[j] = true;
                    meals[i] += 1;
                    debug!(eater = %self.actors[i].id, prey = %self.actors[j].id, "Actor eaten");
                    events.push(EatenEvent {
                        eater_id: self.actors[i].id.clone(),
                        prey_id: self.actors[j].id.clone(),
                    });
                }
            }
        }

        for (actor, count) in self.actors.iter_mut().zip(&meals) {
            for _ in 0..*count {
                actor.grow();
            }
        }
        let mut index = 0;
        self.actors.retain(|_| {
            let keep = !eaten[index];
            index += 1;
            keep
        });

        events
    }

    /// Full state of every live actor.
    pub fn snapshot(&self, t: i64) -> Snapshot {
        Snapshot {
            t,
            world: self.world,
            actors: self.actors.iter().map(Actor::to_state).collect(),
        }
    }
}

fn steer(actor: &mut Actor, turn_field: &GradientNoise, speed_field: &GradientNoise, dt: f32) {
    let tuning = actor.tuning;
    let turn = turn_field.sample(actor.turn_phase);
    let throttle = speed_field.sample(actor.speed_phase);

    actor.heading = (actor.heading + turn * tuning.turn_speed * dt).rem_euclid(TAU);
    let speed = (0.5 + 0.5 * throttle) * tuning.speed_scale;
    actor.vel = Vec2::from_angle(actor.heading) * speed;
    actor.pos += actor.vel * dt;

    actor.turn_phase = advance_phase(actor.turn_phase, tuning.noise_speed * dt);
    actor.speed_phase = advance_phase(actor.speed_phase, tuning.noise_speed * dt);
}

/// Teleports to the opposite edge once the scaled box has fully left the
/// world on that axis.
fn wrap(actor: &mut Actor, world: WorldSize) {
    let margin = actor.half_extent();
    actor.pos.x = wrap_axis(actor.pos.x, margin.x, world.w);
    actor.pos.y = wrap_axis(actor.pos.y, margin.y, world.h);
}

fn wrap_axis(v: f32, margin: f32, extent: f32) -> f32 {
    if v < -margin {
        extent + margin
    } else if v > extent + margin {
        -margin
    } else {
        v
    }
}
