//! One-dimensional gradient noise.
//!
//! Each field owns a table of random gradients at the integer lattice points
//! and blends the two surrounding contributions with a quintic fade, so the
//! output is continuous (and C2) in the sample position. The table wraps, which
//! makes every field periodic with period [`GradientNoise::PERIOD`].

use rand::Rng;

const TABLE_LEN: usize = 256;

/// A seeded smooth noise field over the real line.
#[derive(Debug, Clone)]
pub struct GradientNoise {
    gradients: [f32; TABLE_LEN],
}

impl GradientNoise {
    /// Distance after which the field repeats.
    pub const PERIOD: f32 = TABLE_LEN as f32;

    /// Builds a field with gradients drawn from `rng`.
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut gradients = [0.0; TABLE_LEN];
        for g in gradients.iter_mut() {
            *g = rng.gen_range(-1.0..=1.0);
        }
        Self { gradients }
    }

    /// Samples the field. The result is always in `[-1, 1]`.
    pub fn sample(&self, x: f32) -> f32 {
        let x0 = x.floor();
        let t = x - x0;
        let i0 = x0 as i64;

        let v0 = self.gradient(i0) * t;
        let v1 = self.gradient(i0 + 1) * (t - 1.0);
        let u = fade(t);

        // Raw 1D gradient noise peaks at +-0.5.
        ((v0 + (v1 - v0) * u) * 2.0).clamp(-1.0, 1.0)
    }

    fn gradient(&self, i: i64) -> f32 {
        self.gradients[i.rem_euclid(TABLE_LEN as i64) as usize]
    }
}

fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

/// Advances a phase by `delta`, folding it back into one noise period.
pub fn advance_phase(phase: f32, delta: f32) -> f32 {
    (phase + delta).rem_euclid(GradientNoise::PERIOD)
}
