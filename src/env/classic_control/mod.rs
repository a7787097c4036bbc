use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::common::spaces::with_shared_rng;

pub mod cartpole;
pub mod mountain_car;
pub mod mountain_car_continuous;
pub mod pendulum;

/// Reset RNG for an environment: seeded explicitly when a seed is
/// given, otherwise drawn from the shared space RNG.
pub(crate) fn reset_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::seed_from_u64(with_shared_rng(|rng| rng.random())),
    }
}

/// Gymnasium draws its screens y-up; plotters is y-down.
pub(crate) fn flip_y(y: f32, height: u32) -> i32 {
    (height as f32 - y).round() as i32
}
