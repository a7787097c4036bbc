use std::sync::{LazyLock, Mutex};

use dyn_clone::DynClone;
use rand::{rngs::StdRng, Rng, SeedableRng};

pub static SHARED_RNG: LazyLock<Mutex<StdRng>> =
    LazyLock::new(|| Mutex::new(StdRng::seed_from_u64(1234)));

/// Reseeds the RNG shared by every space (and the classic control resets)
pub fn seed_spaces_rng(seed: u64) {
    *SHARED_RNG.lock().unwrap_or_else(|e| e.into_inner()) = StdRng::seed_from_u64(seed);
}

/// Runs `f` with exclusive access to the shared RNG.
pub fn with_shared_rng<T>(f: impl FnOnce(&mut StdRng) -> T) -> T {
    let mut rng = SHARED_RNG.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut rng)
}

/// Defines a space in which a action, observation, or other may exist
pub trait Space<T: Clone>: DynClone {
    /// tests whether the sample is contained within the space
    fn contains(&self, sample: &T) -> bool;

    /// randomly samples from the space
    fn sample(&mut self) -> T;

    /// returns some semantic representation of the space of
    /// the space, to be used for initialising models
    fn shape(&self) -> T;

    /// projects a sample back into the space
    fn clip(&self, sample: T) -> T {
        sample
    }

    /// the `(low, high)` bounds of a bounded continuous space
    fn bounds(&self) -> Option<(T, T)> {
        None
    }
}

dyn_clone::clone_trait_object!(<T> Space<T> where T: Clone);

/// Defines a Discrete Space.
///
/// A Discrete space is a space on `usize` where samples
/// are drawn uniformly from `[0, n)`.
#[derive(Debug, Clone)]
pub struct Discrete {
    /// The upper bound on the space
    n: usize,
}

impl From<usize> for Discrete {
    fn from(value: usize) -> Self {
        Self { n: value }
    }
}

impl Space<usize> for Discrete {
    fn contains(&self, sample: &usize) -> bool {
        *sample < self.n
    }

    fn sample(&mut self) -> usize {
        with_shared_rng(|rng| rng.random_range(0..self.n))
    }

    fn shape(&self) -> usize {
        self.n
    }

    fn clip(&self, sample: usize) -> usize {
        sample.min(self.n.saturating_sub(1))
    }
}

/// Defines a `BoxSpace<T>`.
///
/// A `BoxSpace` is an n-dimensional container on
/// some generic `T`, where `T` is classically some
/// form of number. The only implementation is for
/// `Vec<f32>`.
#[derive(Debug, Clone)]
pub struct BoxSpace<T> {
    /// The lower bound on the space
    low: T,

    /// The upper bound on the space
    high: T,
}

impl From<(Vec<f32>, Vec<f32>)> for BoxSpace<Vec<f32>> {
    fn from(value: (Vec<f32>, Vec<f32>)) -> Self {
        assert_eq!(
            value.0.len(),
            value.1.len(),
            "BoxSpace bounds must have the same length"
        );

        Self {
            low: value.0,
            high: value.1,
        }
    }
}

impl Space<Vec<f32>> for BoxSpace<Vec<f32>> {
    fn contains(&self, sample: &Vec<f32>) -> bool {
        if sample.len() != self.low.len() {
            return false;
        }

        sample
            .iter()
            .zip(self.low.iter())
            .zip(self.high.iter())
            .all(|((&s, &l), &h)| l <= s && s <= h)
    }

    fn sample(&mut self) -> Vec<f32> {
        with_shared_rng(|rng| {
            self.low
                .iter()
                .zip(self.high.iter())
                .map(|(&l, &h)| rng.random_range(l..=h))
                .collect()
        })
    }

    fn shape(&self) -> Vec<f32> {
        self.low.clone()
    }

    fn clip(&self, sample: Vec<f32>) -> Vec<f32> {
        sample
            .into_iter()
            .zip(self.low.iter().zip(self.high.iter()))
            .map(|(s, (&l, &h))| s.clamp(l, h))
            .collect()
    }

    fn bounds(&self) -> Option<(Vec<f32>, Vec<f32>)> {
        Some((self.low.clone(), self.high.clone()))
    }
}

impl BoxSpace<Vec<f32>> {
    pub fn low(&self) -> &Vec<f32> {
        &self.low
    }

    pub fn high(&self) -> &Vec<f32> {
        &self.high
    }

    pub fn len(&self) -> usize {
        self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.low.is_empty()
    }

    /// Rescales an action from `[low, high]` to `[-1, 1]`
    pub fn scale(&self, action: &[f32]) -> Vec<f32> {
        action
            .iter()
            .zip(self.low.iter().zip(self.high.iter()))
            .map(|(&a, (&l, &h))| 2.0 * ((a - l) / (h - l)) - 1.0)
            .collect()
    }

    /// Rescales an action from `[-1, 1]` to `[low, high]`
    pub fn unscale(&self, scaled: &[f32]) -> Vec<f32> {
        scaled
            .iter()
            .zip(self.low.iter().zip(self.high.iter()))
            .map(|(&a, (&l, &h))| l + 0.5 * (a + 1.0) * (h - l))
            .collect()
    }
}
