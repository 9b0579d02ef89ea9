//! Seeded pseudo-random number generation
//!
//! Deterministic streams for reproducible matches: the same seed and stream
//! index always give the same sequence, so a tournament replays identically
//! whether its matches run serially or on worker threads.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use crate::action::{Action, C, D};
use crate::error::{ArenaError, Result};

/// A probability in `[0, 1]`.
///
/// Compared and hashed bitwise so that descriptors carrying probabilities can
/// key the deterministic cache.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Probability(f64);

impl Probability {
    pub const ZERO: Probability = Probability(0.0);
    pub const ONE: Probability = Probability(1.0);
    pub const HALF: Probability = Probability(0.5);

    pub fn new(p: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&p) {
            return Err(ArenaError::InvalidProbability(p));
        }
        // -0.0 and 0.0 must hash alike
        Ok(Self(if p == 0.0 { 0.0 } else { p }))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// True for exactly 0 or 1: no randomness is needed to act on it.
    pub fn is_degenerate(self) -> bool {
        self.0 == 0.0 || self.0 == 1.0
    }
}

impl TryFrom<f64> for Probability {
    type Error = ArenaError;

    fn try_from(p: f64) -> Result<Self> {
        Probability::new(p)
    }
}

impl From<Probability> for f64 {
    fn from(p: Probability) -> f64 {
        p.0
    }
}

impl PartialEq for Probability {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Probability {}

impl Hash for Probability {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// Seeded random number generator
///
/// Deterministic: same seed + stream index = same sequence
#[derive(Clone, Debug)]
pub struct SeededRng {
    rng: StdRng,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seed drawn from the thread-local entropy source
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    /// Independent stream `index` of a parent seed
    pub fn stream(seed: u64, index: u64) -> Self {
        Self::new(stream_seed(seed, index))
    }

    pub fn next_u64(&mut self) -> u64 {
        self.rng.random()
    }

    /// Uniform value in [0, 1)
    pub fn random(&mut self) -> f64 {
        self.rng.random()
    }

    /// Cooperate with probability `p`. Draws nothing when `p` is 0 or 1.
    pub fn random_choice(&mut self, p: Probability) -> Action {
        if p == Probability::ZERO {
            return D;
        }
        if p == Probability::ONE {
            return C;
        }
        if self.random() < p.value() {
            C
        } else {
            D
        }
    }

    /// Flip `action` with probability `p`. Draws nothing when `p` is 0 or 1.
    pub fn random_flip(&mut self, action: Action, p: Probability) -> Action {
        if p == Probability::ZERO {
            return action;
        }
        if p == Probability::ONE {
            return action.flip();
        }
        if self.random() < p.value() {
            action.flip()
        } else {
            action
        }
    }

    /// Generate a value in range [0, max)
    pub fn next_range(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        self.rng.random_range(0..max)
    }

    /// Index picked proportionally to `weights`, or `None` when they sum to
    /// zero or less.
    pub fn choose_weighted(&mut self, weights: &[f64]) -> Option<usize> {
        let total: f64 = weights.iter().sum();
        if weights.is_empty() || total <= 0.0 {
            return None;
        }
        let target = self.random() * total;
        let mut cumulative = 0.0;
        for (i, w) in weights.iter().enumerate() {
            cumulative += w;
            if cumulative > target {
                return Some(i);
            }
        }
        Some(weights.len() - 1)
    }
}

/// Seed of stream `index` of a parent seed (splitmix64 finalizer)
pub fn stream_seed(seed: u64, index: u64) -> u64 {
    let mut z = seed ^ index.wrapping_mul(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}
