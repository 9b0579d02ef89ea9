//! Payoff matrix for the Prisoner's Dilemma

use serde::{Deserialize, Serialize};

use crate::action::{Action, C, D};

/// The game matrix in Press and Dyson notation.
///
/// Any four values are accepted; [`Game::is_prisoners_dilemma`] reports
/// whether they describe a true dilemma.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// Reward for mutual cooperation
    pub r: f64,
    /// Punishment for mutual defection
    pub p: f64,
    /// Sucker's payoff
    pub s: f64,
    /// Temptation to defect
    pub t: f64,
}

impl Default for Game {
    fn default() -> Self {
        Self { r: 3.0, p: 1.0, s: 0.0, t: 5.0 }
    }
}

impl Game {
    pub fn new(r: f64, p: f64, s: f64, t: f64) -> Self {
        Self { r, p, s, t }
    }

    /// Returns (R, P, S, T)
    pub fn rpst(&self) -> (f64, f64, f64, f64) {
        (self.r, self.p, self.s, self.t)
    }

    /// Returns (score_a, score_b) for one turn
    pub fn score(&self, a: Action, b: Action) -> (f64, f64) {
        match (a, b) {
            (C, C) => (self.r, self.r),
            (C, D) => (self.s, self.t),
            (D, C) => (self.t, self.s),
            (D, D) => (self.p, self.p),
        }
    }

    /// T > R > P > S and 2R > T + S
    pub fn is_prisoners_dilemma(&self) -> bool {
        self.t > self.r && self.r > self.p && self.p > self.s && 2.0 * self.r > self.t + self.s
    }
}
