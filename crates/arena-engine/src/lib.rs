//! Arena engine
//!
//! Iterated Prisoner's Dilemma matches, tournaments and Moran processes
//! between strategies built from a base strategy and a stack of
//! transformers. This crate is compiled to:
//! - Native (tournaments, with a thread pool)
//! - WASM (for frontend match replay)

pub mod action;
pub mod cache;
pub mod classifier;
pub mod error;
pub mod game;
pub mod graph;
pub mod history;
pub mod interaction;
pub mod logger;
pub mod moran;
pub mod pairing;
pub mod payoff;
pub mod player;
pub mod progress;
pub mod random;
pub mod result_set;
pub mod sink;
pub mod strategy;
pub mod tournament;
pub mod transformer;

#[cfg(feature = "wasm")]
mod wasm;

pub use action::{Action, Interaction, C, D};
pub use cache::{lock_cache, CacheKey, DeterministicCache, SharedCache};
pub use classifier::{
    ClassifierFilter, Classifiers, MatchAttribute, MemoryDepth, StrategyRegistry,
};
pub use error::{ArenaError, Result};
pub use game::{Length, Match, MatchAttributes, MatchBuilder};
pub use graph::Graph;
pub use history::History;
pub use interaction::{InteractionRow, Winner};
pub use logger::init_logger;
pub use moran::{MoranMode, MoranProcess, Population};
pub use payoff::Game;
pub use player::{Player, PlayerSpec};
pub use random::{Probability, SeededRng};
pub use result_set::ResultSet;
pub use strategy::{Strategy, StrategyBase, StrategyParams};
pub use tournament::{Output, Tournament, TournamentConfig};
pub use transformer::{compose, TransformKind, Transformer, TransformerChain};
