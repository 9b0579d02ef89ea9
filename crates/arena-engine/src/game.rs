//! Match execution engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::action::Interaction;
use crate::cache::{lock_cache, CacheKey, DeterministicCache, SharedCache};
use crate::error::{ArenaError, Result};
use crate::interaction::{self, Winner};
use crate::payoff::Game;
use crate::player::{Player, PlayerSpec};
use crate::random::{Probability, SeededRng};

/// Match length as announced to the players
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Length {
    Turns(u32),
    /// Unknown to the players: the match may end after any turn
    Infinite,
}

/// What a player is told about the match it is in
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchAttributes {
    pub length: Length,
    pub game: Game,
    pub noise: Probability,
}

impl Default for MatchAttributes {
    fn default() -> Self {
        Self {
            length: Length::Infinite,
            game: Game::default(),
            noise: Probability::ZERO,
        }
    }
}

/// Builder for [`Match`]
#[derive(Clone, Debug)]
pub struct MatchBuilder {
    players: (PlayerSpec, PlayerSpec),
    turns: Option<u32>,
    prob_end: Option<Probability>,
    game: Game,
    noise: Probability,
    cache: Option<SharedCache>,
    match_attributes: Option<MatchAttributes>,
    seed: Option<u64>,
}

impl MatchBuilder {
    /// Hard cap on the number of turns
    pub fn turns(mut self, turns: u32) -> Self {
        self.turns = Some(turns);
        self
    }

    /// Probability of the match ending after each turn
    pub fn prob_end(mut self, prob_end: f64) -> Result<Self> {
        self.prob_end = Some(Probability::new(prob_end)?);
        Ok(self)
    }

    pub fn game(mut self, game: Game) -> Self {
        self.game = game;
        self
    }

    /// Probability of each action being flipped after it is chosen
    pub fn noise(mut self, noise: f64) -> Result<Self> {
        self.noise = Probability::new(noise)?;
        Ok(self)
    }

    pub fn cache(mut self, cache: SharedCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Announce these attributes instead of the real ones. Such matches
    /// never touch the cache.
    pub fn match_attributes(mut self, attributes: MatchAttributes) -> Self {
        self.match_attributes = Some(attributes);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<Match> {
        if self.turns == Some(0) {
            return Err(ArenaError::InvalidConfig("turns must be positive".into()));
        }
        let ends = self.prob_end.is_some_and(|p| p.value() > 0.0);
        if self.turns.is_none() && !ends {
            return Err(ArenaError::InvalidConfig(
                "a match needs turns or a positive prob_end".into(),
            ));
        }

        let (first, second) = self.players;
        let players = [Player::new(first)?, Player::new(second)?];
        let custom_attributes = self.match_attributes.is_some();
        let match_attributes = match self.match_attributes {
            Some(attributes) => attributes,
            None => MatchAttributes {
                length: announced_length(self.turns, self.prob_end),
                game: self.game,
                noise: self.noise,
            },
        };
        let rng = match self.seed {
            Some(seed) => SeededRng::new(seed),
            None => SeededRng::from_entropy(),
        };

        Ok(Match {
            players,
            turns: self.turns,
            prob_end: self.prob_end,
            game: self.game,
            noise: self.noise,
            cache: self
                .cache
                .unwrap_or_else(|| DeterministicCache::new().shared()),
            custom_attributes,
            match_attributes,
            rng,
            result: None,
        })
    }
}

fn announced_length(turns: Option<u32>, prob_end: Option<Probability>) -> Length {
    match (turns, prob_end) {
        (Some(turns), None) => Length::Turns(turns),
        _ => Length::Infinite,
    }
}

/// A single match between two players
#[derive(Debug)]
pub struct Match {
    players: [Player; 2],
    turns: Option<u32>,
    prob_end: Option<Probability>,
    game: Game,
    noise: Probability,
    cache: SharedCache,
    custom_attributes: bool,
    match_attributes: MatchAttributes,
    rng: SeededRng,
    result: Option<Vec<Interaction>>,
}

impl Match {
    pub fn builder(first: PlayerSpec, second: PlayerSpec) -> MatchBuilder {
        MatchBuilder {
            players: (first, second),
            turns: None,
            prob_end: None,
            game: Game::default(),
            noise: Probability::ZERO,
            cache: None,
            match_attributes: None,
            seed: None,
        }
    }

    /// Fixed-length match with default settings
    pub fn new(first: PlayerSpec, second: PlayerSpec, turns: u32) -> Result<Self> {
        Self::builder(first, second).turns(turns).build()
    }

    pub fn players(&self) -> &[Player; 2] {
        &self.players
    }

    pub fn turns(&self) -> Option<u32> {
        self.turns
    }

    /// Change the turn cap; the next [`play`](Self::play) uses it.
    pub fn set_turns(&mut self, turns: u32) -> Result<()> {
        if turns == 0 {
            return Err(ArenaError::InvalidConfig("turns must be positive".into()));
        }
        self.turns = Some(turns);
        if !self.custom_attributes {
            self.match_attributes.length = announced_length(self.turns, self.prob_end);
        }
        Ok(())
    }

    pub fn prob_end(&self) -> Option<Probability> {
        self.prob_end
    }

    pub fn noise(&self) -> Probability {
        self.noise
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn match_attributes(&self) -> &MatchAttributes {
        &self.match_attributes
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Reseed the match RNG, e.g. before a replay
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = SeededRng::new(seed);
    }

    /// The record of the last [`play`](Self::play), if any
    pub fn result(&self) -> Option<&[Interaction]> {
        self.result.as_deref()
    }

    /// Whether this match may read and write the deterministic cache
    pub fn cache_eligible(&self) -> bool {
        !self.players[0].classifier().stochastic
            && !self.players[1].classifier().stochastic
            && self.noise == Probability::ZERO
            && self.prob_end.is_none()
            && self.turns.is_some()
            && !self.custom_attributes
    }

    fn cache_key(&self) -> Option<CacheKey> {
        let turns = self.turns?;
        self.cache_eligible().then(|| {
            CacheKey::new(
                self.players[0].spec().clone(),
                self.players[1].spec().clone(),
                turns,
            )
        })
    }

    /// Play the match and return its record.
    pub fn play(&mut self) -> Result<&[Interaction]> {
        for player in &mut self.players {
            player.set_match_attributes(self.match_attributes.clone());
        }

        let key = self.cache_key();
        let cached = key.as_ref().and_then(|key| lock_cache(&self.cache).get(key));

        let record = match cached {
            Some(record) => {
                debug!(
                    first = %self.players[0].name(),
                    second = %self.players[1].name(),
                    turns = record.len(),
                    "cache hit"
                );
                self.replay(&record);
                record
            }
            None => {
                let record = self.simulate();
                if let Some(key) = key {
                    let mut cache = lock_cache(&self.cache);
                    if cache.mutable() {
                        debug!(turns = record.len(), "caching match record");
                        cache.set(key, record.clone())?;
                    }
                }
                record
            }
        };

        let result = self.result.insert(record);
        Ok(result.as_slice())
    }

    fn replay(&mut self, record: &[Interaction]) {
        let [first, second] = &mut self.players;
        first.reset();
        second.reset();
        for (a, b) in record {
            first.update_history(*a, *b);
            second.update_history(*b, *a);
        }
    }

    fn simulate(&mut self) -> Vec<Interaction> {
        let [first, second] = &mut self.players;
        first.reset();
        second.reset();

        let mut record = Vec::with_capacity(self.turns.unwrap_or(0) as usize);
        loop {
            let a = first.strategy(second.history(), &mut self.rng);
            let b = second.strategy(first.history(), &mut self.rng);
            let a = self.rng.random_flip(a, self.noise);
            let b = self.rng.random_flip(b, self.noise);
            first.update_history(a, b);
            second.update_history(b, a);
            record.push((a, b));

            if self.turns.is_some_and(|turns| record.len() >= turns as usize) {
                break;
            }
            if let Some(prob_end) = self.prob_end {
                // 0 never ends and 1 always ends: no draw needed
                let ends = if prob_end.is_degenerate() {
                    prob_end == Probability::ONE
                } else {
                    self.rng.random() < prob_end.value()
                };
                if ends {
                    break;
                }
            }
        }
        record
    }

    /// Turns actually played
    pub fn len(&self) -> usize {
        self.result.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn scores(&self) -> Option<Vec<(f64, f64)>> {
        self.result
            .as_deref()
            .map(|r| interaction::compute_scores(r, &self.game))
    }

    pub fn final_score(&self) -> Option<(f64, f64)> {
        interaction::compute_final_score(self.result.as_deref()?, &self.game)
    }

    pub fn final_score_per_turn(&self) -> Option<(f64, f64)> {
        interaction::compute_final_score_per_turn(self.result.as_deref()?, &self.game)
    }

    pub fn winner(&self) -> Option<Winner> {
        interaction::compute_winner_index(self.result.as_deref()?, &self.game)
    }

    pub fn cooperation(&self) -> Option<(usize, usize)> {
        interaction::compute_cooperations(self.result.as_deref()?)
    }

    pub fn normalised_cooperation(&self) -> Option<(f64, f64)> {
        interaction::compute_normalised_cooperation(self.result.as_deref()?)
    }

    pub fn state_distribution(&self) -> Option<BTreeMap<Interaction, usize>> {
        interaction::compute_state_distribution(self.result.as_deref()?)
    }

    pub fn normalised_state_distribution(&self) -> Option<BTreeMap<Interaction, f64>> {
        interaction::compute_normalised_state_distribution(self.result.as_deref()?)
    }

    pub fn sparklines(&self, c_symbol: &str, d_symbol: &str) -> Option<String> {
        interaction::compute_sparklines(self.result.as_deref()?, c_symbol, d_symbol)
    }
}
