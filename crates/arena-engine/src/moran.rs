//! Moran process on interaction and reproduction graphs
//!
//! Each generation the players play matches along the interaction graph and
//! score the sum of their per-turn scores. One player reproduces in
//! proportion to that fitness and its copy (possibly mutated) replaces a
//! player chosen on the reproduction graph.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{DeterministicCache, SharedCache};
use crate::error::{ArenaError, Result};
use crate::game::Match;
use crate::graph::{complete_graph, Graph};
use crate::payoff::Game;
use crate::player::PlayerSpec;
use crate::random::{Probability, SeededRng};

/// Count of each player name in a generation
pub type Population = BTreeMap<String, usize>;

/// Order of the birth and death events in a generation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoranMode {
    /// Birth first, anywhere; death among the parent's reproduction neighbours
    #[default]
    #[serde(rename = "bd")]
    BirthDeath,
    /// Death first, anywhere; birth among the dead player's neighbours
    #[serde(rename = "db")]
    DeathBirth,
}

impl std::str::FromStr for MoranMode {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bd" => Ok(MoranMode::BirthDeath),
            "db" => Ok(MoranMode::DeathBirth),
            other => Err(ArenaError::InvalidConfig(format!(
                "unknown Moran mode {:?}, expected bd or db",
                other
            ))),
        }
    }
}

/// Builder for [`MoranProcess`]
#[derive(Clone, Debug)]
pub struct MoranBuilder {
    players: Vec<PlayerSpec>,
    turns: Option<u32>,
    prob_end: Option<Probability>,
    noise: Probability,
    game: Game,
    mutation_rate: Probability,
    mode: MoranMode,
    interaction_graph: Option<Graph>,
    reproduction_graph: Option<Graph>,
    cache: Option<SharedCache>,
    seed: Option<u64>,
}

impl MoranBuilder {
    pub fn turns(mut self, turns: u32) -> Self {
        self.turns = Some(turns);
        self
    }

    /// End matches with `prob_end` after each turn and drop the turn cap
    pub fn prob_end(mut self, prob_end: f64) -> Result<Self> {
        self.prob_end = Some(Probability::new(prob_end)?);
        self.turns = None;
        Ok(self)
    }

    pub fn noise(mut self, noise: f64) -> Result<Self> {
        self.noise = Probability::new(noise)?;
        Ok(self)
    }

    pub fn game(mut self, game: Game) -> Self {
        self.game = game;
        self
    }

    /// Chance that an offspring becomes another initial type
    pub fn mutation_rate(mut self, rate: f64) -> Result<Self> {
        self.mutation_rate = Probability::new(rate)?;
        Ok(self)
    }

    pub fn mode(mut self, mode: MoranMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn interaction_graph(mut self, graph: Graph) -> Self {
        self.interaction_graph = Some(graph);
        self
    }

    pub fn reproduction_graph(mut self, graph: Graph) -> Self {
        self.reproduction_graph = Some(graph);
        self
    }

    pub fn cache(mut self, cache: SharedCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<MoranProcess> {
        if self.players.is_empty() {
            return Err(ArenaError::InvalidConfig(
                "a Moran process needs players".into(),
            ));
        }
        if self.turns == Some(0) {
            return Err(ArenaError::InvalidConfig("turns must be positive".into()));
        }
        for player in &self.players {
            player.classifier()?;
        }

        let interaction = self
            .interaction_graph
            .unwrap_or_else(|| complete_graph(self.players.len(), false));
        let reproduction = self.reproduction_graph.unwrap_or_else(|| {
            let mut graph =
                Graph::from_edges(interaction.edges().iter().copied(), interaction.directed());
            graph.add_loops();
            graph
        });

        let locations: Vec<usize> = interaction.vertices().collect();
        if !locations.iter().copied().eq(reproduction.vertices()) {
            return Err(ArenaError::InvalidConfig(
                "interaction and reproduction graphs must share vertices".into(),
            ));
        }
        if locations.len() != self.players.len() {
            return Err(ArenaError::InvalidConfig(format!(
                "{} players on a graph of {} vertices",
                self.players.len(),
                locations.len()
            )));
        }
        let index = locations
            .iter()
            .enumerate()
            .map(|(i, vertex)| (*vertex, i))
            .collect();

        // one representative of every other type, by name
        let mut representatives: BTreeMap<String, PlayerSpec> = BTreeMap::new();
        for player in &self.players {
            representatives
                .entry(player.name())
                .or_insert_with(|| player.clone());
        }
        let mutation_targets = representatives
            .keys()
            .map(|name| {
                let others = representatives
                    .iter()
                    .filter(|(other, _)| *other != name)
                    .map(|(_, spec)| spec.clone())
                    .collect();
                (name.clone(), others)
            })
            .collect();

        let rng = match self.seed {
            Some(seed) => SeededRng::new(seed),
            None => SeededRng::from_entropy(),
        };

        let mut process = MoranProcess {
            initial_players: self.players.clone(),
            players: self.players,
            populations: Vec::new(),
            score_history: Vec::new(),
            winning_strategy_name: None,
            turns: self.turns,
            prob_end: self.prob_end,
            noise: self.noise,
            game: self.game,
            mutation_rate: self.mutation_rate,
            mode: self.mode,
            interaction_graph: interaction,
            reproduction_graph: reproduction,
            locations,
            index,
            mutation_targets,
            cache: self
                .cache
                .unwrap_or_else(|| DeterministicCache::new().shared()),
            rng,
        };
        process.reset();
        Ok(process)
    }
}

/// An agent-based Moran process.
///
/// Without mutation the population eventually fixates on a single type and
/// iteration stops. With mutation it never stops, so [`MoranProcess::play`]
/// refuses to run and the process should be driven as an iterator.
#[derive(Debug)]
pub struct MoranProcess {
    initial_players: Vec<PlayerSpec>,
    players: Vec<PlayerSpec>,
    populations: Vec<Population>,
    score_history: Vec<Vec<f64>>,
    winning_strategy_name: Option<String>,
    turns: Option<u32>,
    prob_end: Option<Probability>,
    noise: Probability,
    game: Game,
    mutation_rate: Probability,
    mode: MoranMode,
    interaction_graph: Graph,
    reproduction_graph: Graph,
    /// Graph vertex of each player position
    locations: Vec<usize>,
    /// Player position of each graph vertex
    index: BTreeMap<usize, usize>,
    mutation_targets: BTreeMap<String, Vec<PlayerSpec>>,
    cache: SharedCache,
    rng: SeededRng,
}

impl MoranProcess {
    /// Start building a process; matches default to 200 turns.
    pub fn builder(players: Vec<PlayerSpec>) -> MoranBuilder {
        MoranBuilder {
            players,
            turns: Some(200),
            prob_end: None,
            noise: Probability::ZERO,
            game: Game::default(),
            mutation_rate: Probability::ZERO,
            mode: MoranMode::default(),
            interaction_graph: None,
            reproduction_graph: None,
            cache: None,
            seed: None,
        }
    }

    /// Current population, by position
    pub fn players(&self) -> &[PlayerSpec] {
        &self.players
    }

    /// Distribution of every generation so far, starting with the initial one
    pub fn populations(&self) -> &[Population] {
        &self.populations
    }

    /// Fitness of every position, one entry per generation played
    pub fn score_history(&self) -> &[Vec<f64>] {
        &self.score_history
    }

    pub fn winning_strategy_name(&self) -> Option<&str> {
        self.winning_strategy_name.as_deref()
    }

    pub fn mode(&self) -> MoranMode {
        self.mode
    }

    pub fn interaction_graph(&self) -> &Graph {
        &self.interaction_graph
    }

    pub fn reproduction_graph(&self) -> &Graph {
        &self.reproduction_graph
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Restore the initial population and forget the history
    pub fn reset(&mut self) {
        self.winning_strategy_name = None;
        self.score_history.clear();
        self.players = self.initial_players.clone();
        self.populations = vec![self.population_distribution()];
    }

    pub fn population_distribution(&self) -> Population {
        let mut counts = Population::new();
        for player in &self.players {
            *counts.entry(player.name()).or_default() += 1;
        }
        counts
    }

    /// True once every player has the same name. Never true with mutation.
    pub fn fixation_check(&mut self) -> bool {
        if self.mutation_rate.value() > 0.0 {
            return false;
        }
        let names: BTreeSet<String> = self.players.iter().map(PlayerSpec::name).collect();
        if names.len() == 1 {
            self.winning_strategy_name = names.into_iter().next();
            return true;
        }
        false
    }

    /// Run to fixation and return every generation's distribution.
    pub fn play(&mut self) -> Result<&[Population]> {
        if self.mutation_rate.value() > 0.0 {
            return Err(ArenaError::InvalidConfig(
                "a process with mutation never fixates; iterate it instead".into(),
            ));
        }
        while let Some(generation) = self.next() {
            generation?;
        }
        debug!(
            generations = self.populations.len(),
            winner = ?self.winning_strategy_name,
            "Moran process fixated"
        );
        Ok(&self.populations)
    }

    /// Play one generation; `None` once fixated.
    fn step(&mut self) -> Result<Option<Population>> {
        if self.fixation_check() {
            return Ok(None);
        }

        let (dead, parent) = match self.mode {
            MoranMode::BirthDeath => {
                let parent = self.birth(None)?;
                (self.death(Some(parent)), parent)
            }
            MoranMode::DeathBirth => {
                let dead = self.death(None);
                (dead, self.birth(Some(dead))?)
            }
        };

        let offspring = self.offspring(parent);
        self.players[dead] = offspring;
        let distribution = self.population_distribution();
        self.populations.push(distribution.clone());
        self.fixation_check();
        Ok(Some(distribution))
    }

    /// Copy of the player at `parent`, mutated with the mutation rate
    fn offspring(&mut self, parent: usize) -> PlayerSpec {
        let player = &self.players[parent];
        if self.mutation_rate.value() > 0.0 && self.rng.random() < self.mutation_rate.value() {
            if let Some(targets) = self.mutation_targets.get(&player.name()) {
                if !targets.is_empty() {
                    return targets[self.rng.next_range(targets.len())].clone();
                }
            }
        }
        player.clone()
    }

    /// Position to replace. Death-birth picks uniformly; birth-death picks
    /// among the reproduction neighbours of `parent`.
    fn death(&mut self, parent: Option<usize>) -> usize {
        match parent {
            Some(parent) if self.mode == MoranMode::BirthDeath => {
                let neighbours: Vec<usize> = self
                    .reproduction_graph
                    .out_vertices(self.locations[parent])
                    .collect();
                if neighbours.is_empty() {
                    return parent;
                }
                let vertex = neighbours[self.rng.next_range(neighbours.len())];
                self.index.get(&vertex).copied().unwrap_or(parent)
            }
            _ => self.rng.next_range(self.players.len()),
        }
    }

    /// Position that reproduces, chosen in proportion to fitness and never
    /// the `dead` one.
    fn birth(&mut self, dead: Option<usize>) -> Result<usize> {
        let mut scores = self.score_all(dead)?;
        if let Some(dead) = dead {
            scores[dead] = 0.0;
        }
        match self.rng.choose_weighted(&scores) {
            Some(parent) => Ok(parent),
            None => {
                // nobody scored: any living position
                let living: Vec<usize> =
                    (0..self.players.len()).filter(|i| Some(*i) != dead).collect();
                Ok(match living.len() {
                    0 => 0,
                    n => living[self.rng.next_range(n)],
                })
            }
        }
    }

    /// Position pairs that play this generation. With a dead position only
    /// its interaction neighbours play, each against their own neighbours.
    fn matchup_indices(&self, dead: Option<usize>) -> BTreeSet<(usize, usize)> {
        let sources: Vec<usize> = match dead {
            Some(dead) => self
                .interaction_graph
                .out_vertices(self.locations[dead])
                .collect(),
            None => self.locations.clone(),
        };

        let mut pairs = BTreeSet::new();
        for source in sources {
            let Some(&i) = self.index.get(&source) else {
                continue;
            };
            for target in self.interaction_graph.out_vertices(source) {
                let Some(&j) = self.index.get(&target) else {
                    continue;
                };
                if Some(i) == dead || Some(j) == dead {
                    continue;
                }
                if pairs.contains(&(j, i)) {
                    continue;
                }
                pairs.insert((i, j));
            }
        }
        pairs
    }

    /// Sum of per-turn scores of every position this generation
    fn score_all(&mut self, dead: Option<usize>) -> Result<Vec<f64>> {
        let mut scores = vec![0.0; self.players.len()];
        for (i, j) in self.matchup_indices(dead) {
            let mut builder = Match::builder(self.players[i].clone(), self.players[j].clone())
                .game(self.game)
                .cache(self.cache.clone())
                .seed(self.rng.next_u64());
            builder = builder.noise(self.noise.value())?;
            if let Some(turns) = self.turns {
                builder = builder.turns(turns);
            }
            if let Some(prob_end) = self.prob_end {
                builder = builder.prob_end(prob_end.value())?;
            }
            let mut game = builder.build()?;
            game.play()?;
            let (si, sj) = game.final_score_per_turn().unwrap_or((0.0, 0.0));
            scores[i] += si;
            if i != j {
                scores[j] += sj;
            }
        }
        self.score_history.push(scores.clone());
        Ok(scores)
    }
}

impl Iterator for MoranProcess {
    type Item = Result<Population>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step().transpose()
    }
}
