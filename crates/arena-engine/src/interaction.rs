//! Functions over interaction records and the row codec used by result files
//!
//! An interaction record is the list of (player 1, player 2) actions of one
//! match. Functions return `None` on an empty record wherever the value is
//! undefined.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::action::{actions_to_str, str_to_actions, Action, Interaction, C, D};
use crate::error::{ArenaError, Result};
use crate::payoff::Game;

/// Outcome of a match by total score
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    /// Index of the higher-scoring player
    Player(usize),
    Tie,
}

/// Score of every turn
pub fn compute_scores(interactions: &[Interaction], game: &Game) -> Vec<(f64, f64)> {
    interactions.iter().map(|(a, b)| game.score(*a, *b)).collect()
}

pub fn compute_final_score(interactions: &[Interaction], game: &Game) -> Option<(f64, f64)> {
    if interactions.is_empty() {
        return None;
    }
    Some(
        compute_scores(interactions, game)
            .into_iter()
            .fold((0.0, 0.0), |(x, y), (a, b)| (x + a, y + b)),
    )
}

pub fn compute_final_score_per_turn(
    interactions: &[Interaction],
    game: &Game,
) -> Option<(f64, f64)> {
    let (x, y) = compute_final_score(interactions, game)?;
    let turns = interactions.len() as f64;
    Some((x / turns, y / turns))
}

pub fn compute_winner_index(interactions: &[Interaction], game: &Game) -> Option<Winner> {
    let (x, y) = compute_final_score(interactions, game)?;
    Some(if x > y {
        Winner::Player(0)
    } else if y > x {
        Winner::Player(1)
    } else {
        Winner::Tie
    })
}

/// Number of cooperations of each player
pub fn compute_cooperations(interactions: &[Interaction]) -> Option<(usize, usize)> {
    if interactions.is_empty() {
        return None;
    }
    Some(interactions.iter().fold((0, 0), |(x, y), (a, b)| {
        (x + usize::from(*a == C), y + usize::from(*b == C))
    }))
}

pub fn compute_normalised_cooperation(interactions: &[Interaction]) -> Option<(f64, f64)> {
    let (x, y) = compute_cooperations(interactions)?;
    let turns = interactions.len() as f64;
    Some((x as f64 / turns, y as f64 / turns))
}

/// Count of each joint action
pub fn compute_state_distribution(
    interactions: &[Interaction],
) -> Option<BTreeMap<Interaction, usize>> {
    if interactions.is_empty() {
        return None;
    }
    let mut counts = BTreeMap::new();
    for interaction in interactions {
        *counts.entry(*interaction).or_insert(0) += 1;
    }
    Some(counts)
}

pub fn compute_normalised_state_distribution(
    interactions: &[Interaction],
) -> Option<BTreeMap<Interaction, f64>> {
    let counts = compute_state_distribution(interactions)?;
    let turns = interactions.len() as f64;
    Some(
        counts
            .into_iter()
            .map(|(state, count)| (state, count as f64 / turns))
            .collect(),
    )
}

fn sparkline(actions: impl Iterator<Item = Action>, c_symbol: &str, d_symbol: &str) -> String {
    actions
        .map(|a| if a == C { c_symbol } else { d_symbol })
        .collect()
}

/// One line per player, `c_symbol` for cooperation and `d_symbol` for defection
pub fn compute_sparklines(
    interactions: &[Interaction],
    c_symbol: &str,
    d_symbol: &str,
) -> Option<String> {
    if interactions.is_empty() {
        return None;
    }
    Some(format!(
        "{}\n{}",
        sparkline(interactions.iter().map(|(a, _)| *a), c_symbol, d_symbol),
        sparkline(interactions.iter().map(|(_, b)| *b), c_symbol, d_symbol)
    ))
}

/// Split a record into one action string per player
pub fn interactions_to_strings(interactions: &[Interaction]) -> (String, String) {
    (
        actions_to_str(interactions.iter().map(|(a, _)| a)),
        actions_to_str(interactions.iter().map(|(_, b)| b)),
    )
}

/// Inverse of [`interactions_to_strings`]
pub fn strings_to_interactions(first: &str, second: &str) -> Result<Vec<Interaction>> {
    let first = str_to_actions(first)?;
    let second = str_to_actions(second)?;
    if first.len() != second.len() {
        return Err(ArenaError::InvalidConfig(format!(
            "action strings differ in length: {} and {}",
            first.len(),
            second.len()
        )));
    }
    Ok(first.into_iter().zip(second).collect())
}

/// Compact form: two characters per turn, `"CDCDDD"` is three turns.
pub fn string_to_interactions(compact: &str) -> Result<Vec<Interaction>> {
    let actions = str_to_actions(compact)?;
    if actions.len() % 2 != 0 {
        return Err(ArenaError::InvalidConfig(format!(
            "compact interaction string has odd length {}",
            actions.len()
        )));
    }
    Ok(actions.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect())
}

/// One line of a result file: a single repetition of one matchup
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRow {
    pub player_indices: (usize, usize),
    pub repetition: usize,
    pub player_names: (String, String),
    pub actions: (String, String),
}

impl InteractionRow {
    pub fn new(
        player_indices: (usize, usize),
        repetition: usize,
        player_names: (String, String),
        interactions: &[Interaction],
    ) -> Self {
        Self {
            player_indices,
            repetition,
            player_names,
            actions: interactions_to_strings(interactions),
        }
    }

    pub fn interactions(&self) -> Result<Vec<Interaction>> {
        strings_to_interactions(&self.actions.0, &self.actions.1)
    }
}

/// Records grouped by index pair, each list ordered by repetition
pub type InteractionMap = BTreeMap<(usize, usize), Vec<Vec<Interaction>>>;

/// Group rows by index pair, ordering each group by repetition.
pub fn group_rows<I>(rows: I) -> Result<InteractionMap>
where
    I: IntoIterator<Item = InteractionRow>,
{
    let mut grouped: BTreeMap<(usize, usize), BTreeMap<usize, Vec<Interaction>>> = BTreeMap::new();
    for row in rows {
        let interactions = row.interactions()?;
        grouped
            .entry(row.player_indices)
            .or_default()
            .insert(row.repetition, interactions);
    }
    Ok(grouped
        .into_iter()
        .map(|(pair, reps)| (pair, reps.into_values().collect()))
        .collect())
}

/// Read every row of a JSON-lines result file
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<InteractionRow>> {
    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(serde_json::from_str(&line)?);
    }
    Ok(rows)
}

/// Read a result file into records grouped by index pair
pub fn read_interactions_from_file(path: impl AsRef<Path>) -> Result<InteractionMap> {
    group_rows(read_rows(path)?)
}

/// Turn a record's actions into `(C, D)` pairs from a list of tuples of
/// characters; handy for tests and literals.
pub fn interactions_from_pairs(pairs: &[(char, char)]) -> Result<Vec<Interaction>> {
    pairs
        .iter()
        .map(|(a, b)| Ok((Action::from_char(*a)?, Action::from_char(*b)?)))
        .collect()
}
