//! Aggregated tournament results

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ArenaError, Result};
use crate::interaction::{self, group_rows, InteractionMap, InteractionRow, Winner};
use crate::payoff::Game;

/// Summary statistics over every interaction of a tournament.
///
/// Built from player names and records grouped by index pair, one record per
/// repetition. Pairs may be missing (edge-restricted tournaments) and a pair
/// may have fewer records than others. Every index must name one of the
/// players.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultSet {
    pub players: Vec<String>,
    pub nplayers: usize,
    pub repetitions: usize,
    /// `match_lengths[repetition][i][j]`, symmetric
    pub match_lengths: Vec<Vec<Vec<usize>>>,
    /// `scores[player][repetition]`: total score over all matches
    pub scores: Vec<Vec<f64>>,
    /// `normalised_scores[player][repetition]`: mean per-turn score over the
    /// player's matches
    pub normalised_scores: Vec<Vec<f64>>,
    /// `wins[player][repetition]`
    pub wins: Vec<Vec<usize>>,
    /// `cooperation[i][j]`: cooperations of i against j over all repetitions
    pub cooperation: Vec<Vec<usize>>,
    /// Share of turns on which each player cooperated
    pub cooperating_rating: Vec<f64>,
    /// Player indices by descending median normalised score
    pub ranking: Vec<usize>,
    pub ranked_names: Vec<String>,
}

impl ResultSet {
    pub fn new(players: Vec<String>, interactions: &InteractionMap, game: &Game) -> Result<Self> {
        let n = players.len();
        if let Some((i, j)) = interactions.keys().find(|(i, j)| *i >= n || *j >= n) {
            return Err(ArenaError::InvalidEdges(format!(
                "interactions for ({}, {}) but only {} players",
                i, j, n
            )));
        }
        let repetitions = interactions.values().map(Vec::len).max().unwrap_or(0);

        let mut match_lengths = vec![vec![vec![0; n]; n]; repetitions];
        let mut scores = vec![vec![0.0; repetitions]; n];
        let mut per_turn_totals = vec![vec![0.0; repetitions]; n];
        let mut match_counts = vec![vec![0usize; repetitions]; n];
        let mut wins = vec![vec![0; repetitions]; n];
        let mut cooperation = vec![vec![0; n]; n];
        let mut turns_played = vec![0usize; n];

        for (&(i, j), records) in interactions {
            for (rep, record) in records.iter().enumerate() {
                match_lengths[rep][i][j] = record.len();
                match_lengths[rep][j][i] = record.len();

                let Some((si, sj)) = interaction::compute_final_score(record, game) else {
                    continue;
                };
                let (pi, pj) = interaction::compute_final_score_per_turn(record, game)
                    .unwrap_or((0.0, 0.0));
                let (ci, cj) = interaction::compute_cooperations(record).unwrap_or((0, 0));

                scores[i][rep] += si;
                per_turn_totals[i][rep] += pi;
                match_counts[i][rep] += 1;
                cooperation[i][j] += ci;
                turns_played[i] += record.len();
                if i != j {
                    scores[j][rep] += sj;
                    per_turn_totals[j][rep] += pj;
                    match_counts[j][rep] += 1;
                    cooperation[j][i] += cj;
                    turns_played[j] += record.len();
                    match interaction::compute_winner_index(record, game) {
                        Some(Winner::Player(0)) => wins[i][rep] += 1,
                        Some(Winner::Player(_)) => wins[j][rep] += 1,
                        _ => {}
                    }
                }
            }
        }

        let normalised_scores: Vec<Vec<f64>> = per_turn_totals
            .iter()
            .zip(&match_counts)
            .map(|(totals, counts)| {
                totals
                    .iter()
                    .zip(counts)
                    .map(|(t, c)| if *c == 0 { 0.0 } else { t / *c as f64 })
                    .collect()
            })
            .collect();

        let cooperating_rating = cooperation
            .iter()
            .zip(&turns_played)
            .map(|(row, turns)| {
                if *turns == 0 {
                    0.0
                } else {
                    row.iter().sum::<usize>() as f64 / *turns as f64
                }
            })
            .collect();

        let medians: Vec<f64> = normalised_scores.iter().map(|s| median(s)).collect();
        let mut ranking: Vec<usize> = (0..n).collect();
        ranking.sort_by(|a, b| medians[*b].total_cmp(&medians[*a]));
        let ranked_names = ranking.iter().map(|i| players[*i].clone()).collect();

        Ok(Self {
            players,
            nplayers: n,
            repetitions,
            match_lengths,
            scores,
            normalised_scores,
            wins,
            cooperation,
            cooperating_rating,
            ranking,
            ranked_names,
        })
    }

    pub fn from_rows(
        players: Vec<String>,
        rows: impl IntoIterator<Item = InteractionRow>,
        game: &Game,
    ) -> Result<Self> {
        Self::new(players, &group_rows(rows)?, game)
    }

    /// Read a JSON-lines result file written by a tournament
    pub fn from_file(players: Vec<String>, path: impl AsRef<Path>, game: &Game) -> Result<Self> {
        Self::new(
            players,
            &interaction::read_interactions_from_file(path)?,
            game,
        )
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{C, D};
    use std::collections::BTreeMap;

    fn names() -> Vec<String> {
        vec!["Cooperator".into(), "Defector".into(), "Tit For Tat".into()]
    }

    fn interactions() -> InteractionMap {
        let mut map = BTreeMap::new();
        map.insert((0, 1), vec![vec![(C, D); 3], vec![(C, D); 3]]);
        map.insert((0, 2), vec![vec![(C, C); 3], vec![(C, C); 3]]);
        map.insert((1, 2), vec![vec![(D, C), (D, D), (D, D)], vec![(D, C), (D, D), (D, D)]]);
        map
    }

    #[test]
    fn test_scores_and_wins() {
        let results = ResultSet::new(names(), &interactions(), &Game::default()).unwrap();
        assert_eq!(results.nplayers, 3);
        assert_eq!(results.repetitions, 2);
        assert_eq!(results.scores[0], vec![9.0, 9.0]);
        assert_eq!(results.scores[1], vec![22.0, 22.0]);
        assert_eq!(results.scores[2], vec![11.0, 11.0]);
        assert_eq!(results.wins[1], vec![2, 2]);
        assert_eq!(results.wins[0], vec![0, 0]);
        assert_eq!(results.match_lengths[1][2][1], 3);
    }

    #[test]
    fn test_normalised_scores_and_ranking() {
        let results = ResultSet::new(names(), &interactions(), &Game::default()).unwrap();
        // defector: (5 + 7/3) / 2 per turn
        assert!((results.normalised_scores[1][0] - (5.0 + 7.0 / 3.0) / 2.0).abs() < 1e-12);
        assert_eq!(results.ranking, vec![1, 2, 0]);
        assert_eq!(results.ranked_names[0], "Defector");
    }

    #[test]
    fn test_cooperation() {
        let results = ResultSet::new(names(), &interactions(), &Game::default()).unwrap();
        assert_eq!(results.cooperation[0][1], 6);
        assert_eq!(results.cooperation[1][0], 0);
        assert_eq!(results.cooperation[2][1], 2);
        assert_eq!(results.cooperating_rating[0], 1.0);
        assert_eq!(results.cooperating_rating[1], 0.0);
    }

    #[test]
    fn test_sparse_interactions() {
        let mut map = BTreeMap::new();
        map.insert((0, 1), vec![vec![(C, C)]]);
        let results = ResultSet::new(
            vec!["A".into(), "B".into(), "C".into(), "D".into()],
            &map,
            &Game::default(),
        )
        .unwrap();
        assert_eq!(results.scores[3], vec![0.0]);
        assert_eq!(results.normalised_scores[2], vec![0.0]);
        assert_eq!(results.match_lengths[0][2][3], 0);
    }

    #[test]
    fn test_from_rows() {
        let rows = vec![
            InteractionRow::new((0, 1), 0, ("A".into(), "B".into()), &[(C, D)]),
            InteractionRow::new((0, 1), 1, ("A".into(), "B".into()), &[(D, D)]),
        ];
        let results =
            ResultSet::from_rows(vec!["A".into(), "B".into()], rows, &Game::default()).unwrap();
        assert_eq!(results.scores[0], vec![0.0, 1.0]);
        assert_eq!(results.scores[1], vec![5.0, 1.0]);
    }

    #[test]
    fn test_rows_outside_player_list_rejected() {
        let rows = vec![InteractionRow::new(
            (0, 2),
            0,
            ("A".into(), "C".into()),
            &[(C, C)],
        )];
        assert!(matches!(
            ResultSet::from_rows(vec!["A".into(), "B".into()], rows, &Game::default()),
            Err(ArenaError::InvalidEdges(_))
        ));
    }

    #[test]
    fn test_file_for_other_players_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");
        let row = InteractionRow::new((3, 1), 0, ("D".into(), "B".into()), &[(D, C)]);
        std::fs::write(&path, format!("{}\n", serde_json::to_string(&row).unwrap())).unwrap();
        assert!(ResultSet::from_file(vec!["A".into(), "B".into()], &path, &Game::default()).is_err());
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0]), 2.5);
    }
}
