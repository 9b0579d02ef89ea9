//! Matchup enumeration for tournaments
//!
//! Round robins use colexicographic unranking so any matchup can be computed
//! directly from its index. Explicit edge lists are validated once and used
//! as given.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{ArenaError, Result};

/// Number of unordered pairs among `n` players
pub fn round_robin_count(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Colexicographic combination unranking: rank → (a, b) with a < b.
///
/// rank = C(b,2) + a = b*(b−1)/2 + a
pub fn unrank_pair(rank: usize) -> (usize, usize) {
    // Estimate b via integer floor(sqrt(1 + 8·rank))
    let val = 1u64 + 8 * rank as u64;
    let mut s = val;
    let mut t = s.div_ceil(2);
    while t < s {
        s = t;
        t = (s + val / s) / 2;
    }
    // s = floor(sqrt(val))
    let mut b = ((1 + s) / 2) as usize;

    // Correct estimate
    while b > 0 && b * (b - 1) / 2 > rank {
        b -= 1;
    }
    while (b + 1) * b / 2 <= rank {
        b += 1;
    }

    let a = rank - b * (b - 1) / 2;
    (a, b)
}

/// Every pair `(i, j)` with `i < j < n`, in colex order
pub fn round_robin_pairs(n: usize) -> Vec<(usize, usize)> {
    (0..round_robin_count(n)).map(unrank_pair).collect()
}

/// Check an edge list against `n` players: every index in range, no matchup
/// listed twice (in either order) and every player covered by at least one
/// edge.
pub fn validate_edges(n: usize, edges: &[(usize, usize)]) -> Result<()> {
    let mut covered = vec![false; n];
    let mut seen = HashSet::with_capacity(edges.len());
    for &(a, b) in edges {
        if a >= n || b >= n {
            return Err(ArenaError::InvalidEdges(format!(
                "edge ({}, {}) refers to a player outside 0..{}",
                a, b, n
            )));
        }
        if !seen.insert((a.min(b), a.max(b))) {
            return Err(ArenaError::InvalidEdges(format!(
                "edge ({}, {}) is listed more than once",
                a, b
            )));
        }
        covered[a] = true;
        covered[b] = true;
    }
    if let Some(missing) = covered.iter().position(|c| !c) {
        return Err(ArenaError::InvalidEdges(format!(
            "player {} is not on any edge",
            missing
        )));
    }
    Ok(())
}

/// One matchup and the repetitions to play of it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the schedule
    pub index: usize,
    pub players: (usize, usize),
    pub repetitions: usize,
}

impl Chunk {
    /// RNG stream of one repetition, unique across the schedule
    pub fn stream_index(&self, repetition: usize) -> u64 {
        (self.index * self.repetitions + repetition) as u64
    }
}

/// Schedule of chunks over `pairs`
pub fn build_chunks(pairs: &[(usize, usize)], repetitions: usize) -> Vec<Chunk> {
    pairs
        .iter()
        .enumerate()
        .map(|(index, &players)| Chunk {
            index,
            players,
            repetitions,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_empty_tournament() {
        assert!(round_robin_pairs(0).is_empty());
        assert!(round_robin_pairs(1).is_empty());
    }

    #[test]
    fn test_two_players() {
        assert_eq!(round_robin_pairs(2), vec![(0, 1)]);
    }

    #[test]
    fn test_unrank_pair() {
        assert_eq!(unrank_pair(0), (0, 1));
        assert_eq!(unrank_pair(1), (0, 2));
        assert_eq!(unrank_pair(2), (1, 2));
        assert_eq!(unrank_pair(3), (0, 3));
        assert_eq!(unrank_pair(5), (2, 3));
    }

    #[test]
    fn test_round_robin_complete() {
        let n = 50;
        let pairs = round_robin_pairs(n);
        assert_eq!(pairs.len(), n * (n - 1) / 2);

        let unique: HashSet<_> = pairs.iter().copied().collect();
        assert_eq!(unique.len(), pairs.len(), "Duplicate pairing found");
        for (a, b) in &pairs {
            assert!(a < b, "Pairing not ordered: {} >= {}", a, b);
            assert!(*b < n);
        }
    }

    #[test]
    fn test_validate_edges() {
        assert!(validate_edges(4, &[(0, 1), (2, 3)]).is_ok());
        assert!(validate_edges(2, &[(0, 0), (1, 1)]).is_ok());
        assert!(matches!(
            validate_edges(3, &[(0, 1)]),
            Err(ArenaError::InvalidEdges(_))
        ));
        assert!(matches!(
            validate_edges(2, &[(0, 2)]),
            Err(ArenaError::InvalidEdges(_))
        ));
    }

    #[test]
    fn test_duplicate_edges_rejected() {
        assert!(matches!(
            validate_edges(2, &[(0, 1), (0, 1)]),
            Err(ArenaError::InvalidEdges(_))
        ));
        assert!(matches!(
            validate_edges(2, &[(0, 1), (1, 0)]),
            Err(ArenaError::InvalidEdges(_))
        ));
        assert!(validate_edges(2, &[(0, 0), (0, 1), (1, 1)]).is_ok());
    }

    #[test]
    fn test_stream_indices_unique() {
        let chunks = build_chunks(&round_robin_pairs(6), 4);
        let streams: HashSet<u64> = chunks
            .iter()
            .flat_map(|c| (0..c.repetitions).map(move |r| c.stream_index(r)))
            .collect();
        assert_eq!(streams.len(), 15 * 4);
    }
}
