//! Per-player play history

use serde::{Deserialize, Serialize};

use crate::action::{Action, Interaction, C, D};

/// A player's own actions (`plays`) and the actions played against it
/// (`coplays`), with running counts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    plays: Vec<Action>,
    coplays: Vec<Action>,
    cooperations: usize,
    defections: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_plays(plays: Vec<Action>, coplays: Vec<Action>) -> Self {
        debug_assert_eq!(plays.len(), coplays.len());
        let cooperations = plays.iter().filter(|a| **a == C).count();
        let defections = plays.len() - cooperations;
        Self {
            plays,
            coplays,
            cooperations,
            defections,
        }
    }

    pub fn push(&mut self, play: Action, coplay: Action) {
        self.plays.push(play);
        self.coplays.push(coplay);
        match play {
            C => self.cooperations += 1,
            D => self.defections += 1,
        }
    }

    pub fn plays(&self) -> &[Action] {
        &self.plays
    }

    pub fn coplays(&self) -> &[Action] {
        &self.coplays
    }

    pub fn len(&self) -> usize {
        self.plays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }

    pub fn last(&self) -> Option<Action> {
        self.plays.last().copied()
    }

    pub fn cooperations(&self) -> usize {
        self.cooperations
    }

    pub fn defections(&self) -> usize {
        self.defections
    }

    /// (own, opponent) pairs in turn order
    pub fn interactions(&self) -> impl Iterator<Item = Interaction> + '_ {
        self.plays.iter().copied().zip(self.coplays.iter().copied())
    }

    /// Copy with every play and coplay flipped
    pub fn flipped(&self) -> History {
        History::from_plays(
            self.plays.iter().map(|a| a.flip()).collect(),
            self.coplays.iter().map(|a| a.flip()).collect(),
        )
    }

    pub fn clear(&mut self) {
        *self = History::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_counts() {
        let mut h = History::new();
        h.push(C, D);
        h.push(D, D);
        h.push(C, C);

        assert_eq!(h.len(), 3);
        assert_eq!(h.cooperations(), 2);
        assert_eq!(h.defections(), 1);
        assert_eq!(h.plays(), &[C, D, C]);
        assert_eq!(h.coplays(), &[D, D, C]);
        assert_eq!(h.last(), Some(C));
    }

    #[test]
    fn test_flipped() {
        let h = History::from_plays(vec![C, D], vec![D, D]);
        let f = h.flipped();
        assert_eq!(f.plays(), &[D, C]);
        assert_eq!(f.coplays(), &[C, C]);
        assert_eq!(f.cooperations(), 1);
        assert_eq!(f.flipped(), h);
    }

    #[test]
    fn test_clear() {
        let mut h = History::from_plays(vec![C], vec![D]);
        h.clear();
        assert!(h.is_empty());
        assert_eq!(h.defections(), 0);
        assert_eq!(h.last(), None);
    }
}
