//! Actions for the Prisoner's Dilemma

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ArenaError, Result};

/// A move in the Prisoner's Dilemma
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    /// Cooperate
    C,
    /// Defect
    D,
}

pub use Action::{C, D};

/// One turn of a match: (player 1 action, player 2 action)
pub type Interaction = (Action, Action);

impl Action {
    /// The opposite action.
    pub fn flip(self) -> Action {
        match self {
            C => D,
            D => C,
        }
    }

    pub fn from_char(character: char) -> Result<Action> {
        match character {
            'C' => Ok(C),
            'D' => Ok(D),
            other => Err(ArenaError::UnknownAction(other)),
        }
    }

    pub fn to_char(self) -> char {
        match self {
            C => 'C',
            D => 'D',
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Converts a string of 'C's and 'D's to actions.
pub fn str_to_actions(actions: &str) -> Result<Vec<Action>> {
    actions.chars().map(Action::from_char).collect()
}

/// Converts actions to a string: (D, D, C) becomes "DDC".
pub fn actions_to_str<'a>(actions: impl IntoIterator<Item = &'a Action>) -> String {
    actions.into_iter().map(|a| a.to_char()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip() {
        assert_eq!(C.flip(), D);
        assert_eq!(D.flip(), C);
        assert_eq!(C.flip().flip(), C);
    }

    #[test]
    fn test_from_char() {
        assert_eq!(Action::from_char('C').unwrap(), C);
        assert_eq!(Action::from_char('D').unwrap(), D);
        assert!(matches!(
            Action::from_char('x'),
            Err(ArenaError::UnknownAction('x'))
        ));
    }

    #[test]
    fn test_str_conversions() {
        let actions = str_to_actions("CDDC").unwrap();
        assert_eq!(actions, vec![C, D, D, C]);
        assert_eq!(actions_to_str(&actions), "CDDC");
        assert_eq!(actions_to_str(&Vec::<Action>::new()), "");
        assert!(str_to_actions("CDE").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}{}", C, D), "CD");
    }
}
