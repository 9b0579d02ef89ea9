//! Base strategy definitions and execution
//!
//! Each base strategy is a pure function of the visible history (plus the
//! match RNG for stochastic ones). Behaviour modifiers live in
//! [`crate::transformer`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::action::{Action, C, D};
use crate::classifier::{Classifiers, MatchAttribute, MemoryDepth};
use crate::game::{Length, MatchAttributes};
use crate::history::History;
use crate::random::{Probability, SeededRng};

/// Base strategy type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyBase {
    /// Always cooperate, never defect.
    Cooperator,
    /// Always defect, never cooperate.
    Defector,
    /// Copy opponent's last move. Start with cooperate.
    TitForTat,
    /// Cooperate until opponent defects once, then always defect.
    Grudger,
    /// Win-stay, lose-switch. Repeat move if good outcome.
    WinStayLoseShift,
    /// Tit-for-Tat but start with defect.
    SuspiciousTitForTat,
    /// Random choice each round.
    Random,
    /// Defect only if opponent defected twice in a row.
    TitForTwoTats,
    /// Retaliate with increasing defection streaks, then forgive.
    Gradual,
    /// Cooperate, then alternate.
    Alternator,
    /// Forgive three defections, defect forever on the fourth, and defect
    /// on the last two turns of a known-length match.
    BackStabber,
}

impl StrategyBase {
    pub const ALL: [StrategyBase; 11] = [
        StrategyBase::Cooperator,
        StrategyBase::Defector,
        StrategyBase::TitForTat,
        StrategyBase::Grudger,
        StrategyBase::WinStayLoseShift,
        StrategyBase::SuspiciousTitForTat,
        StrategyBase::Random,
        StrategyBase::TitForTwoTats,
        StrategyBase::Gradual,
        StrategyBase::Alternator,
        StrategyBase::BackStabber,
    ];
}

/// Strategy parameters for fine-tuning behavior
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Chance to cooperate for the Random strategy
    pub cooperate_probability: Probability,
    /// Rounds Tit-for-Tat waits before retaliating (0-10)
    pub retaliation_delay: u8,
    /// Number of defections Grudger ignores before triggering (0-5)
    pub noise_tolerance: u8,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            cooperate_probability: Probability::HALF,
            retaliation_delay: 0,
            noise_tolerance: 0,
        }
    }
}

/// Complete base strategy with type and parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Strategy {
    pub base: StrategyBase,
    #[serde(default)]
    pub params: StrategyParams,
}

impl Strategy {
    /// Create a new strategy with default parameters
    pub fn new(base: StrategyBase) -> Self {
        Self {
            base,
            params: StrategyParams::default(),
        }
    }

    /// Create with custom parameters
    pub fn with_params(base: StrategyBase, params: StrategyParams) -> Self {
        Self { base, params }
    }

    /// Random strategy cooperating with probability `p`
    pub fn random(p: Probability) -> Self {
        Self::with_params(
            StrategyBase::Random,
            StrategyParams {
                cooperate_probability: p,
                ..Default::default()
            },
        )
    }

    /// Human-readable name
    pub fn name(&self) -> String {
        match self.base {
            StrategyBase::Cooperator => "Cooperator".to_string(),
            StrategyBase::Defector => "Defector".to_string(),
            StrategyBase::TitForTat if self.params.retaliation_delay > 0 => {
                format!("Tit For Tat: {}", self.params.retaliation_delay)
            }
            StrategyBase::TitForTat => "Tit For Tat".to_string(),
            StrategyBase::Grudger if self.params.noise_tolerance > 0 => {
                format!("Grudger: {}", self.params.noise_tolerance)
            }
            StrategyBase::Grudger => "Grudger".to_string(),
            StrategyBase::WinStayLoseShift => "Win-Stay Lose-Shift".to_string(),
            StrategyBase::SuspiciousTitForTat => "Suspicious Tit For Tat".to_string(),
            StrategyBase::Random => {
                format!("Random: {}", self.params.cooperate_probability.value())
            }
            StrategyBase::TitForTwoTats => "Tit For 2 Tats".to_string(),
            StrategyBase::Gradual => "Gradual".to_string(),
            StrategyBase::Alternator => "Alternator".to_string(),
            StrategyBase::BackStabber => "BackStabber".to_string(),
        }
    }

    /// Identifier without spaces, e.g. `TitForTat`
    pub fn identifier(&self) -> String {
        format!("{:?}", self.base)
    }

    /// Static classification of this strategy
    pub fn classifier(&self) -> Classifiers {
        let depth = match self.base {
            StrategyBase::Cooperator | StrategyBase::Defector | StrategyBase::Random => {
                MemoryDepth::Finite(0)
            }
            StrategyBase::TitForTat => {
                MemoryDepth::Finite(1 + self.params.retaliation_delay as u32)
            }
            StrategyBase::WinStayLoseShift
            | StrategyBase::SuspiciousTitForTat
            | StrategyBase::Alternator => MemoryDepth::Finite(1),
            StrategyBase::TitForTwoTats => MemoryDepth::Finite(2),
            StrategyBase::Grudger | StrategyBase::Gradual | StrategyBase::BackStabber => {
                MemoryDepth::Infinite
            }
        };
        let stochastic = self.base == StrategyBase::Random
            && !self.params.cooperate_probability.is_degenerate();
        let makes_use_of: BTreeSet<MatchAttribute> = match self.base {
            StrategyBase::BackStabber => [MatchAttribute::Length].into_iter().collect(),
            _ => BTreeSet::new(),
        };
        Classifiers {
            stochastic,
            memory_depth: depth,
            makes_use_of,
            ..Classifiers::default()
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Self::new(StrategyBase::TitForTat)
    }
}

/// What a strategy can see when choosing its next move
#[derive(Clone, Copy, Debug)]
pub struct Context<'a> {
    /// Our own plays, with the opponent's moves as coplays
    pub own: &'a History,
    /// The opponent's history, read-only
    pub opponent: &'a History,
    pub attributes: &'a MatchAttributes,
}

/// Execute a base strategy for one round
pub fn execute_strategy(strategy: &Strategy, ctx: &Context<'_>, rng: &mut SeededRng) -> Action {
    let opponent_history = ctx.opponent.plays();
    let my_history = ctx.own.plays();

    match strategy.base {
        StrategyBase::Cooperator => C,
        StrategyBase::Defector => D,
        StrategyBase::TitForTat => execute_tit_for_tat(opponent_history, &strategy.params),
        StrategyBase::Grudger => execute_grudger(ctx.opponent, &strategy.params),
        StrategyBase::WinStayLoseShift => execute_win_stay_lose_shift(opponent_history, my_history),
        StrategyBase::SuspiciousTitForTat => match opponent_history.last() {
            None => D,
            Some(last) => *last,
        },
        StrategyBase::Random => rng.random_choice(strategy.params.cooperate_probability),
        StrategyBase::TitForTwoTats => execute_tit_for_two_tats(opponent_history),
        StrategyBase::Gradual => execute_gradual(ctx.opponent, ctx.own),
        StrategyBase::Alternator => match my_history.last() {
            None => C,
            Some(last) => last.flip(),
        },
        StrategyBase::BackStabber => execute_back_stabber(ctx),
    }
}

/// Tit-for-Tat: Copy opponent's last move, start with cooperate
fn execute_tit_for_tat(opponent_history: &[Action], params: &StrategyParams) -> Action {
    match opponent_history.last() {
        None | Some(C) => C,
        Some(D) => {
            // Retaliation delay: wait N rounds after seeing defection
            if params.retaliation_delay > 0 {
                if let Some(pos) = opponent_history.iter().rposition(|m| *m == D) {
                    let rounds_since = opponent_history.len() - 1 - pos;
                    if rounds_since < params.retaliation_delay as usize {
                        return C;
                    }
                }
            }
            D
        }
    }
}

/// Grudger: Cooperate until opponent defects, then always defect
fn execute_grudger(opponent: &History, params: &StrategyParams) -> Action {
    if opponent.defections() > params.noise_tolerance as usize {
        D
    } else {
        C
    }
}

/// Win-stay, lose-switch: repeat after R or T, switch after S or P
fn execute_win_stay_lose_shift(opponent_history: &[Action], my_history: &[Action]) -> Action {
    match (my_history.last(), opponent_history.last()) {
        (Some(mine), Some(C)) => *mine,
        (Some(mine), Some(D)) => mine.flip(),
        _ => C,
    }
}

/// Tit-for-Two-Tats: Only defect if opponent defected twice in a row
fn execute_tit_for_two_tats(opponent_history: &[Action]) -> Action {
    if opponent_history.ends_with(&[D, D]) {
        D
    } else {
        C
    }
}

/// Gradual: Escalating retaliation
/// After N opponent defections, player should have made N(N+1)/2 total defections
fn execute_gradual(opponent: &History, own: &History) -> Action {
    let their_defections = opponent.defections();
    let expected = their_defections * (their_defections + 1) / 2;

    if own.defections() < expected {
        D
    } else {
        C
    }
}

fn execute_back_stabber(ctx: &Context<'_>) -> Action {
    if ctx.opponent.defections() > 3 {
        return D;
    }
    if let Length::Turns(length) = ctx.attributes.length {
        if ctx.own.len() + 2 >= length as usize {
            return D;
        }
    }
    C
}

/// Get a human-readable description of a strategy
pub fn describe_strategy(strategy: &Strategy) -> String {
    let base_desc = match strategy.base {
        StrategyBase::Cooperator => "Never defects. Always cooperates.",
        StrategyBase::Defector => "Never cooperates. Always defects.",
        StrategyBase::TitForTat => "Copies opponent's last move. Starts by cooperating.",
        StrategyBase::Grudger => "Cooperates until betrayed, then always defects.",
        StrategyBase::WinStayLoseShift => "Repeats move if outcome was good, switches if bad.",
        StrategyBase::SuspiciousTitForTat => "Like Tit-for-Tat, but starts with defect.",
        StrategyBase::Random => "Randomly cooperates or defects each round.",
        StrategyBase::TitForTwoTats => "Only retaliates after two consecutive defections.",
        StrategyBase::Gradual => "Retaliates with increasing severity, then forgives.",
        StrategyBase::Alternator => "Cooperates first, then alternates.",
        StrategyBase::BackStabber => {
            "Forgives three defections and defects on the last two rounds of a known-length match."
        }
    };

    let mut desc = base_desc.to_string();

    if strategy.params.noise_tolerance > 0 && strategy.base == StrategyBase::Grudger {
        desc.push_str(&format!(
            " Tolerates {} accidental defections.",
            strategy.params.noise_tolerance
        ));
    }

    desc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(strategy: &Strategy, mine: &[Action], theirs: &[Action]) -> Action {
        run_with(strategy, mine, theirs, &MatchAttributes::default())
    }

    fn run_with(
        strategy: &Strategy,
        mine: &[Action],
        theirs: &[Action],
        attributes: &MatchAttributes,
    ) -> Action {
        let own = History::from_plays(mine.to_vec(), theirs.to_vec());
        let opponent = History::from_plays(theirs.to_vec(), mine.to_vec());
        let ctx = Context {
            own: &own,
            opponent: &opponent,
            attributes,
        };
        execute_strategy(strategy, &ctx, &mut SeededRng::new(42))
    }

    #[test]
    fn test_tit_for_tat() {
        let strategy = Strategy::new(StrategyBase::TitForTat);
        assert_eq!(run(&strategy, &[], &[]), C);
        assert_eq!(run(&strategy, &[C], &[C]), C);
        assert_eq!(run(&strategy, &[C], &[D]), D);
    }

    #[test]
    fn test_always_defect_and_cooperate() {
        let defector = Strategy::new(StrategyBase::Defector);
        let cooperator = Strategy::new(StrategyBase::Cooperator);
        assert_eq!(run(&defector, &[], &[]), D);
        assert_eq!(run(&defector, &[D], &[C]), D);
        assert_eq!(run(&cooperator, &[], &[]), C);
        assert_eq!(run(&cooperator, &[C], &[D]), C);
    }

    #[test]
    fn test_grudger() {
        let strategy = Strategy::new(StrategyBase::Grudger);
        assert_eq!(run(&strategy, &[C, C], &[C, C]), C);
        assert_eq!(run(&strategy, &[C, C, C], &[C, D, C]), D);
    }

    #[test]
    fn test_grudger_noise_tolerance() {
        let strategy = Strategy::with_params(
            StrategyBase::Grudger,
            StrategyParams {
                noise_tolerance: 1,
                ..Default::default()
            },
        );
        assert_eq!(run(&strategy, &[C], &[D]), C);
        assert_eq!(run(&strategy, &[C, C], &[D, D]), D);
        assert_eq!(strategy.name(), "Grudger: 1");
    }

    #[test]
    fn test_win_stay_lose_shift() {
        let strategy = Strategy::new(StrategyBase::WinStayLoseShift);
        assert_eq!(run(&strategy, &[], &[]), C);
        assert_eq!(run(&strategy, &[C], &[C]), C);
        assert_eq!(run(&strategy, &[D], &[C]), D);
        assert_eq!(run(&strategy, &[C], &[D]), D);
        assert_eq!(run(&strategy, &[D], &[D]), C);
    }

    #[test]
    fn test_suspicious_tft_starts_defect() {
        let strategy = Strategy::new(StrategyBase::SuspiciousTitForTat);
        assert_eq!(run(&strategy, &[], &[]), D);
        assert_eq!(run(&strategy, &[D], &[C]), C);
    }

    #[test]
    fn test_tit_for_two_tats() {
        let strategy = Strategy::new(StrategyBase::TitForTwoTats);
        assert_eq!(run(&strategy, &[C, C], &[C, D]), C);
        assert_eq!(run(&strategy, &[C, C], &[D, D]), D);
    }

    #[test]
    fn test_gradual() {
        let strategy = Strategy::new(StrategyBase::Gradual);
        // one opponent defection calls for one of ours
        assert_eq!(run(&strategy, &[C], &[D]), D);
        assert_eq!(run(&strategy, &[C, D], &[D, C]), C);
        // two defections in total call for three of ours
        assert_eq!(run(&strategy, &[C, D, C], &[D, C, D]), D);
    }

    #[test]
    fn test_alternator() {
        let strategy = Strategy::new(StrategyBase::Alternator);
        assert_eq!(run(&strategy, &[], &[]), C);
        assert_eq!(run(&strategy, &[C], &[D]), D);
        assert_eq!(run(&strategy, &[C, D], &[D, D]), C);
    }

    #[test]
    fn test_back_stabber_uses_length() {
        let strategy = Strategy::new(StrategyBase::BackStabber);
        let known = MatchAttributes {
            length: Length::Turns(4),
            ..MatchAttributes::default()
        };
        assert_eq!(run_with(&strategy, &[C], &[C], &known), C);
        assert_eq!(run_with(&strategy, &[C, C], &[C, C], &known), D);
        // unknown length never triggers the endgame
        assert_eq!(run(&strategy, &[C, C, C], &[C, C, C]), C);
        assert_eq!(run(&strategy, &[C; 4], &[D; 4]), D);
        assert!(strategy
            .classifier()
            .makes_use_of
            .contains(&MatchAttribute::Length));
    }

    #[test]
    fn test_retaliation_delay_tft() {
        let strategy = Strategy::with_params(
            StrategyBase::TitForTat,
            StrategyParams {
                retaliation_delay: 2,
                ..Default::default()
            },
        );
        assert_eq!(run(&strategy, &[C, C], &[C, D]), C);
        assert_eq!(strategy.classifier().memory_depth, MemoryDepth::Finite(3));
    }

    #[test]
    fn test_random_degenerate_bias() {
        let always = Strategy::random(Probability::ONE);
        let never = Strategy::random(Probability::ZERO);
        for _ in 0..20 {
            assert_eq!(run(&always, &[], &[]), C);
            assert_eq!(run(&never, &[], &[]), D);
        }
        assert!(!always.classifier().stochastic);
        assert!(Strategy::new(StrategyBase::Random).classifier().stochastic);
    }

    #[test]
    fn test_names() {
        assert_eq!(Strategy::new(StrategyBase::TitForTat).name(), "Tit For Tat");
        assert_eq!(Strategy::new(StrategyBase::TitForTat).identifier(), "TitForTat");
        assert_eq!(Strategy::new(StrategyBase::Random).name(), "Random: 0.5");
    }

    #[test]
    fn test_describe_strategy() {
        let desc = describe_strategy(&Strategy::with_params(
            StrategyBase::Grudger,
            StrategyParams {
                noise_tolerance: 2,
                ..Default::default()
            },
        ));
        assert!(desc.contains("Tolerates 2"));
    }

    #[test]
    fn test_default_cooperate_probability_is_half() {
        assert_eq!(StrategyParams::default().cooperate_probability.value(), 0.5);
        assert_eq!(StrategyParams::default().cooperate_probability, Probability::HALF);
        assert!(!Probability::HALF.is_degenerate());
        assert_eq!(Strategy::new(StrategyBase::Random).name(), "Random: 0.5");
        assert!(Strategy::new(StrategyBase::Random).classifier().stochastic);
    }
}
