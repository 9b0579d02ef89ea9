//! Strategy transformers
//!
//! A transformer is plain data describing a behaviour modifier. Applying one
//! to a [`PlayerSpec`] appends it to the descriptor's transformer list, so a
//! transformed strategy is always the pair (base strategy, ordered
//! transformers) and round-trips through serde without generated types.
//!
//! At runtime each transformer becomes a [`Layer`] wrapped around the
//! decision of everything applied before it. Every layer asks the inner
//! decision for a proposed action and then adjusts it, except for two
//! structural cases:
//!
//! - `Dual` hands the inner decision flipped copies of both histories and
//!   flips what comes back. The real histories are never touched.
//! - `JossAnn` with probabilities `(1, 0)` or `(0, 1)` over a deterministic
//!   inner strategy returns the forced action without consulting the inner
//!   decision, so no randomness is consumed.

use serde::{Deserialize, Serialize};

use crate::action::{Action, C, D};
use crate::classifier::{Classifiers, MatchAttribute, MemoryDepth};
use crate::error::{ArenaError, Result};
use crate::game::Length;
use crate::player::{Player, PlayerSpec};
use crate::random::{Probability, SeededRng};
use crate::strategy::Context;

/// Tolerance when checking that probabilities sum to at most one
const SUM_TOLERANCE: f64 = 1e-9;

/// The behaviour a transformer adds, with its arguments
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformKind {
    Identity,
    /// Play the opposite of the proposed action
    Flip,
    /// Play the opposite of what the strategy would do given flipped histories
    Dual,
    /// Flip the proposed action with the given probability
    Noisy(Probability),
    /// Turn a proposed defection into cooperation with the given probability
    Forgiver(Probability),
    /// Open with a fixed sequence
    Initial(Vec<Action>),
    /// Close a known-length match with a fixed sequence
    Final(Vec<Action>),
    /// Record every proposed action
    TrackHistory,
    /// Cooperate to break a CD/DC alternation
    DeadlockBreaking,
    /// Defect forever once the opponent has defected more than n times
    Grudge(u32),
    /// Cooperate after the given (own, opponent) closing pattern
    Apology(Vec<Action>, Vec<Action>),
    /// With the given probabilities play another strategy's move instead
    Mixed(Vec<Probability>, Vec<PlayerSpec>),
    /// Cooperate with probability pc, defect with pd, otherwise as proposed
    JossAnn(Probability, Probability),
    /// Retaliate n times for every opponent defection
    Retaliation(u32),
    /// Defect until the opponent cooperates again
    RetaliateUntilApology,
}

impl TransformKind {
    pub fn default_prefix(&self) -> Option<&'static str> {
        let prefix = match self {
            TransformKind::Identity => return None,
            TransformKind::Flip => "Flipped",
            TransformKind::Dual => "Dual",
            TransformKind::Noisy(_) => "Noisy",
            TransformKind::Forgiver(_) => "Forgiving",
            TransformKind::Initial(_) => "Initial",
            TransformKind::Final(_) => "Final",
            TransformKind::TrackHistory => "HistoryTracking",
            TransformKind::DeadlockBreaking => "DeadlockBreaking",
            TransformKind::Grudge(_) => "Grudging",
            TransformKind::Apology(_, _) => "Apologizing",
            TransformKind::Mixed(_, _) => "Mutated",
            TransformKind::JossAnn(_, _) => "Joss-Ann",
            TransformKind::Retaliation(_) => "Retaliating",
            TransformKind::RetaliateUntilApology => "RUA",
        };
        Some(prefix)
    }

    /// Adjust the classification of the strategy being wrapped.
    ///
    /// Fails on argument combinations no strategy can play with.
    pub fn reclassify(&self, mut classifiers: Classifiers) -> Result<Classifiers> {
        match self {
            TransformKind::Identity
            | TransformKind::Flip
            | TransformKind::Dual
            | TransformKind::TrackHistory => {}
            TransformKind::Noisy(p) | TransformKind::Forgiver(p) => {
                if !p.is_degenerate() {
                    classifiers.stochastic = true;
                }
            }
            TransformKind::Initial(seq) => {
                classifiers.memory_depth = raise(classifiers.memory_depth, seq.len());
            }
            TransformKind::Final(seq) => {
                classifiers.memory_depth = raise(classifiers.memory_depth, seq.len());
                classifiers.makes_use_of.insert(MatchAttribute::Length);
            }
            TransformKind::DeadlockBreaking => {
                classifiers.memory_depth = raise(classifiers.memory_depth, 2);
            }
            TransformKind::Grudge(_) => {
                classifiers.memory_depth = MemoryDepth::Infinite;
            }
            TransformKind::Apology(mine, theirs) => {
                if mine.len() != theirs.len() {
                    return Err(ArenaError::InvalidConfig(format!(
                        "apology patterns differ in length: {} and {}",
                        mine.len(),
                        theirs.len()
                    )));
                }
                classifiers.memory_depth = raise(classifiers.memory_depth, mine.len());
            }
            TransformKind::Mixed(probabilities, specs) => {
                classifiers = reclassify_mixed(classifiers, probabilities, specs)?;
            }
            TransformKind::JossAnn(pc, pd) => {
                let total = pc.value() + pd.value();
                if total > 1.0 + SUM_TOLERANCE {
                    return Err(ArenaError::InvalidProbability(total));
                }
                if is_forced(*pc, *pd).is_some() {
                    return Ok(Classifiers::inert());
                }
                if total > 0.0 {
                    classifiers.stochastic = true;
                }
            }
            TransformKind::Retaliation(n) => {
                classifiers.memory_depth = if *n <= 1 {
                    raise(classifiers.memory_depth, 1)
                } else {
                    MemoryDepth::Infinite
                };
            }
            TransformKind::RetaliateUntilApology => {
                classifiers.memory_depth = raise(classifiers.memory_depth, 1);
            }
        }
        Ok(classifiers)
    }
}

fn raise(depth: MemoryDepth, turns: usize) -> MemoryDepth {
    let turns = u32::try_from(turns).unwrap_or(u32::MAX);
    depth.max(MemoryDepth::Finite(turns))
}

fn reclassify_mixed(
    mut classifiers: Classifiers,
    probabilities: &[Probability],
    specs: &[PlayerSpec],
) -> Result<Classifiers> {
    if probabilities.len() != specs.len() {
        return Err(ArenaError::InvalidConfig(format!(
            "{} mixing probabilities for {} strategies",
            probabilities.len(),
            specs.len()
        )));
    }
    let total: f64 = probabilities.iter().map(|p| p.value()).sum();
    if total > 1.0 + SUM_TOLERANCE {
        return Err(ArenaError::InvalidProbability(total));
    }

    let mut certain = None;
    for (p, spec) in probabilities.iter().zip(specs) {
        let inner = spec.classifier()?;
        if p.value() > 0.0 {
            classifiers.memory_depth = classifiers.memory_depth.max(inner.memory_depth);
            classifiers.makes_use_of.extend(inner.makes_use_of.iter().copied());
        }
        if *p == Probability::ONE {
            certain = Some(inner.stochastic);
        }
    }

    match certain {
        Some(stochastic) => classifiers.stochastic = stochastic,
        None if total > 0.0 => classifiers.stochastic = true,
        None => {}
    }
    Ok(classifiers)
}

/// The forced action of a degenerate Joss-Ann pair
fn is_forced(pc: Probability, pd: Probability) -> Option<Action> {
    match (pc == Probability::ONE, pd == Probability::ONE) {
        (true, false) if pd == Probability::ZERO => Some(C),
        (false, true) if pc == Probability::ZERO => Some(D),
        _ => None,
    }
}

/// A transformer: a kind plus the prefix it gives to names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transformer {
    pub kind: TransformKind,
    pub name_prefix: Option<String>,
}

impl Transformer {
    /// Transformer with the kind's default prefix
    pub fn new(kind: TransformKind) -> Self {
        let name_prefix = kind.default_prefix().map(str::to_string);
        Self { kind, name_prefix }
    }

    pub fn with_name_prefix(mut self, prefix: Option<&str>) -> Self {
        self.name_prefix = prefix.map(str::to_string);
        self
    }

    pub fn noisy(noise: f64) -> Result<Self> {
        Ok(Self::new(TransformKind::Noisy(Probability::new(noise)?)))
    }

    pub fn forgiver(p: f64) -> Result<Self> {
        Ok(Self::new(TransformKind::Forgiver(Probability::new(p)?)))
    }

    pub fn joss_ann(pc: f64, pd: f64) -> Result<Self> {
        let transformer = Self::new(TransformKind::JossAnn(
            Probability::new(pc)?,
            Probability::new(pd)?,
        ));
        transformer.validate()?;
        Ok(transformer)
    }

    pub fn mixed(probabilities: &[f64], specs: Vec<PlayerSpec>) -> Result<Self> {
        let probabilities = probabilities
            .iter()
            .map(|p| Probability::new(*p))
            .collect::<Result<Vec<_>>>()?;
        let transformer = Self::new(TransformKind::Mixed(probabilities, specs));
        transformer.validate()?;
        Ok(transformer)
    }

    /// Check the arguments without applying the transformer
    pub fn validate(&self) -> Result<()> {
        self.kind.reclassify(Classifiers::default()).map(|_| ())
    }

    pub fn rename(&self, name: &str) -> String {
        match &self.name_prefix {
            Some(prefix) => format!("{} {}", prefix, name),
            None => name.to_string(),
        }
    }

    pub fn rename_identifier(&self, identifier: &str) -> String {
        match &self.name_prefix {
            Some(prefix) => {
                let mut out: String = prefix.chars().filter(|c| c.is_alphanumeric()).collect();
                out.push_str(identifier);
                out
            }
            None => identifier.to_string(),
        }
    }
}

/// Transformers in application order, innermost first
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransformerChain(pub Vec<Transformer>);

impl TransformerChain {
    pub fn apply(&self, spec: &PlayerSpec) -> PlayerSpec {
        self.0
            .iter()
            .fold(spec.clone(), |spec, t| spec.transform(t.clone()))
    }

    pub fn transformers(&self) -> &[Transformer] {
        &self.0
    }
}

impl From<Transformer> for TransformerChain {
    fn from(transformer: Transformer) -> Self {
        TransformerChain(vec![transformer])
    }
}

/// Chain equivalent to applying `inner` and then `outer`
pub fn compose(
    outer: impl Into<TransformerChain>,
    inner: impl Into<TransformerChain>,
) -> TransformerChain {
    let mut chain = inner.into();
    chain.0.extend(outer.into().0);
    chain
}

/// Per-layer mutable state, reset with the player
#[derive(Clone, Debug)]
pub(crate) enum LayerState {
    Stateless,
    Tracked(Vec<Action>),
    Retaliation { pending: u32 },
    RetaliateUntilApology { retaliating: bool },
    Mixed(Vec<Player>),
}

/// A transformer wrapped around the decision of the layers beneath it
#[derive(Clone, Debug)]
pub(crate) struct Layer {
    pub(crate) transformer: Transformer,
    /// Whether everything beneath this layer classifies as stochastic
    pub(crate) inner_stochastic: bool,
    pub(crate) state: LayerState,
}

impl Layer {
    pub(crate) fn new(transformer: Transformer, inner_stochastic: bool) -> Result<Self> {
        let state = match &transformer.kind {
            TransformKind::TrackHistory => LayerState::Tracked(Vec::new()),
            TransformKind::Retaliation(_) => LayerState::Retaliation { pending: 0 },
            TransformKind::RetaliateUntilApology => {
                LayerState::RetaliateUntilApology { retaliating: false }
            }
            TransformKind::Mixed(_, specs) => LayerState::Mixed(
                specs
                    .iter()
                    .cloned()
                    .map(Player::new)
                    .collect::<Result<Vec<_>>>()?,
            ),
            _ => LayerState::Stateless,
        };
        Ok(Self {
            transformer,
            inner_stochastic,
            state,
        })
    }

    pub(crate) fn reset(&mut self) {
        match &mut self.state {
            LayerState::Stateless => {}
            LayerState::Tracked(actions) => actions.clear(),
            LayerState::Retaliation { pending } => *pending = 0,
            LayerState::RetaliateUntilApology { retaliating } => *retaliating = false,
            LayerState::Mixed(players) => players.iter_mut().for_each(Player::reset),
        }
    }

    pub(crate) fn tracked(&self) -> Option<&[Action]> {
        match &self.state {
            LayerState::Tracked(actions) => Some(actions),
            _ => None,
        }
    }

    /// Decide this turn's action, consulting `inner` for the proposal.
    pub(crate) fn decide<F>(&mut self, ctx: &Context<'_>, rng: &mut SeededRng, inner: F) -> Action
    where
        F: FnOnce(&Context<'_>, &mut SeededRng) -> Action,
    {
        match &self.transformer.kind {
            TransformKind::Dual => {
                let own = ctx.own.flipped();
                let opponent = ctx.opponent.flipped();
                let flipped = Context {
                    own: &own,
                    opponent: &opponent,
                    attributes: ctx.attributes,
                };
                return inner(&flipped, rng).flip();
            }
            TransformKind::JossAnn(pc, pd) => {
                if let Some(forced) = is_forced(*pc, *pd) {
                    if !self.inner_stochastic {
                        return forced;
                    }
                    inner(ctx, rng);
                    return forced;
                }
            }
            _ => {}
        }

        let proposed = inner(ctx, rng);
        let own = ctx.own;
        let opponent = ctx.opponent;

        match (&self.transformer.kind, &mut self.state) {
            (TransformKind::Identity, _) | (TransformKind::Dual, _) => proposed,
            (TransformKind::Flip, _) => proposed.flip(),
            (TransformKind::Noisy(p), _) => rng.random_flip(proposed, *p),
            (TransformKind::Forgiver(p), _) => match proposed {
                D => rng.random_choice(*p),
                C => C,
            },
            (TransformKind::Initial(seq), _) => seq.get(own.len()).copied().unwrap_or(proposed),
            (TransformKind::Final(seq), _) => final_move(seq, own.len(), ctx).unwrap_or(proposed),
            (TransformKind::TrackHistory, LayerState::Tracked(actions)) => {
                actions.push(proposed);
                proposed
            }
            (TransformKind::TrackHistory, _) => proposed,
            (TransformKind::DeadlockBreaking, _) => {
                let plays = own.plays();
                let coplays = opponent.plays();
                let n = plays.len();
                if n < 2 {
                    return proposed;
                }
                let penultimate = (plays[n - 2], coplays[n - 2]);
                let last = (plays[n - 1], coplays[n - 1]);
                if (penultimate, last) == ((C, D), (D, C)) || (penultimate, last) == ((D, C), (C, D))
                {
                    C
                } else {
                    proposed
                }
            }
            (TransformKind::Grudge(n), _) => {
                if opponent.defections() > *n as usize {
                    D
                } else {
                    proposed
                }
            }
            (TransformKind::Apology(mine, theirs), _) => {
                if !mine.is_empty()
                    && own.plays().ends_with(mine)
                    && opponent.plays().ends_with(theirs)
                {
                    C
                } else {
                    proposed
                }
            }
            (TransformKind::Mixed(probabilities, _), LayerState::Mixed(players)) => {
                mixed_move(probabilities, players, proposed, ctx, rng)
            }
            (TransformKind::Mixed(_, _), _) => proposed,
            (TransformKind::JossAnn(pc, pd), _) => {
                let total = pc.value() + pd.value();
                if total == 0.0 {
                    return proposed;
                }
                let weights = [pc.value(), pd.value(), (1.0 - total).max(0.0)];
                match rng.choose_weighted(&weights) {
                    Some(0) => C,
                    Some(1) => D,
                    _ => proposed,
                }
            }
            (TransformKind::Retaliation(n), LayerState::Retaliation { pending }) => {
                if own.is_empty() {
                    *pending = 0;
                    return proposed;
                }
                if opponent.last() == Some(D) {
                    *pending += n.saturating_sub(1);
                    return D;
                }
                if *pending > 0 {
                    *pending -= 1;
                    return D;
                }
                proposed
            }
            (TransformKind::Retaliation(_), _) => proposed,
            (
                TransformKind::RetaliateUntilApology,
                LayerState::RetaliateUntilApology { retaliating },
            ) => {
                if own.is_empty() {
                    *retaliating = false;
                    return proposed;
                }
                match opponent.last() {
                    Some(D) => {
                        *retaliating = true;
                        D
                    }
                    _ if *retaliating => {
                        *retaliating = false;
                        proposed
                    }
                    _ => proposed,
                }
            }
            (TransformKind::RetaliateUntilApology, _) => proposed,
        }
    }
}

fn final_move(seq: &[Action], played: usize, ctx: &Context<'_>) -> Option<Action> {
    let Length::Turns(length) = ctx.attributes.length else {
        return None;
    };
    let remaining = (length as usize).checked_sub(played)?;
    if remaining == 0 || remaining > seq.len() {
        return None;
    }
    seq.get(seq.len() - remaining).copied()
}

fn mixed_move(
    probabilities: &[Probability],
    players: &mut [Player],
    proposed: Action,
    ctx: &Context<'_>,
    rng: &mut SeededRng,
) -> Action {
    if let Some(i) = probabilities.iter().position(|p| *p == Probability::ONE) {
        return match players.get_mut(i) {
            Some(player) => player.decide_with(ctx, rng),
            None => proposed,
        };
    }
    let total: f64 = probabilities.iter().map(|p| p.value()).sum();
    if total == 0.0 {
        return proposed;
    }
    let mut weights = Vec::with_capacity(probabilities.len() + 1);
    weights.push((1.0 - total).max(0.0));
    weights.extend(probabilities.iter().map(|p| p.value()));
    match rng.choose_weighted(&weights) {
        Some(i) if i > 0 => match players.get_mut(i - 1) {
            Some(player) => player.decide_with(ctx, rng),
            None => proposed,
        },
        _ => proposed,
    }
}
