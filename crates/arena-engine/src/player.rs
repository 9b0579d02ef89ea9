//! Player descriptors and runtime agents

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::classifier::Classifiers;
use crate::error::Result;
use crate::game::MatchAttributes;
use crate::history::History;
use crate::random::SeededRng;
use crate::strategy::{execute_strategy, Context, Strategy, StrategyBase};
use crate::transformer::{Layer, Transformer};

/// Everything needed to build a player: the base strategy and the
/// transformers applied to it, innermost first.
///
/// Two equal descriptors always build interchangeable players, which is what
/// makes descriptors usable as cache keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerSpec {
    pub base: Strategy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformers: Vec<Transformer>,
}

impl PlayerSpec {
    pub fn new(base: Strategy) -> Self {
        Self {
            base,
            transformers: Vec::new(),
        }
    }

    /// Descriptor with `transformer` applied on top
    pub fn transform(&self, transformer: Transformer) -> PlayerSpec {
        let mut spec = self.clone();
        spec.transformers.push(transformer);
        spec
    }

    pub fn name(&self) -> String {
        self.transformers
            .iter()
            .fold(self.base.name(), |name, t| t.rename(&name))
    }

    pub fn identifier(&self) -> String {
        self.transformers
            .iter()
            .fold(self.base.identifier(), |id, t| t.rename_identifier(&id))
    }

    /// Classification after every transformer has had its say.
    pub fn classifier(&self) -> Result<Classifiers> {
        self.transformers
            .iter()
            .try_fold(self.base.classifier(), |c, t| t.kind.reclassify(c))
    }

    /// Invalid descriptors count as stochastic: they can never be cached.
    pub fn is_stochastic(&self) -> bool {
        self.classifier().map(|c| c.stochastic).unwrap_or(true)
    }
}

impl From<StrategyBase> for PlayerSpec {
    fn from(base: StrategyBase) -> Self {
        PlayerSpec::new(Strategy::new(base))
    }
}

impl From<Strategy> for PlayerSpec {
    fn from(base: Strategy) -> Self {
        PlayerSpec::new(base)
    }
}

/// A playing agent built from a [`PlayerSpec`]
#[derive(Clone, Debug)]
pub struct Player {
    spec: PlayerSpec,
    classifier: Classifiers,
    history: History,
    layers: Vec<Layer>,
    match_attributes: MatchAttributes,
}

impl PartialEq for Player {
    fn eq(&self, other: &Self) -> bool {
        self.spec == other.spec && self.history == other.history
    }
}

impl Player {
    pub fn new(spec: PlayerSpec) -> Result<Self> {
        let mut classifier = spec.base.classifier();
        let mut layers = Vec::with_capacity(spec.transformers.len());
        for transformer in &spec.transformers {
            let inner_stochastic = classifier.stochastic;
            classifier = transformer.kind.reclassify(classifier)?;
            layers.push(Layer::new(transformer.clone(), inner_stochastic)?);
        }
        Ok(Self {
            spec,
            classifier,
            history: History::new(),
            layers,
            match_attributes: MatchAttributes::default(),
        })
    }

    pub fn spec(&self) -> &PlayerSpec {
        &self.spec
    }

    pub fn name(&self) -> String {
        self.spec.name()
    }

    pub fn classifier(&self) -> &Classifiers {
        &self.classifier
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn match_attributes(&self) -> &MatchAttributes {
        &self.match_attributes
    }

    pub fn set_match_attributes(&mut self, attributes: MatchAttributes) {
        self.match_attributes = attributes;
    }

    /// Next action against an opponent with the given history.
    ///
    /// Does not record anything; call [`Player::update_history`] with the
    /// actions actually played.
    pub fn strategy(&mut self, opponent: &History, rng: &mut SeededRng) -> Action {
        let ctx = Context {
            own: &self.history,
            opponent,
            attributes: &self.match_attributes,
        };
        decide(&self.spec.base, &mut self.layers, &ctx, rng)
    }

    /// Decide from someone else's view of the match. Used when this player
    /// stands in for another one.
    pub(crate) fn decide_with(&mut self, ctx: &Context<'_>, rng: &mut SeededRng) -> Action {
        decide(&self.spec.base, &mut self.layers, ctx, rng)
    }

    pub fn update_history(&mut self, play: Action, coplay: Action) {
        self.history.push(play, coplay);
    }

    /// Proposals recorded by the outermost history-tracking layer
    pub fn tracked_history(&self) -> Option<&[Action]> {
        self.layers.iter().rev().find_map(Layer::tracked)
    }

    /// Back to the state right after construction, keeping match attributes
    pub fn reset(&mut self) {
        self.history.clear();
        self.layers.iter_mut().for_each(Layer::reset);
    }

    /// An unplayed agent of the same configuration
    pub fn clone_fresh(&self) -> Player {
        let mut fresh = self.clone();
        fresh.reset();
        fresh.match_attributes = MatchAttributes::default();
        fresh
    }
}

fn decide(
    base: &Strategy,
    layers: &mut [Layer],
    ctx: &Context<'_>,
    rng: &mut SeededRng,
) -> Action {
    match layers.split_last_mut() {
        None => execute_strategy(base, ctx, rng),
        Some((outer, inner)) => {
            outer.decide(ctx, rng, |ctx, rng| decide(base, inner, ctx, rng))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{C, D};
    use crate::classifier::MemoryDepth;
    use crate::transformer::TransformKind;

    #[test]
    fn test_player_plays_against_history() {
        let mut player = Player::new(StrategyBase::TitForTat.into()).unwrap();
        let mut rng = SeededRng::new(0);
        let opponent = History::from_plays(vec![D], vec![C]);
        player.update_history(C, D);
        assert_eq!(player.strategy(&opponent, &mut rng), D);
        assert_eq!(player.history().len(), 1);
    }

    #[test]
    fn test_reset_restores_layer_state() {
        let spec = PlayerSpec::from(StrategyBase::Cooperator)
            .transform(Transformer::new(TransformKind::TrackHistory));
        let mut player = Player::new(spec).unwrap();
        let mut rng = SeededRng::new(0);
        player.strategy(&History::new(), &mut rng);
        player.update_history(C, C);
        assert_eq!(player.tracked_history(), Some(&[C][..]));

        player.reset();
        assert!(player.history().is_empty());
        assert_eq!(player.tracked_history(), Some(&[][..]));
    }

    #[test]
    fn test_clone_fresh() {
        let mut player = Player::new(StrategyBase::Grudger.into()).unwrap();
        player.update_history(C, D);
        let fresh = player.clone_fresh();
        assert!(fresh.history().is_empty());
        assert_eq!(fresh.spec(), player.spec());
        assert_eq!(fresh.classifier().memory_depth, MemoryDepth::Infinite);
    }

    #[test]
    fn test_invalid_spec_rejected() {
        let spec = PlayerSpec::from(StrategyBase::Cooperator).transform(Transformer::new(
            TransformKind::Apology(vec![C], vec![]),
        ));
        assert!(Player::new(spec.clone()).is_err());
        assert!(spec.is_stochastic());
    }

    #[test]
    fn test_transform_leaves_original_untouched() {
        let base = PlayerSpec::from(StrategyBase::Defector);
        let flipped = base.transform(Transformer::new(TransformKind::Flip));
        assert!(base.transformers.is_empty());
        assert_eq!(flipped.transformers.len(), 1);
        assert_eq!(flipped.identifier(), "FlippedDefector");
    }

    #[test]
    fn test_spec_json_shape() {
        let json = serde_json::to_value(PlayerSpec::from(StrategyBase::TitForTat)).unwrap();
        assert_eq!(json["base"]["base"], "TitForTat");
        let back: PlayerSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, PlayerSpec::from(StrategyBase::TitForTat));
    }
}
