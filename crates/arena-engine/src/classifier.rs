//! Strategy classification and the strategy registry

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::Result;
use crate::player::PlayerSpec;
use crate::strategy::{Strategy, StrategyBase};

/// How many past turns a strategy may look at.
///
/// `Finite` orders below `Infinite`, so `max` raises depth as expected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemoryDepth {
    Finite(u32),
    Infinite,
}

impl Default for MemoryDepth {
    fn default() -> Self {
        MemoryDepth::Finite(0)
    }
}

impl fmt::Display for MemoryDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryDepth::Finite(n) => write!(f, "{}", n),
            MemoryDepth::Infinite => write!(f, "inf"),
        }
    }
}

/// Match attributes a strategy may read
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchAttribute {
    Length,
    Game,
    Noise,
}

/// Static classification of a strategy
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifiers {
    pub stochastic: bool,
    pub memory_depth: MemoryDepth,
    pub long_run_time: bool,
    pub inspects_source: bool,
    pub manipulates_source: bool,
    pub manipulates_state: bool,
    pub makes_use_of: BTreeSet<MatchAttribute>,
}

impl Classifiers {
    /// Deterministic, memory zero, touching nothing
    pub fn inert() -> Self {
        Self::default()
    }

    /// Follows the rules of the original tournament: no source inspection or
    /// manipulation of either kind.
    pub fn obeys_rules(&self) -> bool {
        !(self.inspects_source || self.manipulates_source || self.manipulates_state)
    }
}

/// Criteria for [`StrategyRegistry::filter`]. `None` fields match anything.
#[derive(Clone, Debug, Default)]
pub struct ClassifierFilter {
    pub stochastic: Option<bool>,
    pub min_memory_depth: Option<MemoryDepth>,
    pub max_memory_depth: Option<MemoryDepth>,
    pub long_run_time: Option<bool>,
    pub obeys_rules: Option<bool>,
    /// Strategies must use every listed attribute.
    pub makes_use_of: BTreeSet<MatchAttribute>,
}

impl ClassifierFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stochastic(mut self, stochastic: bool) -> Self {
        self.stochastic = Some(stochastic);
        self
    }

    pub fn with_min_memory_depth(mut self, depth: MemoryDepth) -> Self {
        self.min_memory_depth = Some(depth);
        self
    }

    pub fn with_max_memory_depth(mut self, depth: MemoryDepth) -> Self {
        self.max_memory_depth = Some(depth);
        self
    }

    pub fn with_long_run_time(mut self, long_run_time: bool) -> Self {
        self.long_run_time = Some(long_run_time);
        self
    }

    pub fn with_obeys_rules(mut self, obeys: bool) -> Self {
        self.obeys_rules = Some(obeys);
        self
    }

    pub fn with_makes_use_of(mut self, attribute: MatchAttribute) -> Self {
        self.makes_use_of.insert(attribute);
        self
    }

    pub fn matches(&self, classifiers: &Classifiers) -> bool {
        self.stochastic.is_none_or(|s| classifiers.stochastic == s)
            && self
                .min_memory_depth
                .is_none_or(|d| classifiers.memory_depth >= d)
            && self
                .max_memory_depth
                .is_none_or(|d| classifiers.memory_depth <= d)
            && self
                .long_run_time
                .is_none_or(|l| classifiers.long_run_time == l)
            && self
                .obeys_rules
                .is_none_or(|o| classifiers.obeys_rules() == o)
            && self.makes_use_of.is_subset(&classifiers.makes_use_of)
    }
}

/// A registered strategy with its computed classification
#[derive(Clone, Debug, PartialEq)]
pub struct RegistryEntry {
    pub spec: PlayerSpec,
    pub classifiers: Classifiers,
}

/// Explicit lookup table of known strategies.
///
/// Passed by reference to whatever needs it; there is no global instance.
#[derive(Clone, Debug, Default)]
pub struct StrategyRegistry {
    entries: Vec<RegistryEntry>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every base strategy with default parameters
    pub fn standard() -> Result<Self> {
        let mut registry = Self::new();
        for base in StrategyBase::ALL {
            registry.register(PlayerSpec::new(Strategy::new(base)))?;
        }
        Ok(registry)
    }

    /// Add a descriptor, classifying it once. Re-registering a descriptor
    /// is a no-op.
    pub fn register(&mut self, spec: PlayerSpec) -> Result<()> {
        if self.entries.iter().any(|e| e.spec == spec) {
            return Ok(());
        }
        let classifiers = spec.classifier()?;
        self.entries.push(RegistryEntry { spec, classifiers });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Look up by display name
    pub fn by_name(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.spec.name() == name)
    }

    /// Look up by identifier (name without spaces)
    pub fn by_identifier(&self, identifier: &str) -> Option<&RegistryEntry> {
        self.entries
            .iter()
            .find(|e| e.spec.identifier() == identifier)
    }

    pub fn classify(&self, spec: &PlayerSpec) -> Option<&Classifiers> {
        self.entries
            .iter()
            .find(|e| &e.spec == spec)
            .map(|e| &e.classifiers)
    }

    pub fn filter(&self, filter: &ClassifierFilter) -> Vec<&PlayerSpec> {
        self.entries
            .iter()
            .filter(|e| filter.matches(&e.classifiers))
            .map(|e| &e.spec)
            .collect()
    }
}
