//! Cache of deterministic match outcomes
//!
//! A fixed-length, noiseless match between two deterministic players always
//! plays out the same way, so its record can be computed once and reused
//! across repetitions and tournaments. Records are stored per ordered pair of
//! descriptors; the longest record seen serves every shorter request by
//! truncation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::action::{actions_to_str, str_to_actions, Interaction};
use crate::error::{ArenaError, Result};
use crate::player::PlayerSpec;

/// A cache handle shared between a tournament and its matches
pub type SharedCache = Arc<Mutex<DeterministicCache>>;

/// Lock a shared cache. A poisoned lock only means another match panicked
/// mid-update; every entry is written whole, so the data is still usable.
pub fn lock_cache(cache: &SharedCache) -> MutexGuard<'_, DeterministicCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Two players and a turn count
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub players: (PlayerSpec, PlayerSpec),
    pub turns: u32,
}

impl CacheKey {
    pub fn new(first: PlayerSpec, second: PlayerSpec, turns: u32) -> Self {
        Self {
            players: (first, second),
            turns,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DeterministicCache {
    entries: HashMap<(PlayerSpec, PlayerSpec), Vec<Interaction>>,
    mutable: bool,
}

impl Default for DeterministicCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DeterministicCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            mutable: true,
        }
    }

    /// A mutable cache filled from a file written by [`persist`](Self::persist)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut cache = Self::new();
        cache.restore(path)?;
        Ok(cache)
    }

    pub fn shared(self) -> SharedCache {
        Arc::new(Mutex::new(self))
    }

    pub fn mutable(&self) -> bool {
        self.mutable
    }

    pub fn set_mutable(&mut self, mutable: bool) {
        self.mutable = mutable;
    }

    /// A read-only copy, as handed to tournament workers
    pub fn read_only(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            mutable: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The first `key.turns` interactions, if at least that many are stored
    pub fn get(&self, key: &CacheKey) -> Option<Vec<Interaction>> {
        let stored = self.entries.get(&key.players)?;
        let turns = key.turns as usize;
        if stored.len() < turns {
            return None;
        }
        Some(stored[..turns].to_vec())
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .get(&key.players)
            .is_some_and(|stored| stored.len() >= key.turns as usize)
    }

    /// Store a record of exactly `key.turns` interactions for two
    /// deterministic players. A stored record at least as long is kept, so
    /// entries never shrink.
    pub fn set(&mut self, key: CacheKey, record: Vec<Interaction>) -> Result<()> {
        if !self.mutable {
            return Err(ArenaError::ImmutableCache);
        }
        let (first, second) = &key.players;
        if first.is_stochastic() || second.is_stochastic() {
            return Err(ArenaError::InvalidKey(format!(
                "{} vs {}",
                first.name(),
                second.name()
            )));
        }
        if record.len() != key.turns as usize {
            return Err(ArenaError::InvalidValue {
                expected: key.turns as usize,
                actual: record.len(),
            });
        }
        if self.contains(&key) {
            return Ok(());
        }
        self.entries.insert(key.players, record);
        Ok(())
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<Vec<Interaction>> {
        self.entries.remove(&key.players)
    }

    /// Write every entry to `path` as JSON.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let persisted = PersistedCache {
            entries: self
                .entries
                .iter()
                .map(|((first, second), record)| PersistedEntry {
                    players: (first.clone(), second.clone()),
                    actions: (
                        actions_to_str(record.iter().map(|(a, _)| a)),
                        actions_to_str(record.iter().map(|(_, b)| b)),
                    ),
                })
                .collect(),
        };
        serde_json::to_writer(&mut writer, &persisted)?;
        writer.flush()?;
        Ok(())
    }

    /// Replace the contents with those persisted at `path`.
    ///
    /// Only the top-level shape is checked; entries are trusted.
    pub fn restore(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let reader = BufReader::new(File::open(path)?);
        let value: serde_json::Value = serde_json::from_reader(reader)?;
        if !value.is_object() {
            return Err(ArenaError::CorruptCache { expected: "mapping" });
        }
        let persisted: PersistedCache = serde_json::from_value(value)?;

        let mut entries = HashMap::with_capacity(persisted.entries.len());
        for entry in persisted.entries {
            let first = str_to_actions(&entry.actions.0)?;
            let second = str_to_actions(&entry.actions.1)?;
            entries.insert(entry.players, first.into_iter().zip(second).collect());
        }
        self.entries = entries;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedCache {
    #[serde(default)]
    entries: Vec<PersistedEntry>,
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    players: (PlayerSpec, PlayerSpec),
    actions: (String, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{C, D};
    use crate::strategy::StrategyBase;
    use crate::transformer::Transformer;
    use proptest::prelude::*;

    fn key(turns: u32) -> CacheKey {
        CacheKey::new(
            StrategyBase::Cooperator.into(),
            StrategyBase::Defector.into(),
            turns,
        )
    }

    #[test]
    fn test_set_and_get() {
        let mut cache = DeterministicCache::new();
        cache.set(key(3), vec![(C, D); 3]).unwrap();
        assert_eq!(cache.get(&key(3)), Some(vec![(C, D); 3]));
        assert!(cache.contains(&key(3)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_longer_entry_serves_shorter_request() {
        let mut cache = DeterministicCache::new();
        cache.set(key(5), vec![(C, D); 5]).unwrap();
        assert_eq!(cache.get(&key(2)), Some(vec![(C, D); 2]));
        assert_eq!(cache.get(&key(6)), None);
        assert!(!cache.contains(&key(6)));
    }

    #[test]
    fn test_shorter_record_keeps_longer_entry() {
        let mut cache = DeterministicCache::new();
        cache.set(key(5), vec![(C, D); 5]).unwrap();
        cache.set(key(3), vec![(C, D); 3]).unwrap();
        assert!(cache.contains(&key(5)));
        assert_eq!(cache.get(&key(5)), Some(vec![(C, D); 5]));

        cache.set(key(7), vec![(C, D); 7]).unwrap();
        assert!(cache.contains(&key(7)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_order_of_players_matters() {
        let mut cache = DeterministicCache::new();
        cache.set(key(1), vec![(C, D)]).unwrap();
        let reversed = CacheKey::new(
            StrategyBase::Defector.into(),
            StrategyBase::Cooperator.into(),
            1,
        );
        assert_eq!(cache.get(&reversed), None);
    }

    #[test]
    fn test_immutable_cache_rejects_writes() {
        let mut cache = DeterministicCache::new();
        cache.set_mutable(false);
        assert!(matches!(
            cache.set(key(1), vec![(C, D)]),
            Err(ArenaError::ImmutableCache)
        ));
        let copy = DeterministicCache::new().read_only();
        assert!(!copy.mutable());
    }

    #[test]
    fn test_stochastic_key_rejected() {
        let mut cache = DeterministicCache::new();
        let noisy = PlayerSpec::from(StrategyBase::Cooperator)
            .transform(Transformer::noisy(0.5).unwrap());
        let bad = CacheKey::new(noisy, StrategyBase::Defector.into(), 1);
        assert!(matches!(
            cache.set(bad, vec![(C, D)]),
            Err(ArenaError::InvalidKey(_))
        ));
        let random = CacheKey::new(StrategyBase::Random.into(), StrategyBase::Defector.into(), 1);
        assert!(cache.set(random, vec![(C, D)]).is_err());
    }

    #[test]
    fn test_wrong_length_rejected() {
        let mut cache = DeterministicCache::new();
        assert!(matches!(
            cache.set(key(3), vec![(C, D); 2]),
            Err(ArenaError::InvalidValue {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_remove() {
        let mut cache = DeterministicCache::new();
        cache.set(key(2), vec![(C, D); 2]).unwrap();
        assert_eq!(cache.remove(&key(2)), Some(vec![(C, D); 2]));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_restore_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = DeterministicCache::new();
        assert!(matches!(
            cache.restore(dir.path().join("missing.json")),
            Err(ArenaError::Io(_))
        ));
    }

    #[test]
    fn test_restore_rejects_non_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        let mut cache = DeterministicCache::new();
        assert!(matches!(
            cache.restore(&path),
            Err(ArenaError::CorruptCache { expected: "mapping" })
        ));
    }

    #[test]
    fn test_persist_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = DeterministicCache::new();
        cache.set(key(2), vec![(C, D), (C, D)]).unwrap();
        cache.persist(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["entries"][0]["actions"][0], "CC");
        assert_eq!(value["entries"][0]["actions"][1], "DD");

        let loaded = DeterministicCache::load(&path).unwrap();
        assert!(loaded.mutable());
        assert_eq!(loaded.get(&key(2)), Some(vec![(C, D); 2]));
    }

    #[test]
    fn test_shared_handle() {
        let shared = DeterministicCache::new().shared();
        lock_cache(&shared).set(key(1), vec![(C, D)]).unwrap();
        assert_eq!(lock_cache(&shared).len(), 1);
    }

    const BASES: [StrategyBase; 6] = [
        StrategyBase::Cooperator,
        StrategyBase::Defector,
        StrategyBase::TitForTat,
        StrategyBase::Grudger,
        StrategyBase::Alternator,
        StrategyBase::Gradual,
    ];

    proptest! {
        #[test]
        fn prop_persist_restore_round_trip(
            entries in prop::collection::vec(
                (0usize..BASES.len(), 0usize..BASES.len(), prop::collection::vec(any::<(bool, bool)>(), 0..20)),
                0..8,
            )
        ) {
            let mut cache = DeterministicCache::new();
            for (a, b, moves) in &entries {
                let record: Vec<Interaction> = moves
                    .iter()
                    .map(|(x, y)| (if *x { C } else { D }, if *y { C } else { D }))
                    .collect();
                let key = CacheKey::new(BASES[*a].into(), BASES[*b].into(), record.len() as u32);
                cache.set(key, record).unwrap();
            }

            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("cache.json");
            cache.persist(&path).unwrap();
            let restored = DeterministicCache::load(&path).unwrap();

            prop_assert_eq!(restored.len(), cache.len());
            for (players, record) in &cache.entries {
                let key = CacheKey::new(players.0.clone(), players.1.clone(), record.len() as u32);
                prop_assert_eq!(restored.get(&key), Some(record.clone()));
            }
        }
    }
}
