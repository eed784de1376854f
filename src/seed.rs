//! Seed compositions and the incremental seed ledger.
//!
//! A [`SeedMap`] is the per-species molecule count used to initialize the
//! engine. It is backed by an ordered map, so iteration is always in label
//! order and two maps with the same pairs are equal and hash identically no
//! matter how they were built.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::SimulationEngine;
use crate::error::{ConnectorResult, EngineError, ValidationError};

/// Stable digest of a composition's canonical encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompositionFingerprint(blake3::Hash);

impl CompositionFingerprint {
    /// First 16 hex characters, enough to tell compositions apart in logs.
    #[must_use]
    pub fn short(&self) -> String {
        let hex = self.0.to_hex();
        hex.as_str()[..16].to_string()
    }
}

impl fmt::Display for CompositionFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

/// Mapping from species label to a nonnegative molecule count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeedMap(BTreeMap<String, u64>);

impl SeedMap {
    /// Creates an empty composition.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Count for `label`, zero when absent.
    #[must_use]
    pub fn get(&self, label: &str) -> u64 {
        self.0.get(label).copied().unwrap_or(0)
    }

    /// Sets the count for `label`, returning the previous count if any.
    pub fn insert(&mut self, label: impl Into<String>, count: u64) -> Option<u64> {
        self.0.insert(label.into(), count)
    }

    /// Whether `label` has an entry (possibly zero).
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.0.contains_key(label)
    }

    /// Iterates `(label, count)` pairs in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.0.iter().map(|(label, count)| (label.as_str(), *count))
    }

    /// Number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the composition has no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Digest of the canonical (label-ordered) encoding.
    #[must_use]
    pub fn fingerprint(&self) -> CompositionFingerprint {
        let mut hasher = blake3::Hasher::new();
        for (label, count) in &self.0 {
            hasher.update(&(label.len() as u64).to_le_bytes());
            hasher.update(label.as_bytes());
            hasher.update(&count.to_le_bytes());
        }
        CompositionFingerprint(hasher.finalize())
    }
}

impl FromIterator<(String, u64)> for SeedMap {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, u64)> for SeedMap {
    fn from_iter<I: IntoIterator<Item = (&'a str, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(l, c)| (l.to_string(), c)).collect())
    }
}

/// Incrementally built seed composition.
///
/// Every update clamps the running count at zero, so a large negative delta
/// empties a species instead of being rejected.
#[derive(Debug, Clone, Default)]
pub struct SeedLedger {
    seeds: SeedMap,
}

impl SeedLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            seeds: SeedMap::new(),
        }
    }

    /// Adds `delta` to the running count for `label` and returns the new count.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyLabel` for an empty label.
    pub fn add_seed(&mut self, label: &str, delta: i64) -> Result<u64, ValidationError> {
        if label.is_empty() {
            return Err(ValidationError::EmptyLabel);
        }
        let current = i128::from(self.seeds.get(label));
        let clamped = (current + i128::from(delta)).clamp(0, i128::from(u64::MAX));
        let count = u64::try_from(clamped).unwrap_or(u64::MAX);
        self.seeds.insert(label, count);
        Ok(count)
    }

    /// Current count for `label`.
    #[must_use]
    pub fn count(&self, label: &str) -> u64 {
        self.seeds.get(label)
    }

    /// Borrow the accumulated composition.
    #[must_use]
    pub const fn seeds(&self) -> &SeedMap {
        &self.seeds
    }

    /// Copy of the accumulated composition.
    #[must_use]
    pub fn snapshot(&self) -> SeedMap {
        self.seeds.clone()
    }

    /// Forget every label.
    pub fn clear(&mut self) {
        self.seeds = SeedMap::new();
    }

    /// Submit the accumulated composition to the engine.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InitFailure` if the engine rejects the composition.
    pub fn materialize<E: SimulationEngine + ?Sized>(&self, engine: &mut E) -> ConnectorResult<()> {
        initialize(engine, &self.seeds)
    }
}

/// Seed `engine` with `seeds`, mapping a refusal to `EngineError::InitFailure`.
pub(crate) fn initialize<E: SimulationEngine + ?Sized>(
    engine: &mut E,
    seeds: &SeedMap,
) -> ConnectorResult<()> {
    if engine.initialize_from_composition(seeds) {
        Ok(())
    } else {
        Err(EngineError::InitFailure {
            reason: format!(
                "composition of {} species ({}) rejected",
                seeds.len(),
                seeds.fingerprint().short()
            ),
        }
        .into())
    }
}
