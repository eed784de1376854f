//! Memoized engine initialization.
//!
//! The cache maps a complete [`SeedMap`] to the observables the engine reports
//! right after being reset and seeded with it. The cache is only valid if those
//! observables are a pure function of the composition: no hidden engine state
//! may influence them once the engine has been reset.
//!
//! Entries are never evicted. An optional capacity stops new compositions from
//! being stored once reached; they are still computed and returned.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::engine::SimulationEngine;
use crate::error::{ConnectorResult, EngineError};
use crate::observable::ObservableSnapshot;
use crate::seed::{self, SeedMap};

/// Lookup counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that drove the engine.
    pub misses: u64,
    /// Misses that could not be stored because the cache was full.
    pub uncached: u64,
}

/// Composition → observable snapshot memo.
#[derive(Debug, Clone, Default)]
pub struct InitializationCache {
    entries: HashMap<SeedMap, Arc<ObservableSnapshot>>,
    capacity: Option<usize>,
    stats: CacheStats,
    capacity_warned: bool,
}

impl InitializationCache {
    /// Creates an unbounded cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache that stores at most `capacity` compositions.
    #[must_use]
    pub fn with_capacity_limit(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Stored snapshot for `seeds`, without touching the engine.
    #[must_use]
    pub fn get(&self, seeds: &SeedMap) -> Option<Arc<ObservableSnapshot>> {
        self.entries.get(seeds).cloned()
    }

    /// Returns the snapshot for `seeds`, driving the engine on a miss.
    ///
    /// A miss resets the engine, seeds it with `seeds`, queries observables and
    /// stores the result.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ResetFailure` or `EngineError::InitFailure` if the
    /// engine refuses; nothing is stored in that case.
    pub fn get_or_compute<E: SimulationEngine + ?Sized>(
        &mut self,
        seeds: &SeedMap,
        engine: &mut E,
    ) -> ConnectorResult<Arc<ObservableSnapshot>> {
        if let Some(snapshot) = self.entries.get(seeds) {
            self.stats.hits += 1;
            debug!(composition = %seeds.fingerprint().short(), "initialization cache hit");
            return Ok(Arc::clone(snapshot));
        }

        self.stats.misses += 1;
        debug!(
            composition = %seeds.fingerprint().short(),
            species = seeds.len(),
            "initialization cache miss"
        );

        if !engine.reset() {
            return Err(EngineError::ResetFailure.into());
        }
        seed::initialize(engine, seeds)?;
        let snapshot = Arc::new(engine.query_observables());

        if self.capacity.is_some_and(|cap| self.entries.len() >= cap) {
            self.stats.uncached += 1;
            if !self.capacity_warned {
                self.capacity_warned = true;
                warn!(
                    capacity = self.entries.len(),
                    "initialization cache full; new compositions will not be stored"
                );
            }
        } else {
            self.entries.insert(seeds.clone(), Arc::clone(&snapshot));
        }
        Ok(snapshot)
    }

    /// Number of stored compositions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookup counters since creation or the last [`clear`](Self::clear).
    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Drops every entry and resets the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = CacheStats::default();
        self.capacity_warned = false;
    }
}
