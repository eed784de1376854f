//! The session context that owns all connector state for one run.
//!
//! A [`Session`] bundles the engine with the seed ledger, the initialization
//! cache, the observable buffer, the reaction tally and the file sink.
//! Independent sessions share nothing.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{CacheStats, InitializationCache};
use crate::config::SessionConfig;
use crate::engine::{RecordMap, SimulationEngine};
use crate::error::{ConnectorResult, EngineError};
use crate::marshal::{self, CompartmentInfo, ObservableQueryResult, ReactantQueryResult};
use crate::observable::{AppendOutcome, ObservableBuffer, ObservableSnapshot};
use crate::reactions::ReactionCounter;
use crate::seed::{self, SeedLedger, SeedMap};
use crate::sink::{FileSink, FlushReport, OutputFiles};

/// Option key naming the reaction to step in
/// [`Session::init_and_query_system_status`].
pub const REACTION_OPTION: &str = "reaction";

/// Option key naming the status query in
/// [`Session::init_and_query_system_status`].
pub const QUERY_OPTION: &str = "query";

/// Status query used when no `query` option is given.
pub const DEFAULT_STATUS_QUERY: &str = "complex";

/// Unique identifier for a session, carried in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inputs to the combined initialize-and-query operations.
///
/// Initial counts for a repeated label are summed.
///
/// ```
/// use nfsim_connector::QueryOptions;
///
/// let options = QueryOptions::new()
///     .with_init("A()", 2)
///     .with_init("A()", 3)
///     .with_option("reaction", "bind");
/// assert_eq!(options.init().get("A()"), 5);
/// assert_eq!(options.get("reaction"), Some("bind"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    init: SeedMap,
    options: BTreeMap<String, String>,
}

impl QueryOptions {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `count` molecules of `label` to the initial composition.
    #[must_use]
    pub fn with_init(mut self, label: impl Into<String>, count: u64) -> Self {
        let label = label.into();
        let total = self.init.get(&label).saturating_add(count);
        self.init.insert(label, total);
        self
    }

    /// Sets a key/value option; a repeated key keeps the last value.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Initial composition.
    #[must_use]
    pub const fn init(&self) -> &SeedMap {
        &self.init
    }

    /// Value of option `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

/// Connector state for one simulation run.
#[derive(Debug)]
pub struct Session<E: SimulationEngine> {
    id: SessionId,
    config: SessionConfig,
    engine: E,
    ledger: SeedLedger,
    cache: InitializationCache,
    buffer: ObservableBuffer,
    counter: ReactionCounter,
    sink: FileSink,
}

impl<E: SimulationEngine> Session<E> {
    /// Creates a session around `engine`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` if `config` fails validation.
    pub fn new(engine: E, config: SessionConfig) -> ConnectorResult<Self> {
        let config = config.validate()?;
        let files = OutputFiles::new(&config.output_dir, &config.model_source, config.seed);
        let id = SessionId::new();
        info!(
            session = %id,
            observables = %files.observables.display(),
            reactions = %files.reactions.display(),
            "session created"
        );
        Ok(Self {
            id,
            engine,
            ledger: SeedLedger::new(),
            cache: InitializationCache::with_capacity_limit(config.cache_capacity),
            buffer: ObservableBuffer::with_threshold(config.flush_threshold),
            counter: ReactionCounter::new(),
            sink: FileSink::new(files),
            config,
        })
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Validated configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The engine.
    #[must_use]
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Mutable access to the engine.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Consumes the session and returns its engine. Buffered samples are dropped.
    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Run output paths.
    #[must_use]
    pub const fn output_files(&self) -> &OutputFiles {
        self.sink.files()
    }

    /// Accumulated seeds.
    #[must_use]
    pub const fn ledger(&self) -> &SeedLedger {
        &self.ledger
    }

    /// Buffered observable samples.
    #[must_use]
    pub const fn buffer(&self) -> &ObservableBuffer {
        &self.buffer
    }

    /// Reaction tally.
    #[must_use]
    pub const fn reactions(&self) -> &ReactionCounter {
        &self.counter
    }

    /// Initialization cache counters.
    #[must_use]
    pub const fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ---------------------------------------------------------------------
    // Seeding
    // ---------------------------------------------------------------------

    /// Adds `delta` molecules of `label` to the ledger and returns the new count.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyLabel` for an empty label.
    pub fn add_seed(&mut self, label: &str, delta: i64) -> ConnectorResult<u64> {
        Ok(self.ledger.add_seed(label, delta)?)
    }

    /// Initializes the engine from the accumulated ledger.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InitFailure` if the engine rejects the composition.
    pub fn materialize(&mut self) -> ConnectorResult<()> {
        self.ledger.materialize(&mut self.engine)
    }

    /// Initializes the engine from `seeds` without touching the ledger.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InitFailure` if the engine rejects the composition.
    pub fn initialize_from_composition(&mut self, seeds: &SeedMap) -> ConnectorResult<()> {
        seed::initialize(&mut self.engine, seeds)
    }

    /// Initializes the engine from an XML seed description.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InitFailure` if the engine rejects the document.
    pub fn initialize_from_xml(&mut self, xml: &str) -> ConnectorResult<()> {
        if self.engine.initialize_from_xml(xml) {
            Ok(())
        } else {
            Err(EngineError::InitFailure {
                reason: format!("XML seed description of {} bytes rejected", xml.len()),
            }
            .into())
        }
    }

    /// Resets the engine, then clears the ledger and the buffered samples.
    ///
    /// The cache and the reaction tally survive. Once the observable file has a
    /// header its columns stay fixed for the session. On failure nothing is
    /// cleared.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ResetFailure` if the engine refuses.
    pub fn reset_system(&mut self) -> ConnectorResult<()> {
        if !self.engine.reset() {
            return Err(EngineError::ResetFailure.into());
        }
        self.ledger.clear();
        self.buffer.clear();
        if let Some(columns) = self.sink.columns_for(&self.sink.files().observables) {
            self.buffer.pin_columns(columns.to_vec());
        }
        debug!(session = %self.id, "system reset");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Observable logging
    // ---------------------------------------------------------------------

    /// Records the observables for the current ledger at `time`.
    ///
    /// The snapshot comes from the initialization cache. When the buffer
    /// reaches its threshold it is appended to the observable file and
    /// emptied; the report of that flush is returned.
    ///
    /// # Errors
    ///
    /// Returns an engine error on a cache miss the engine refuses, a
    /// validation error if the observable names changed mid-run, or a file
    /// error from the automatic flush.
    pub fn log_observables(&mut self, time: f64) -> ConnectorResult<Option<FlushReport>> {
        let snapshot = self
            .cache
            .get_or_compute(self.ledger.seeds(), &mut self.engine)?;
        match self.buffer.append(time, snapshot)? {
            AppendOutcome::Buffered => Ok(None),
            AppendOutcome::ThresholdReached => {
                let path = self.sink.files().observables.clone();
                self.flush_observables_to(&path)
            }
        }
    }

    /// Counts one firing of `reaction`.
    pub fn record_reaction_fire(&mut self, reaction: &str) -> u64 {
        self.counter.record_fire(reaction)
    }

    /// Clears the reaction tally.
    pub fn reset_counters(&mut self) {
        self.counter.reset();
    }

    /// Drops every cached initialization.
    pub fn reset_cache(&mut self) {
        self.cache.clear();
    }

    /// Appends buffered observables to the run's observable file and rewrites
    /// the reaction file.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::FileIo` on any file failure.
    pub fn flush(&mut self) -> ConnectorResult<Option<FlushReport>> {
        let files = self.sink.files().clone();
        let report = self.flush_observables_to(&files.observables)?;
        self.flush_reactions_to(&files.reactions)?;
        Ok(report)
    }

    /// Appends buffered observables to `path` and empties the buffer.
    ///
    /// An empty buffer writes nothing. On failure the samples stay buffered.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::FileIo` on any file failure.
    pub fn flush_observables_to(&mut self, path: &Path) -> ConnectorResult<Option<FlushReport>> {
        let columns = self.buffer.columns().unwrap_or_default();
        let report = self
            .sink
            .append_observables(path, columns, self.buffer.samples())?;
        self.buffer.take();
        Ok(report)
    }

    /// Rewrites `path` with the reaction tally.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::FileIo` if the file cannot be written.
    pub fn flush_reactions_to(&self, path: &Path) -> ConnectorResult<()> {
        self.counter.flush_reactions(path)
    }

    // ---------------------------------------------------------------------
    // Stepping
    // ---------------------------------------------------------------------

    /// Advances the engine by one event.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StepFailure` if the engine cannot advance.
    pub fn step(&mut self) -> ConnectorResult<()> {
        if self.engine.step() {
            Ok(())
        } else {
            Err(EngineError::StepFailure { reaction: None }.into())
        }
    }

    /// Fires `reaction` once.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StepFailure` if the reaction cannot fire.
    pub fn step_reaction(&mut self, reaction: &str) -> ConnectorResult<()> {
        if self.engine.step_reaction(reaction) {
            Ok(())
        } else {
            Err(EngineError::StepFailure {
                reaction: Some(reaction.to_string()),
            }
            .into())
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Reactions with `reactants` reactants that can fire now, grouped by
    /// reactant species.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the engine reports a malformed record.
    pub fn query_by_reactant_count(&mut self, reactants: usize) -> ConnectorResult<ReactantQueryResult> {
        let groups = self.engine.query_by_reactant_count(reactants);
        Ok(marshal::marshal_reactant_groups(&groups)?)
    }

    /// Resets the engine, seeds it with `options.init()` and runs
    /// [`query_by_reactant_count`](Self::query_by_reactant_count).
    ///
    /// # Errors
    ///
    /// Returns an engine error if reset or initialization is refused, or a
    /// validation error for malformed records.
    pub fn init_and_query_by_reactant_count(
        &mut self,
        options: &QueryOptions,
        reactants: usize,
    ) -> ConnectorResult<ReactantQueryResult> {
        self.reinitialize(options.init())?;
        self.query_by_reactant_count(reactants)
    }

    /// Resets the engine, seeds it, steps once and queries system status.
    ///
    /// A `reaction` option is registered in the tally at zero and stepped
    /// specifically; otherwise any reaction may fire. The `query` option
    /// selects the status query and defaults to `complex`.
    ///
    /// # Errors
    ///
    /// Returns an engine error if reset, initialization or the step fails.
    pub fn init_and_query_system_status(&mut self, options: &QueryOptions) -> ConnectorResult<Vec<RecordMap>> {
        let reaction = options.get(REACTION_OPTION);
        if let Some(name) = reaction {
            self.counter.register(name);
        }

        self.reinitialize(options.init())?;
        match reaction {
            Some(name) => self.step_reaction(name)?,
            None => self.step()?,
        }

        let query = options.get(QUERY_OPTION).unwrap_or(DEFAULT_STATUS_QUERY);
        Ok(self.engine.query_system_status(query))
    }

    /// Current observables as parallel arrays, straight from the engine.
    pub fn query_observables(&mut self) -> ObservableQueryResult {
        marshal::marshal_observables(&self.engine.query_observables())
    }

    /// Observables the cache holds for the current ledger, computing them on a miss.
    ///
    /// # Errors
    ///
    /// Returns an engine error if a miss cannot be computed.
    pub fn cached_observables(&mut self) -> ConnectorResult<Arc<ObservableSnapshot>> {
        self.cache.get_or_compute(self.ledger.seeds(), &mut self.engine)
    }

    /// Describes compartment `name`.
    ///
    /// The empty name is the unnamed top-level compartment and is answered
    /// without asking the engine.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::UnknownCompartment` if the engine has no such
    /// compartment.
    pub fn compartment_info(&self, name: &str) -> ConnectorResult<CompartmentInfo> {
        if name.is_empty() {
            return Ok(CompartmentInfo::unnamed());
        }
        self.engine
            .query_compartment(name)
            .map(marshal::marshal_compartment)
            .ok_or_else(|| {
                EngineError::UnknownCompartment {
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Compartment named in a species label, or an empty string.
    #[must_use]
    pub fn extract_compartment(&self, label: &str) -> String {
        self.engine.extract_compartment_from_label(label)
    }

    fn reinitialize(&mut self, seeds: &SeedMap) -> ConnectorResult<()> {
        if !self.engine.reset() {
            return Err(EngineError::ResetFailure.into());
        }
        seed::initialize(&mut self.engine, seeds)
    }
}
