//! # nfsim-connector - Host-side bridge to a stochastic network-free simulator
//!
//! The connector sits between a host application and a simulation engine. It
//! accumulates initial species counts, memoizes the observables an engine
//! reports after initialization, buffers observable time series and reaction
//! tallies into gdat files, and turns nested engine query results into flat
//! owned structures.
//!
//! ## Core Concepts
//!
//! - **Seed map**: species label to initial molecule count
//! - **Snapshot**: every observable value at one instant
//! - **Session**: all connector state for one run, around one engine
//! - **Marshaled result**: flat parallel arrays with an explicit release
//!
//! ## Usage
//!
//! ```rust
//! use nfsim_connector::{EchoEngine, Session, SessionConfig};
//!
//! # fn main() -> Result<(), nfsim_connector::ConnectorError> {
//! let dir = std::env::temp_dir();
//! let config = SessionConfig::new("models/tlbr.xml", 1).with_output_dir(&dir);
//! let mut session = Session::new(EchoEngine::new(), config)?;
//!
//! session.add_seed("A()", 5)?;
//! session.add_seed("B()", 3)?;
//! session.log_observables(0.0)?;
//!
//! let observables = session.cached_observables()?;
//! assert_eq!(observables.get("Atotal"), Some(5.0));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod engine;
pub mod error;
pub mod observable;
pub mod seed;

// Run state and output
pub mod cache;
pub mod config;
pub mod reactions;
pub mod session;
pub mod sink;

// Query results
pub mod marshal;

#[cfg(feature = "ffi")]
pub mod ffi;

// Re-export primary types at crate root for convenience
pub use cache::{CacheStats, InitializationCache};
pub use config::SessionConfig;
pub use engine::{CompartmentRecord, EchoEngine, ReactantGroups, RecordMap, SimulationEngine};
pub use error::{ConnectorError, ConnectorResult, EngineError, ValidationError};
pub use marshal::{CompartmentInfo, ObservableQueryResult, ReactantQueryResult, ReactionList, ReleaseReport};
pub use observable::{ObservableBuffer, ObservableSample, ObservableSnapshot};
pub use reactions::ReactionCounter;
pub use seed::{SeedLedger, SeedMap};
pub use session::{QueryOptions, Session, SessionId};
pub use sink::{FileSink, FlushReport, OutputFiles};
