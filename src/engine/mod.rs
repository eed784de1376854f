//! Simulation engine contract.
//!
//! The engine is an external collaborator: this crate only issues reset,
//! initialize, step and query calls through [`SimulationEngine`]. Engines report
//! failure with plain `bool`s and never panic across this seam; the connector
//! turns those signals into typed errors.
//!
//! [`EchoEngine`] is a deterministic reference implementation whose observables
//! echo the seeded totals. It backs the tests and benches and is useful for
//! driving the connector without a real simulator.

mod echo;

pub use echo::{EchoEngine, EngineCalls};

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::observable::ObservableSnapshot;
use crate::seed::SeedMap;

/// A single string-keyed record returned by an engine query
/// (for example `{"name": "bind", "rate": "0.5"}`).
pub type RecordMap = BTreeMap<String, String>;

/// Engine result of a by-reactant-count query: species label to the
/// reaction records it participates in.
pub type ReactantGroups = BTreeMap<String, Vec<RecordMap>>;

/// Compartment description as held inside the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompartmentRecord {
    /// Compartment name.
    pub name: String,
    /// Number of spatial dimensions (2 for surfaces, 3 for volumes).
    pub spatial_dimensions: i32,
    /// Compartment size (volume or area).
    pub size: f64,
    /// Name of the enclosing compartment, empty at the top level.
    pub outside: String,
}

fn compartment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*)").expect("static pattern"))
}

/// Compartment named by the last `@Name` in a BNGL species label, or `""`.
///
/// ```
/// use nfsim_connector::engine::label_compartment;
///
/// assert_eq!(label_compartment("@PM::A(b!1).B(a!1)@CP"), "CP");
/// assert_eq!(label_compartment("A(b)"), "");
/// ```
#[must_use]
pub fn label_compartment(label: &str) -> &str {
    compartment_re()
        .captures_iter(label)
        .last()
        .and_then(|cap| cap.get(1))
        .map_or("", |m| m.as_str())
}

/// Operations the connector consumes from a stochastic simulation engine.
pub trait SimulationEngine {
    /// Restore the loaded model to its state before molecule seeding.
    fn reset(&mut self) -> bool;

    /// Seed the system with the given per-species counts.
    fn initialize_from_composition(&mut self, seeds: &SeedMap) -> bool;

    /// Seed the system from an XML species description.
    ///
    /// Engines without XML support reject every document.
    fn initialize_from_xml(&mut self, _xml: &str) -> bool {
        false
    }

    /// Evaluate every observable against the current population.
    fn query_observables(&mut self) -> ObservableSnapshot;

    /// Species taking part in a fireable reaction with `reactants` reactants.
    fn query_by_reactant_count(&mut self, reactants: usize) -> ReactantGroups;

    /// Free-form status query (for example `"complex"`).
    fn query_system_status(&mut self, _option: &str) -> Vec<RecordMap> {
        Vec::new()
    }

    /// Perform one simulation step.
    fn step(&mut self) -> bool;

    /// Perform exactly one step by firing the named reaction.
    fn step_reaction(&mut self, reaction: &str) -> bool;

    /// Look up a compartment by name.
    fn query_compartment(&self, name: &str) -> Option<&CompartmentRecord>;

    /// Extract the compartment name embedded in a species label.
    fn extract_compartment_from_label(&self, label: &str) -> String;
}
