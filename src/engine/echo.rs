//! Deterministic reference engine.
//!
//! Observables are named `<Molecule>total` and equal the summed seed counts of
//! every label whose molecule name is `<Molecule>`: seeding `{"A()": 5,
//! "A(b!1).B(a!1)": 2}` yields `Atotal = 7` and `Btotal = 2`. Reactions are a
//! static table; a reaction can fire when all of its reactants are seeded.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use super::{label_compartment, CompartmentRecord, ReactantGroups, RecordMap, SimulationEngine};
use crate::observable::ObservableSnapshot;
use crate::seed::SeedMap;

fn molecule_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|[.:])([A-Za-z_][A-Za-z0-9_]*)\(").expect("static pattern"))
}

/// Call counters recorded by [`EchoEngine`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineCalls {
    /// `reset` calls.
    pub resets: usize,
    /// `initialize_from_composition` and `initialize_from_xml` calls.
    pub initializations: usize,
    /// `query_observables` calls.
    pub observable_queries: usize,
    /// `step` and `step_reaction` calls.
    pub steps: usize,
}

#[derive(Debug, Clone)]
struct EchoReaction {
    rate: f64,
    reactants: Vec<String>,
}

/// Reference engine whose observables echo seeded molecule totals.
#[derive(Debug, Clone, Default)]
pub struct EchoEngine {
    population: SeedMap,
    reactions: BTreeMap<String, EchoReaction>,
    compartments: BTreeMap<String, CompartmentRecord>,
    calls: EngineCalls,
    reject_init: bool,
    reject_reset: bool,
}

impl EchoEngine {
    /// Creates an engine with no reactions or compartments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reaction with the given rate and reactant labels.
    #[must_use]
    pub fn with_reaction(mut self, name: impl Into<String>, rate: f64, reactants: &[&str]) -> Self {
        self.reactions.insert(
            name.into(),
            EchoReaction {
                rate,
                reactants: reactants.iter().map(|r| (*r).to_string()).collect(),
            },
        );
        self
    }

    /// Adds a compartment definition.
    #[must_use]
    pub fn with_compartment(mut self, compartment: CompartmentRecord) -> Self {
        self.compartments.insert(compartment.name.clone(), compartment);
        self
    }

    /// Makes every subsequent initialization fail (or succeed again).
    pub fn set_reject_initialization(&mut self, reject: bool) {
        self.reject_init = reject;
    }

    /// Makes every subsequent reset fail (or succeed again).
    pub fn set_reject_reset(&mut self, reject: bool) {
        self.reject_reset = reject;
    }

    /// Calls received so far.
    #[must_use]
    pub const fn calls(&self) -> EngineCalls {
        self.calls
    }

    /// Current seeded population.
    #[must_use]
    pub const fn population(&self) -> &SeedMap {
        &self.population
    }

    fn can_fire(&self, reaction: &EchoReaction) -> bool {
        reaction
            .reactants
            .iter()
            .all(|label| self.population.get(label) > 0)
    }
}

impl SimulationEngine for EchoEngine {
    fn reset(&mut self) -> bool {
        self.calls.resets += 1;
        if self.reject_reset {
            return false;
        }
        self.population = SeedMap::new();
        true
    }

    fn initialize_from_composition(&mut self, seeds: &SeedMap) -> bool {
        self.calls.initializations += 1;
        if self.reject_init {
            return false;
        }
        for (label, count) in seeds.iter() {
            self.population
                .insert(label, self.population.get(label).saturating_add(count));
        }
        true
    }

    fn initialize_from_xml(&mut self, xml: &str) -> bool {
        self.calls.initializations += 1;
        !self.reject_init && xml.trim_start().starts_with('<')
    }

    #[allow(clippy::cast_precision_loss)]
    fn query_observables(&mut self) -> ObservableSnapshot {
        self.calls.observable_queries += 1;
        let mut totals: BTreeMap<String, u64> = BTreeMap::new();
        for (label, count) in self.population.iter() {
            for cap in molecule_re().captures_iter(label) {
                if let Some(name) = cap.get(1) {
                    let total = totals.entry(format!("{}total", name.as_str())).or_default();
                    *total = total.saturating_add(count);
                }
            }
        }
        totals
            .into_iter()
            .map(|(name, total)| (name, total as f64))
            .collect()
    }

    fn query_by_reactant_count(&mut self, reactants: usize) -> ReactantGroups {
        let mut groups = ReactantGroups::new();
        for (name, reaction) in &self.reactions {
            if reaction.reactants.len() != reactants || !self.can_fire(reaction) {
                continue;
            }
            for label in &reaction.reactants {
                let mut record = RecordMap::new();
                record.insert("name".to_string(), name.clone());
                record.insert("rate".to_string(), reaction.rate.to_string());
                groups.entry(label.clone()).or_default().push(record);
            }
        }
        groups
    }

    fn query_system_status(&mut self, option: &str) -> Vec<RecordMap> {
        if option != "complex" {
            return Vec::new();
        }
        self.population
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|(label, count)| {
                let mut record = RecordMap::new();
                record.insert("label".to_string(), label.to_string());
                record.insert("number".to_string(), count.to_string());
                record.insert(
                    "compartment".to_string(),
                    self.extract_compartment_from_label(label),
                );
                record
            })
            .collect()
    }

    fn step(&mut self) -> bool {
        self.calls.steps += 1;
        self.reactions.values().any(|r| self.can_fire(r))
    }

    fn step_reaction(&mut self, reaction: &str) -> bool {
        self.calls.steps += 1;
        self.reactions
            .get(reaction)
            .is_some_and(|r| self.can_fire(r))
    }

    fn query_compartment(&self, name: &str) -> Option<&CompartmentRecord> {
        self.compartments.get(name)
    }

    fn extract_compartment_from_label(&self, label: &str) -> String {
        label_compartment(label).to_string()
    }
}
