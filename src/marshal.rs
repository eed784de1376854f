//! Flat, owned result structures built from engine queries.
//!
//! Builders copy every string and number out of the engine's nested maps; a
//! result never borrows engine memory. A build either returns a complete
//! result or an error, and any partial allocations are dropped before the error
//! propagates. Each result has one `release` that consumes it and reports what
//! it freed.

use serde::Serialize;

use crate::engine::{CompartmentRecord, ReactantGroups};
use crate::error::ValidationError;
use crate::observable::ObservableSnapshot;

/// Spatial dimensions reported for the unnamed (top-level) compartment.
pub const DEFAULT_SPATIAL_DIMENSIONS: i32 = 3;

/// What a `release` call freed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseReport {
    /// Owned strings freed.
    pub strings: usize,
    /// Non-empty backing arrays freed.
    pub arrays: usize,
}

fn allocated<T>(v: &Vec<T>) -> usize {
    usize::from(v.capacity() > 0)
}

/// Reactions associated with one reactant key, as parallel arrays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactionList {
    /// Reaction names.
    pub names: Vec<String>,
    /// Rates, index-aligned with `names`.
    pub rates: Vec<f64>,
}

impl ReactionList {
    /// Number of reactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `(name, rate)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names.iter().map(String::as_str).zip(self.rates.iter().copied())
    }
}

/// Result of a by-reactant-count query.
///
/// `keys[i]` has `reaction_counts[i]` reactions, listed in `reactions[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReactantQueryResult {
    /// Reactant species labels, in label order.
    pub keys: Vec<String>,
    /// Per-key reaction counts.
    pub reaction_counts: Vec<usize>,
    /// Per-key reactions.
    pub reactions: Vec<ReactionList>,
}

impl ReactantQueryResult {
    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no species matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Reactions for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ReactionList> {
        let idx = self.keys.iter().position(|k| k == key)?;
        self.reactions.get(idx)
    }

    /// Frees the result and every per-key array it owns.
    pub fn release(self) -> ReleaseReport {
        let mut report = ReleaseReport {
            strings: self.keys.len(),
            arrays: allocated(&self.keys) + allocated(&self.reaction_counts) + allocated(&self.reactions),
        };
        for list in &self.reactions {
            report.strings += list.names.len();
            report.arrays += allocated(&list.names) + allocated(&list.rates);
        }
        drop(self);
        report
    }
}

/// Result of an observable query, as parallel arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObservableQueryResult {
    /// Observable names, in name order.
    pub names: Vec<String>,
    /// Values, index-aligned with `names`.
    pub values: Vec<f64>,
}

impl ObservableQueryResult {
    /// Number of observables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no observables were reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Frees the result.
    pub fn release(self) -> ReleaseReport {
        let report = ReleaseReport {
            strings: self.names.len(),
            arrays: allocated(&self.names) + allocated(&self.values),
        };
        drop(self);
        report
    }
}

/// Owned compartment description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompartmentInfo {
    /// Compartment name.
    pub name: String,
    /// Number of spatial dimensions.
    pub spatial_dimensions: i32,
    /// Compartment size.
    pub size: f64,
    /// Enclosing compartment, empty at the top level.
    pub outside: String,
}

impl CompartmentInfo {
    /// Description of the unnamed top-level compartment.
    #[must_use]
    pub const fn unnamed() -> Self {
        Self {
            name: String::new(),
            spatial_dimensions: DEFAULT_SPATIAL_DIMENSIONS,
            size: 0.0,
            outside: String::new(),
        }
    }

    /// Frees the result.
    pub fn release(self) -> ReleaseReport {
        let report = ReleaseReport {
            strings: 2,
            arrays: 0,
        };
        drop(self);
        report
    }
}

/// Flattens grouped reactant records into parallel arrays.
///
/// Every record must carry a `name` and a numeric `rate`.
///
/// # Errors
///
/// Returns `ValidationError::MissingRecordField` or
/// `ValidationError::InvalidRate` for the first malformed record.
pub fn marshal_reactant_groups(groups: &ReactantGroups) -> Result<ReactantQueryResult, ValidationError> {
    let mut result = ReactantQueryResult {
        keys: Vec::with_capacity(groups.len()),
        reaction_counts: Vec::with_capacity(groups.len()),
        reactions: Vec::with_capacity(groups.len()),
    };

    for (key, records) in groups {
        let mut list = ReactionList {
            names: Vec::with_capacity(records.len()),
            rates: Vec::with_capacity(records.len()),
        };
        for (index, record) in records.iter().enumerate() {
            let name = record.get("name").ok_or_else(|| ValidationError::MissingRecordField {
                key: key.clone(),
                index,
                field: "name",
            })?;
            let raw = record.get("rate").ok_or_else(|| ValidationError::MissingRecordField {
                key: key.clone(),
                index,
                field: "rate",
            })?;
            let rate: f64 = raw.trim().parse().map_err(|_| ValidationError::InvalidRate {
                key: key.clone(),
                index,
                raw: raw.clone(),
            })?;
            list.names.push(name.clone());
            list.rates.push(rate);
        }
        result.keys.push(key.clone());
        result.reaction_counts.push(list.len());
        result.reactions.push(list);
    }

    Ok(result)
}

/// Copies a snapshot into name/value arrays.
#[must_use]
pub fn marshal_observables(snapshot: &ObservableSnapshot) -> ObservableQueryResult {
    let mut result = ObservableQueryResult {
        names: Vec::with_capacity(snapshot.len()),
        values: Vec::with_capacity(snapshot.len()),
    };
    for (name, value) in snapshot.iter() {
        result.names.push(name.to_string());
        result.values.push(value);
    }
    result
}

/// Copies an engine compartment into an owned description.
#[must_use]
pub fn marshal_compartment(record: &CompartmentRecord) -> CompartmentInfo {
    CompartmentInfo {
        name: record.name.clone(),
        spatial_dimensions: record.spatial_dimensions,
        size: record.size,
        outside: record.outside.clone(),
    }
}
