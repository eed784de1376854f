//! Observable snapshots and the bounded sample buffer.
//!
//! Samples accumulate in insertion order until the buffer reaches its flush
//! threshold. The first sample fixes the observable names for the run; later
//! samples with a different name set are rejected instead of producing
//! misaligned rows.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default number of buffered samples that triggers a flush.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 10_000;

/// Observable values at one simulated instant, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservableSnapshot(BTreeMap<String, f64>);

impl ObservableSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Value of `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Sets `name` to `value`.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.0.insert(name.into(), value)
    }

    /// Observable names in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.keys().map(String::as_str)
    }

    /// `(name, value)` pairs in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of observables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for ObservableSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, f64)> for ObservableSnapshot {
    fn from_iter<I: IntoIterator<Item = (&'a str, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}

/// One buffered `(time, snapshot)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservableSample {
    /// Simulated time of the sample.
    pub time: f64,
    /// Observable values at `time`.
    pub snapshot: Arc<ObservableSnapshot>,
}

/// Outcome of appending a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The sample was stored and the buffer is below its threshold.
    Buffered,
    /// The buffer reached its threshold and must be flushed now.
    ThresholdReached,
}

/// Ordered, size-bounded log of observable samples.
#[derive(Debug, Clone)]
pub struct ObservableBuffer {
    samples: Vec<ObservableSample>,
    threshold: usize,
    columns: Option<Vec<String>>,
    appended: usize,
}

impl Default for ObservableBuffer {
    fn default() -> Self {
        Self::with_threshold(DEFAULT_FLUSH_THRESHOLD)
    }
}

impl ObservableBuffer {
    /// Creates a buffer that asks for a flush once it holds `threshold` samples.
    ///
    /// A zero threshold is treated as one.
    #[must_use]
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            samples: Vec::new(),
            threshold: threshold.max(1),
            columns: None,
            appended: 0,
        }
    }

    /// Flush threshold.
    #[must_use]
    pub const fn threshold(&self) -> usize {
        self.threshold
    }

    /// Number of buffered samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Buffered samples in insertion order.
    #[must_use]
    pub fn samples(&self) -> &[ObservableSample] {
        &self.samples
    }

    /// Column names fixed by the first sample of the run.
    #[must_use]
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Appends a sample.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::ObservableKeyMismatch` if the snapshot's names
    /// differ from the run's columns. The buffer is left unchanged.
    pub fn append(
        &mut self,
        time: f64,
        snapshot: Arc<ObservableSnapshot>,
    ) -> Result<AppendOutcome, ValidationError> {
        match &self.columns {
            Some(columns) => {
                if !columns.iter().map(String::as_str).eq(snapshot.names()) {
                    return Err(ValidationError::ObservableKeyMismatch {
                        index: self.appended,
                        expected: columns.join(", "),
                        actual: snapshot.names().collect::<Vec<_>>().join(", "),
                    });
                }
            }
            None => {
                self.columns = Some(snapshot.names().map(str::to_string).collect());
            }
        }

        self.samples.push(ObservableSample { time, snapshot });
        self.appended += 1;

        if self.samples.len() >= self.threshold {
            Ok(AppendOutcome::ThresholdReached)
        } else {
            Ok(AppendOutcome::Buffered)
        }
    }

    /// Removes and returns every buffered sample; the columns are kept.
    pub fn take(&mut self) -> Vec<ObservableSample> {
        std::mem::take(&mut self.samples)
    }

    /// Fixes the columns of an empty buffer before its first sample.
    ///
    /// Does nothing once samples are buffered.
    pub fn pin_columns(&mut self, columns: Vec<String>) {
        if self.samples.is_empty() {
            self.columns = Some(columns);
        }
    }

    /// Drops buffered samples and forgets the columns.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.columns = None;
        self.appended = 0;
    }
}
