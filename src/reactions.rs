//! Reaction fire tallies.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use crate::error::ConnectorResult;
use crate::sink::{gdat, FileSink};

/// Persistent tally of named reaction firings for the current run.
///
/// Counts only grow until [`ReactionCounter::reset`]. Resetting the engine does
/// not touch the tally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionCounter {
    tally: BTreeMap<String, u64>,
}

impl ReactionCounter {
    /// Creates an empty tally.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tally: BTreeMap::new(),
        }
    }

    /// Counts one firing of `reaction` and returns its new total.
    pub fn record_fire(&mut self, reaction: &str) -> u64 {
        let count = self.tally.entry(reaction.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Ensures `reaction` is listed, at zero if it has never fired.
    pub fn register(&mut self, reaction: &str) {
        self.tally.entry(reaction.to_string()).or_insert(0);
    }

    /// Fire count for `reaction`.
    #[must_use]
    pub fn count(&self, reaction: &str) -> u64 {
        self.tally.get(reaction).copied().unwrap_or(0)
    }

    /// `(reaction, count)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.tally.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of known reactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tally.len()
    }

    /// Whether no reaction is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tally.is_empty()
    }

    /// Forget every reaction.
    pub fn reset(&mut self) {
        self.tally.clear();
    }

    /// File contents: one `<name> fired <count>` line per reaction.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        gdat::render_reactions(&mut out, self.iter());
        out
    }

    /// Rewrites `path` with the current tally.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::FileIo` if the file cannot be written.
    pub fn flush_reactions(&self, path: &Path) -> ConnectorResult<()> {
        FileSink::overwrite(path, &self.render())?;
        info!(path = %path.display(), reactions = self.tally.len(), "flushed reaction tally");
        Ok(())
    }
}
