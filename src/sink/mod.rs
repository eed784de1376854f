//! gdat file output.
//!
//! File names are derived from the model source and the run seed:
//!
//! ```text
//! <base>.seed_<seed:05>.gdat            observables (truncate once, then append)
//! <base>_reactions.seed_<seed:05>.gdat  reaction tally (rewritten on every flush)
//! ```
//!
//! `<base>` is the model file name with its directory stripped. The first
//! observable write of a session removes any file left by an earlier run;
//! later writes append and never repeat the header. There is no locking:
//! callers must serialize writers that target the same path.

pub mod gdat;
mod registry;

pub use registry::{Claim, FileRegistry};

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ConnectorError, ConnectorResult, ValidationError};
use crate::observable::ObservableSample;

/// Model file name with everything up to the last `/` or `\` removed.
#[must_use]
pub fn base_name(model_source: &str) -> &str {
    model_source
        .rfind(['/', '\\'])
        .map_or(model_source, |idx| &model_source[idx + 1..])
}

/// Observable file name for a run.
#[must_use]
pub fn observable_file_name(base: &str, seed: u32) -> String {
    format!("{base}.seed_{seed:05}.gdat")
}

/// Reaction file name for a run.
#[must_use]
pub fn reaction_file_name(base: &str, seed: u32) -> String {
    format!("{base}_reactions.seed_{seed:05}.gdat")
}

/// Destination paths for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    /// Observable time series.
    pub observables: PathBuf,
    /// Reaction tally.
    pub reactions: PathBuf,
}

impl OutputFiles {
    /// Paths under `output_dir` for the given model and seed.
    #[must_use]
    pub fn new(output_dir: &Path, model_source: &Path, seed: u32) -> Self {
        let source = model_source.to_string_lossy();
        let base = base_name(&source);
        Self {
            observables: output_dir.join(observable_file_name(base, seed)),
            reactions: output_dir.join(reaction_file_name(base, seed)),
        }
    }
}

/// Summary of one observable flush.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlushReport {
    /// File written.
    pub path: PathBuf,
    /// Data rows appended.
    pub rows: usize,
    /// Whether the header row was written.
    pub wrote_header: bool,
    /// When the flush completed.
    pub flushed_at: DateTime<Utc>,
}

/// Columns and row count of an observable file written this session.
#[derive(Debug, Clone, PartialEq, Eq)]
struct WrittenColumns {
    columns: Vec<String>,
    rows: usize,
}

/// Writer for observable and reaction files.
///
/// Every observable file keeps the columns of the header it was first written
/// with; rows under a different column set are refused.
#[derive(Debug, Clone)]
pub struct FileSink {
    files: OutputFiles,
    registry: FileRegistry,
    columns: HashMap<PathBuf, WrittenColumns>,
}

impl FileSink {
    /// Creates a sink writing the given run files.
    #[must_use]
    pub fn new(files: OutputFiles) -> Self {
        Self {
            files,
            registry: FileRegistry::new(),
            columns: HashMap::new(),
        }
    }

    /// Run file paths.
    #[must_use]
    pub const fn files(&self) -> &OutputFiles {
        &self.files
    }

    /// Paths written so far.
    #[must_use]
    pub const fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    /// Columns of the observable file at `path`, if written this session.
    #[must_use]
    pub fn columns_for(&self, path: &Path) -> Option<&[String]> {
        self.columns.get(path).map(|w| w.columns.as_slice())
    }

    /// Appends `body` to `path` under the truncate-once contract.
    ///
    /// `header` is written first when the file is empty. Returns whether the
    /// header was written.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::FileIo` if the file cannot be removed, opened or
    /// written.
    pub fn append(&mut self, path: &Path, header: Option<&str>, body: &str) -> ConnectorResult<bool> {
        let io_err = |e| ConnectorError::file_io(path, e);

        if let Claim::Fresh { removed_existing: true } = self.registry.claim(path).map_err(io_err)? {
            warn!(path = %path.display(), "removed output file left by an earlier run");
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;
        let is_empty = file.metadata().map_err(io_err)?.len() == 0;

        let mut writer = BufWriter::new(file);
        let wrote_header = match header {
            Some(h) if is_empty => {
                writer.write_all(h.as_bytes()).map_err(io_err)?;
                true
            }
            _ => false,
        };
        writer.write_all(body.as_bytes()).map_err(io_err)?;
        writer.flush().map_err(io_err)?;
        Ok(wrote_header)
    }

    /// Appends buffered samples to `path` as gdat rows.
    ///
    /// Nothing is written, and the file is left untouched, when `samples` is
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::ObservableKeyMismatch` if `path` was already
    /// written this session with other columns, and `ConnectorError::FileIo`
    /// on any file failure.
    pub fn append_observables(
        &mut self,
        path: &Path,
        columns: &[String],
        samples: &[ObservableSample],
    ) -> ConnectorResult<Option<FlushReport>> {
        if samples.is_empty() {
            return Ok(None);
        }
        if let Some(written) = self.columns.get(path) {
            if written.columns != columns {
                return Err(ValidationError::ObservableKeyMismatch {
                    index: written.rows,
                    expected: written.columns.join(", "),
                    actual: columns.join(", "),
                }
                .into());
            }
        }

        let mut body = String::new();
        gdat::render_rows(&mut body, columns, samples);
        let wrote_header = self.append(path, Some(&gdat::header(columns)), &body)?;

        self.columns
            .entry(path.to_path_buf())
            .or_insert_with(|| WrittenColumns {
                columns: columns.to_vec(),
                rows: 0,
            })
            .rows += samples.len();

        info!(path = %path.display(), rows = samples.len(), wrote_header, "flushed observables");
        Ok(Some(FlushReport {
            path: path.to_path_buf(),
            rows: samples.len(),
            wrote_header,
            flushed_at: Utc::now(),
        }))
    }

    /// Replaces the contents of `path` with `contents`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::FileIo` on any file failure.
    pub fn overwrite(path: &Path, contents: &str) -> ConnectorResult<()> {
        let io_err = |e| ConnectorError::file_io(path, e);
        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        writer.write_all(contents.as_bytes()).map_err(io_err)?;
        writer.flush().map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use super::*;
    use crate::observable::ObservableSnapshot;
    use tempfile::tempdir;

    #[test]
    fn base_name_strips_directories() {
        assert_eq!(base_name("models/tlbr.xml"), "tlbr.xml");
        assert_eq!(base_name("C:\\runs\\tlbr.xml"), "tlbr.xml");
        assert_eq!(base_name("a/b\\c.xml"), "c.xml");
        assert_eq!(base_name("plain.xml"), "plain.xml");
    }

    #[test]
    fn file_names_pad_seed() {
        assert_eq!(observable_file_name("m.xml", 7), "m.xml.seed_00007.gdat");
        assert_eq!(reaction_file_name("m.xml", 123_456), "m.xml_reactions.seed_123456.gdat");

        let files = OutputFiles::new(Path::new("/out"), Path::new("/models/m.xml"), 42);
        assert_eq!(files.observables, PathBuf::from("/out/m.xml.seed_00042.gdat"));
        assert_eq!(files.reactions, PathBuf::from("/out/m.xml_reactions.seed_00042.gdat"));
    }

    #[test]
    fn append_truncates_once_then_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.gdat");
        fs::write(&path, "left over\n").unwrap();

        let mut sink = FileSink::new(OutputFiles::new(dir.path(), Path::new("m.xml"), 1));
        assert!(sink.append(&path, Some("H\n"), "one\n").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "H\none\n");

        assert!(!sink.append(&path, Some("H\n"), "two\n").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "H\none\ntwo\n");
    }

    #[test]
    fn append_observables_skips_empty_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.gdat");
        fs::write(&path, "kept").unwrap();

        let mut sink = FileSink::new(OutputFiles::new(dir.path(), Path::new("m.xml"), 1));
        assert!(sink.append_observables(&path, &[], &[]).unwrap().is_none());
        assert_eq!(fs::read_to_string(&path).unwrap(), "kept");
        assert!(sink.registry().is_empty());
    }

    #[test]
    fn append_observables_reports_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.gdat");
        let mut sink = FileSink::new(OutputFiles::new(dir.path(), Path::new("m.xml"), 1));

        let snapshot: ObservableSnapshot = vec![("A", 2.0)].into_iter().collect();
        let samples = vec![ObservableSample { time: 0.5, snapshot: Arc::new(snapshot) }];
        let columns = vec!["A".to_string()];

        let report = sink.append_observables(&path, &columns, &samples).unwrap().unwrap();
        assert_eq!(report.rows, 1);
        assert!(report.wrote_header);
        assert_eq!(fs::read_to_string(&path).unwrap(), "time, A, \n0.5, 2, \n");
    }

    #[test]
    fn append_observables_refuses_new_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.gdat");
        let mut sink = FileSink::new(OutputFiles::new(dir.path(), Path::new("m.xml"), 1));

        let a: ObservableSnapshot = vec![("A", 1.0)].into_iter().collect();
        let b: ObservableSnapshot = vec![("B", 7.0)].into_iter().collect();
        let first = vec![ObservableSample { time: 0.0, snapshot: Arc::new(a) }];
        let second = vec![ObservableSample { time: 1.0, snapshot: Arc::new(b) }];

        sink.append_observables(&path, &["A".to_string()], &first).unwrap();
        let err = sink
            .append_observables(&path, &["B".to_string()], &second)
            .unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::Validation(ValidationError::ObservableKeyMismatch { index: 1, .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "time, A, \n0, 1, \n");
        assert_eq!(sink.columns_for(&path).unwrap(), ["A".to_string()]);
    }

    #[test]
    fn overwrite_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rxn.gdat");
        FileSink::overwrite(&path, "A fired 1\n").unwrap();
        FileSink::overwrite(&path, "A fired 2\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "A fired 2\n");
    }

    #[test]
    fn unwritable_path_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("run.gdat");
        let mut sink = FileSink::new(OutputFiles::new(dir.path(), Path::new("m.xml"), 1));
        let err = sink.append(&path, None, "x").unwrap_err();
        assert!(err.is_io());
        assert!(FileSink::overwrite(&path, "x").unwrap_err().is_io());
    }
}
