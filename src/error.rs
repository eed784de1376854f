//! Error types for the connector.
//!
//! All errors are strongly typed using thiserror. Every error also maps to a
//! negative integer status code so it can cross a C boundary without unwinding.

use std::path::PathBuf;

use thiserror::Error;

/// Validation errors raised before any engine or file work happens.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Species label cannot be empty")]
    EmptyLabel,

    #[error("Observable set mismatch at sample {index}: expected [{expected}], got [{actual}]")]
    ObservableKeyMismatch {
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("Reactant group '{key}' record {index} is missing field '{field}'")]
    MissingRecordField {
        key: String,
        index: usize,
        field: &'static str,
    },

    #[error("Reactant group '{key}' record {index} has unparseable rate '{raw}'")]
    InvalidRate {
        key: String,
        index: usize,
        raw: String,
    },

    #[error("String field '{field}' contains an interior NUL byte")]
    InteriorNul {
        field: &'static str,
    },

    #[error("Parallel arrays disagree for {what}: {left} vs {right} entries")]
    LengthMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },

    #[error("Result with {len} entries does not fit a C int")]
    ResultTooLarge {
        len: usize,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Failures reported by the simulation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine reset failed")]
    ResetFailure,

    #[error("Engine rejected initialization: {reason}")]
    InitFailure {
        reason: String,
    },

    #[error("Engine could not advance{}", step_suffix(.reaction))]
    StepFailure {
        reaction: Option<String>,
    },

    #[error("Unknown compartment: {name}")]
    UnknownCompartment {
        name: String,
    },
}

fn step_suffix(reaction: &Option<String>) -> String {
    reaction
        .as_ref()
        .map(|r| format!(" by firing '{r}'"))
        .unwrap_or_default()
}

/// Top-level error type for the connector.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("File I/O error on {}: {source}", .path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConnectorError {
    /// Creates a file I/O error for the given path.
    #[must_use]
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an engine error.
    #[must_use]
    pub const fn is_engine(&self) -> bool {
        matches!(self, Self::Engine(_))
    }

    /// Returns true if this is a file I/O error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::FileIo { .. })
    }

    /// Status code reported across the C boundary. Success is `0`.
    #[must_use]
    pub const fn status_code(&self) -> i32 {
        match self {
            Self::Engine(e) => match e {
                EngineError::InitFailure { .. } => -1,
                EngineError::StepFailure { .. } => -2,
                EngineError::ResetFailure => -3,
                EngineError::UnknownCompartment { .. } => -4,
            },
            Self::Validation(_) => -10,
            Self::FileIo { .. } => -20,
        }
    }
}

/// Result type alias for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Collapses a result into a C status code.
#[must_use]
pub fn status_of<T>(result: &ConnectorResult<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.status_code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failure_names_reaction() {
        let err = EngineError::StepFailure {
            reaction: Some("bind".to_string()),
        };
        assert_eq!(err.to_string(), "Engine could not advance by firing 'bind'");

        let err = EngineError::StepFailure { reaction: None };
        assert_eq!(err.to_string(), "Engine could not advance");
    }

    #[test]
    fn test_observable_mismatch_message() {
        let err = ValidationError::ObservableKeyMismatch {
            index: 3,
            expected: "A, B".to_string(),
            actual: "A".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sample 3"));
        assert!(msg.contains("[A, B]"));
    }

    #[test]
    fn test_file_io_error() {
        let err = ConnectorError::file_io(
            "/nowhere/out.gdat",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_io());
        assert!(err.to_string().contains("/nowhere/out.gdat"));
        assert_eq!(err.status_code(), -20);
    }

    #[test]
    fn test_status_codes_are_negative_and_distinct() {
        let errors: Vec<ConnectorError> = vec![
            EngineError::InitFailure { reason: "x".into() }.into(),
            EngineError::StepFailure { reaction: None }.into(),
            EngineError::ResetFailure.into(),
            EngineError::UnknownCompartment { name: "EC".into() }.into(),
            ValidationError::EmptyLabel.into(),
            ConnectorError::file_io("f", std::io::Error::other("x")),
        ];
        let mut codes: Vec<i32> = errors.iter().map(ConnectorError::status_code).collect();
        assert!(codes.iter().all(|c| *c < 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_status_of() {
        let ok: ConnectorResult<()> = Ok(());
        assert_eq!(status_of(&ok), 0);

        let err: ConnectorResult<()> = Err(EngineError::ResetFailure.into());
        assert_eq!(status_of(&err), -3);
        assert!(err.unwrap_err().is_engine());
    }
}
