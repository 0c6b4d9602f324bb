//! Unified error types for the feeder toolkit
//!
//! [`FdrError`] covers every failure class a library call can report. Higher
//! crates mostly work in `anyhow::Result` and convert at API boundaries; the
//! calibration loop inspects the variant to decide whether a failure is fatal
//! to a candidate or to the whole run.
//!
//! # Example
//!
//! ```ignore
//! use fdr_core::{FdrError, FdrResult};
//!
//! fn load_feeder(path: &str) -> FdrResult<ObjectTree> {
//!     let text = std::fs::read_to_string(path)?;
//!     fdr_io::mdl::parse(&text)
//! }
//! ```

use thiserror::Error;

/// Unified error type for all feeder operations.
#[derive(Error, Debug)]
pub enum FdrError {
    /// I/O errors (file access, process spawn, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed MDL or CSV input
    #[error("Parse error: {0}")]
    Parse(String),

    /// Unknown object kind or wrong attribute arity
    #[error("Schema error: {0}")]
    Schema(String),

    /// A referenced equipment or parent id is absent
    #[error("Missing reference: {0}")]
    MissingReference(String),

    /// The external simulator failed or produced unusable output
    #[error("Simulator failure: {0}")]
    Simulator(String),

    /// Configuration errors (unknown region, missing keys, bad tables)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

impl FdrError {
    /// Parse error that names the 0-based token position it was raised at.
    pub fn parse_at(position: usize, message: impl std::fmt::Display) -> Self {
        FdrError::Parse(format!("{message} (token {position})"))
    }

    /// Whether the error only invalidates the current candidate.
    pub fn is_candidate_local(&self) -> bool {
        matches!(self, FdrError::Simulator(_) | FdrError::Io(_))
    }
}

/// Convenience type alias for Results using FdrError.
pub type FdrResult<T> = Result<T, FdrError>;

// Conversion from anyhow::Error
impl From<anyhow::Error> for FdrError {
    fn from(err: anyhow::Error) -> Self {
        FdrError::Other(err.to_string())
    }
}

impl From<String> for FdrError {
    fn from(s: String) -> Self {
        FdrError::Other(s)
    }
}

impl From<&str> for FdrError {
    fn from(s: &str) -> Self {
        FdrError::Other(s.to_string())
    }
}

// JSON parsing errors
impl From<serde_json::Error> for FdrError {
    fn from(err: serde_json::Error) -> Self {
        FdrError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FdrError::MissingReference("CABLE_4/0".into());
        assert!(err.to_string().contains("Missing reference"));
        assert!(err.to_string().contains("CABLE_4/0"));
    }

    #[test]
    fn test_parse_at_names_position() {
        let err = FdrError::parse_at(17, "unmatched '}'");
        assert_eq!(err.to_string(), "Parse error: unmatched '}' (token 17)");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FdrError = io_err.into();
        assert!(matches!(err, FdrError::Io(_)));
        assert!(err.is_candidate_local());
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> FdrResult<()> {
            Err(FdrError::Schema("unknown kind 'flux_capacitor'".into()))
        }

        fn outer() -> FdrResult<()> {
            inner()?;
            Ok(())
        }

        let err = outer().unwrap_err();
        assert!(!err.is_candidate_local());
    }
}
