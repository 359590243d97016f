//! Error types.
//!
//! - `GridError` is the library taxonomy. Every variant that concerns a grid
//!   names the grid label (and the technique, where one is involved).
//! - `AppError` is what the `gridx` binary reports: a message plus an exit code.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::Technique;

/// Errors raised while building or querying grids.
#[derive(Debug, Error)]
pub enum GridError {
    /// Required configuration (axis range, technique inputs) is missing or malformed.
    #[error("grid \"{label}\": {message}")]
    Configuration { label: String, message: String },

    /// The technique is not configured or could not be constructed for this grid.
    #[error("technique \"{technique}\" is not available for grid \"{label}\": {reason}")]
    ApproximationUnavailable {
        label: String,
        technique: Technique,
        reason: String,
    },

    /// Unrecognized container extension or malformed container content.
    #[error("format error in '{}': {message}", path.display())]
    Format { path: PathBuf, message: String },

    /// The persisted source does not exist.
    #[error("dataset file '{}' does not exist", path.display())]
    NotFound { path: PathBuf },

    /// A reconstructed axis disagrees with the matching array dimension.
    #[error(
        "grid \"{label}\": axis \"{axis}\" has {axis_len} points but the array dimension has {data_len}"
    )]
    ShapeMismatch {
        label: String,
        axis: String,
        axis_len: usize,
        data_len: usize,
    },

    /// A grid's stored formula could not be compiled; `source` keeps the cause
    /// (`CoefficientCountMismatch`, `Parse`, `UnknownIdentifier`, ...).
    #[error("grid \"{label}\": \"{technique}\" formula: {source}")]
    Formula {
        label: String,
        technique: Technique,
        #[source]
        source: Box<GridError>,
    },

    /// Discovered coefficient symbols and supplied values differ in count.
    #[error("formula has {names} coefficient symbols but {values} values were supplied")]
    CoefficientCountMismatch { names: usize, values: usize },

    /// The formula text does not follow the expression grammar.
    #[error("cannot parse formula at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// The formula references a name outside the allow-list.
    #[error("unknown {kind} \"{name}\" in formula")]
    UnknownIdentifier { kind: &'static str, name: String },

    /// Operand shapes cannot be broadcast together.
    #[error("shapes {left:?} and {right:?} cannot be broadcast together")]
    Broadcast { left: Vec<usize>, right: Vec<usize> },

    /// An evaluator was called with the wrong number of arguments.
    #[error("expected {expected} arguments, got {got}")]
    ArgumentCount { expected: usize, got: usize },

    /// No grid with this label exists in the dataset.
    #[error("dataset has no grid labelled \"{0}\"")]
    UnknownLabel(String),

    /// Evaluating a technique on a grid failed.
    #[error("evaluating \"{technique}\" on grid \"{label}\": {source}")]
    Evaluation {
        label: String,
        technique: Technique,
        #[source]
        source: Box<GridError>,
    },

    /// Interpolation axes or values are unusable.
    #[error("invalid interpolation input: {0}")]
    InvalidAxis(String),

    /// Coefficient fitting failed.
    #[error("fit failed for grid \"{label}\": {message}")]
    Fit { label: String, message: String },

    #[error("i/o error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A name-scanning pattern failed to compile.
    #[error("invalid name pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GridError {
    pub fn config(label: impl Into<String>, message: impl Into<String>) -> Self {
        GridError::Configuration {
            label: label.into(),
            message: message.into(),
        }
    }

    pub fn unavailable(label: impl Into<String>, technique: Technique, reason: impl Into<String>) -> Self {
        GridError::ApproximationUnavailable {
            label: label.into(),
            technique,
            reason: reason.into(),
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<GridError> for AppError {
    fn from(err: GridError) -> Self {
        let exit_code = match &err {
            GridError::ApproximationUnavailable { .. } | GridError::UnknownLabel(_) => 3,
            GridError::Fit { .. }
            | GridError::Evaluation { .. }
            | GridError::Broadcast { .. }
            | GridError::ArgumentCount { .. } => 4,
            _ => 2,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_maps_to_exit_code_three() {
        let err = GridError::unavailable("O3_5007A", Technique::Eqn, "no formula");
        let msg = err.to_string();
        assert!(msg.contains("O3_5007A") && msg.contains("eqn"), "{msg}");
        let app: AppError = err.into();
        assert_eq!(app.exit_code(), 3);
    }

    #[test]
    fn formula_errors_keep_their_cause() {
        use std::error::Error;

        let err = GridError::Formula {
            label: "O3_5007A".into(),
            technique: Technique::Eqn,
            source: Box::new(GridError::CoefficientCountMismatch { names: 3, values: 2 }),
        };
        let cause = err.source().and_then(|e| e.downcast_ref::<GridError>());
        assert!(matches!(cause, Some(GridError::CoefficientCountMismatch { names: 3, values: 2 })));
        assert_eq!(AppError::from(err).exit_code(), 2);
    }
}
