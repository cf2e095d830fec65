use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One offending input field found during parameter validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub reason: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum StorageEvalError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Validation failed ({} issue(s)): {}", .issues.len(), join_issues(.issues))]
    ValidationFailed { issues: Vec<FieldIssue> },

    #[error("Calculation failed during {stage}: {source}")]
    Calculation {
        stage: String,
        #[source]
        source: Box<StorageEvalError>,
    },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Arithmetic overflow in {context}")]
    Overflow { context: String },

    #[error("Cash-flow table has not been built; run calculate() first")]
    TableNotBuilt,

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl StorageEvalError {
    /// Wrap an error raised while assembling the table or extracting metrics.
    pub fn calculation(stage: impl Into<String>, source: StorageEvalError) -> Self {
        StorageEvalError::Calculation {
            stage: stage.into(),
            source: Box::new(source),
        }
    }

    /// Field issues carried by a validation failure, empty for any other kind.
    pub fn issues(&self) -> &[FieldIssue] {
        match self {
            StorageEvalError::ValidationFailed { issues } => issues,
            _ => &[],
        }
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<serde_json::Error> for StorageEvalError {
    fn from(e: serde_json::Error) -> Self {
        StorageEvalError::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_every_field() {
        let err = StorageEvalError::ValidationFailed {
            issues: vec![
                FieldIssue::new("power_mw", "missing required parameter"),
                FieldIssue::new("static_invest", "missing required parameter"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 issue(s)"));
        assert!(msg.contains("power_mw"));
        assert!(msg.contains("static_invest"));
        assert_eq!(err.issues().len(), 2);
    }

    #[test]
    fn test_calculation_wraps_source() {
        let err = StorageEvalError::calculation(
            "metric extraction",
            StorageEvalError::InsufficientData("empty series".into()),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("Calculation failed during metric extraction"));
        assert!(msg.contains("empty series"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.issues().is_empty());
    }
}
