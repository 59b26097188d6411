//! # CLI Error Type
//!
//! Everything a command can fail with, flattened to one enum so `main` can
//! print it and pick an exit code.

use tally_core::ValidationError;
use tally_db::DbError;
use tally_query::QueryError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The report ran but its fetch failed; the message is what the report
    /// carried in its error field.
    #[error("Report failed: {0}")]
    Report(String),

    #[error("Nothing to correct: pass at least one of --opening, --closing, --added, --actual, --clear-actual")]
    EmptyCorrection,

    #[error("Database is not answering")]
    Unhealthy,

    #[error("Failed to write output: {0}")]
    Output(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Output(err.to_string())
    }
}

impl From<toml::ser::Error> for CliError {
    fn from(err: toml::ser::Error) -> Self {
        CliError::Output(err.to_string())
    }
}

impl CliError {
    /// Process exit code: 2 for bad input, 1 for everything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Invalid(_) | CliError::EmptyCorrection | CliError::Config(_) => 2,
            CliError::Query(QueryError::Core(tally_core::CoreError::Validation(_))) => 2,
            _ => 1,
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let invalid = CliError::from(ValidationError::Required {
            field: "product".into(),
        });
        assert_eq!(invalid.exit_code(), 2);
        assert_eq!(CliError::Report("timeout".into()).exit_code(), 1);
        assert_eq!(CliError::EmptyCorrection.exit_code(), 2);
    }

    #[test]
    fn test_report_message() {
        let err = CliError::Report("connection refused".into());
        assert_eq!(err.to_string(), "Report failed: connection refused");
    }
}
