//! # Query Error Types
//!
//! Only the ledger returns these. A report run never fails: a fetch error
//! becomes `StockReport::error` instead.

use tally_core::{CoreError, ValidationError};
use tally_db::DbError;
use thiserror::Error;

pub type QueryResult<T> = Result<T, QueryError>;

#[derive(Debug, Error)]
pub enum QueryError {
    /// Storage failure.
    #[error(transparent)]
    Db(#[from] DbError),

    /// A movement broke a stock rule (oversell, unknown product, bad quantity).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The session is scoped to one store and the request targets another.
    #[error("Session is limited to store {scope}, cannot modify store {requested}")]
    OutOfScope { scope: String, requested: String },

    /// A non-database source failed.
    #[error("Stock source unavailable: {0}")]
    Source(String),
}

impl From<ValidationError> for QueryError {
    fn from(err: ValidationError) -> Self {
        QueryError::Core(CoreError::Validation(err))
    }
}
