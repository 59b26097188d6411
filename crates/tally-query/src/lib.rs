//! # tally-query: Report Orchestration for Tally
//!
//! Connects the pure engine in `tally-core` to a row source and keeps report
//! views in step with stock movements.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Data Flow                                │
//! │                                                                         │
//! │   tally-cli / any front end                                            │
//! │        │                  │                                             │
//! │        ▼                  ▼                                             │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                tally-query (THIS CRATE)                         │   │
//! │  │                                                                 │   │
//! │  │  StockQuery<S>  ◄──── refresh ────  InvalidationBus            │   │
//! │  │   update / refresh                      ▲                       │   │
//! │  │        │                                │ publish               │   │
//! │  │        │                          StockLedger<W>                │   │
//! │  │        │                           sale / receipt / count       │   │
//! │  │        ▼                                │                       │   │
//! │  │  StockSource ◄───── StockWriter ────────┘                       │   │
//! │  └────────┬────────────────────────────────────────────────────────┘   │
//! │           ▼                                                             │
//! │   tally-db::Database                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`query`] - `StockQuery`, params and report
//! - [`ledger`] - Persisted movements that publish invalidations
//! - [`invalidation`] - Broadcast of stale-cache signals
//! - [`source`] - Storage seams
//! - [`context`] - Session and report settings
//! - [`error`] - `QueryError`

pub mod context;
pub mod error;
pub mod invalidation;
pub mod ledger;
pub mod query;
pub mod source;

pub use context::{ReportSettings, SessionContext};
pub use error::{QueryError, QueryResult};
pub use invalidation::{CacheKey, Invalidation, InvalidationBus};
pub use ledger::StockLedger;
pub use query::{build_report, StockQuery, StockQueryParams, StockReport};
pub use source::{StockSource, StockWriter};
