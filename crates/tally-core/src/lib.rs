//! # tally-core: Pure Business Logic for Tally
//!
//! This crate holds the stock reconciliation model as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Data Flow                                │
//! │                                                                         │
//! │  tally-db (SQLite rows, joined with product price/cost + store name)   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐  ┌───────────┐  ┌─────────┐  ┌──────────┐  │   │
//! │  │   │reconciliation│  │  filter   │  │  sort   │  │ movement │  │   │
//! │  │   │ units sold   │  │ search    │  │ date    │  │ sale     │  │   │
//! │  │   │ profit       │  │ store     │  │ profit  │  │ receipt  │  │   │
//! │  │   │ shortage     │  │ product   │  │ loss    │  │ count    │  │   │
//! │  │   └──────────────┘  └───────────┘  └─────────┘  └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  tally-query (fetch → filter → sort → summarize → paginate)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (StockEntry, Product, Store, DateRange, Selection)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`reconciliation`] - Units sold, profit, shortage loss, summaries
//! - [`filter`] - Search/store/product predicates
//! - [`sort`] - Stable ordering over derived metrics
//! - [`movement`] - Row lifecycle: open day, sale, receipt, count, correction
//! - [`validation`] - Input checks
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use tally_core::reconciliation::{profit, shortage_loss, units_sold};
//! use tally_core::StockEntry;
//!
//! let mut entry = StockEntry::blank("p1", "s1", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
//! entry.opening_stock = 100;
//! entry.closing_stock = 85;
//! entry.actual_stock = Some(80);
//! entry.price_cents = 1000;
//! entry.cost_price_cents = Some(600);
//!
//! assert_eq!(units_sold(&entry), 15);
//! assert_eq!(profit(&entry).cents(), 6000);
//! assert_eq!(shortage_loss(&entry).cents(), 3000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod filter;
pub mod money;
pub mod movement;
pub mod reconciliation;
pub mod sort;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use filter::{filter_entries, StockFilter};
pub use money::Money;
pub use movement::StockCorrection;
pub use reconciliation::{summarize, Dimension, GroupSummary, ReconciledEntry, StockSummary};
pub use sort::{sort_entries, SortDirection, SortField, SortSpec};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default number of rows per report page.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Upper bound on a report page.
///
/// Prevents a caller from asking the presentation layer to render an entire
/// year of rows in one go.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Maximum quantity accepted by a single stock movement.
pub const MAX_MOVEMENT_QUANTITY: i64 = 100_000;

/// Longest date range (in days) a report may cover.
pub const MAX_RANGE_DAYS: i64 = 366;
