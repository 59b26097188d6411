//! # Repository Module
//!
//! One repository per table, each a cheap handle over the shared pool.
//!
//! ```text
//! db.stock_entries().list(&query)
//!        │
//!        ▼
//! StockRepository ── SQL ──► SQLite
//! ```
//!
//! - [`product::ProductRepository`] - Products with selling and cost price
//! - [`store::StoreRepository`] - Shops and cafés
//! - [`stock::StockRepository`] - Daily stock rows, read joined

pub mod product;
pub mod stock;
pub mod store;
