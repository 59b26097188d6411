//! # Stock Sources
//!
//! The seams between orchestration and storage.
//!
//! ```text
//! StockQuery<S: StockSource>    read joined rows for a range
//! StockLedger<W: StockWriter>   read + persist single rows
//!            │
//!            ▼
//!   tally_db::Database          (or an in-memory double in tests)
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::QueryResult;
use tally_core::{Product, StockEntry, Store};
use tally_db::{Database, EntryQuery};

/// Anything that can produce joined stock rows for a report.
#[async_trait]
pub trait StockSource: Send + Sync {
    /// Rows for `query.range`, with store/product push-down and an optional
    /// repository page.
    async fn fetch_entries(&self, query: &EntryQuery) -> QueryResult<Vec<StockEntry>>;
}

/// Single-row access for movements.
#[async_trait]
pub trait StockWriter: StockSource {
    async fn product(&self, id: &str) -> QueryResult<Option<Product>>;

    async fn store(&self, id: &str) -> QueryResult<Option<Store>>;

    async fn entry(
        &self,
        product_id: &str,
        shop_id: &str,
        date: NaiveDate,
    ) -> QueryResult<Option<StockEntry>>;

    /// Most recent row strictly before `date`.
    async fn latest_before(
        &self,
        product_id: &str,
        shop_id: &str,
        date: NaiveDate,
    ) -> QueryResult<Option<StockEntry>>;

    /// Persists the row and returns it as stored (joined fields refreshed).
    async fn save_entry(&self, entry: &StockEntry) -> QueryResult<StockEntry>;

    /// Sets a product's selling and cost price.
    async fn update_prices(
        &self,
        product_id: &str,
        price_cents: i64,
        cost_price_cents: Option<i64>,
    ) -> QueryResult<Product>;
}

// =============================================================================
// Database Implementation
// =============================================================================

#[async_trait]
impl StockSource for Database {
    async fn fetch_entries(&self, query: &EntryQuery) -> QueryResult<Vec<StockEntry>> {
        Ok(self.stock_entries().list(query).await?)
    }
}

#[async_trait]
impl StockWriter for Database {
    async fn product(&self, id: &str) -> QueryResult<Option<Product>> {
        Ok(self.products().get_by_id(id).await?)
    }

    async fn store(&self, id: &str) -> QueryResult<Option<Store>> {
        Ok(self.stores().get_by_id(id).await?)
    }

    async fn entry(
        &self,
        product_id: &str,
        shop_id: &str,
        date: NaiveDate,
    ) -> QueryResult<Option<StockEntry>> {
        Ok(self.stock_entries().get(product_id, shop_id, date).await?)
    }

    async fn latest_before(
        &self,
        product_id: &str,
        shop_id: &str,
        date: NaiveDate,
    ) -> QueryResult<Option<StockEntry>> {
        Ok(self
            .stock_entries()
            .latest_before(product_id, shop_id, date)
            .await?)
    }

    async fn save_entry(&self, entry: &StockEntry) -> QueryResult<StockEntry> {
        Ok(self.stock_entries().upsert(entry).await?)
    }

    async fn update_prices(
        &self,
        product_id: &str,
        price_cents: i64,
        cost_price_cents: Option<i64>,
    ) -> QueryResult<Product> {
        Ok(self
            .products()
            .update_prices(product_id, price_cents, cost_price_cents)
            .await?)
    }
}
