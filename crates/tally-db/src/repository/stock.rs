//! # Stock Repository
//!
//! Daily stock rows, read back joined with product and store attributes.
//!
//! ## Read Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  stock_entries e                                                        │
//! │    ⋈ products p   → product_name, price_cents, cost_price_cents        │
//! │    ⋈ stores   s   → store_name                                         │
//! │    e.recorded_by  → operator_name                                      │
//! │                                                                         │
//! │  WHERE stock_date BETWEEN from AND to                                  │
//! │    [AND shop_id = ?]  [AND product_id = ?]      (Selection::Only)      │
//! │  ORDER BY stock_date, store name, product name                         │
//! │  [LIMIT page_size OFFSET (page − 1) × page_size] (optional)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes never touch the joined columns; prices always come from the
//! product at read time.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::{DateRange, PageRequest, Selection, StockEntry};

const ENTRY_SELECT: &str = r#"
    SELECT
        e.id,
        e.product_id,
        e.shop_id,
        e.stock_date,
        e.opening_stock,
        e.closing_stock,
        e.stock_added,
        e.actual_stock,
        p.name AS product_name,
        p.price_cents,
        p.cost_price_cents,
        s.name AS store_name,
        e.recorded_by AS operator_name
    FROM stock_entries e
    INNER JOIN products p ON p.id = e.product_id
    INNER JOIN stores s ON s.id = e.shop_id
"#;

const RANGE_FILTER: &str = r#"
    WHERE e.stock_date BETWEEN ?1 AND ?2
      AND (?3 IS NULL OR e.shop_id = ?3)
      AND (?4 IS NULL OR e.product_id = ?4)
"#;

// =============================================================================
// Entry Query
// =============================================================================

/// What to read: a date range, optional store/product push-down and an
/// optional repository page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryQuery {
    pub range: DateRange,
    pub store: Selection,
    pub product: Selection,
    pub page: Option<PageRequest>,
}

impl EntryQuery {
    /// Every row in `range`, unpaginated.
    pub fn new(range: DateRange) -> Self {
        EntryQuery {
            range,
            store: Selection::All,
            product: Selection::All,
            page: None,
        }
    }

    pub fn store(mut self, store: Selection) -> Self {
        self.store = store;
        self
    }

    pub fn product(mut self, product: Selection) -> Self {
        self.product = product;
        self
    }

    pub fn page(mut self, page: PageRequest) -> Self {
        self.page = Some(page);
        self
    }

    /// `(limit, offset)`; SQLite reads `LIMIT -1` as "no limit".
    fn limit_offset(&self) -> (i64, i64) {
        match self.page {
            Some(page) => (
                i64::from(page.page_size),
                i64::try_from(page.offset()).unwrap_or(i64::MAX),
            ),
            None => (-1, 0),
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Lists joined rows matching `query`.
    pub async fn list(&self, query: &EntryQuery) -> DbResult<Vec<StockEntry>> {
        let (limit, offset) = query.limit_offset();
        debug!(
            from = %query.range.from,
            to = %query.range.to,
            store = ?query.store.id(),
            product = ?query.product.id(),
            limit,
            offset,
            "Listing stock entries"
        );

        let sql = format!(
            "{ENTRY_SELECT} {RANGE_FILTER} ORDER BY e.stock_date, s.name, p.name, e.id LIMIT ?5 OFFSET ?6"
        );
        let entries = sqlx::query_as::<_, StockEntry>(&sql)
            .bind(query.range.from)
            .bind(query.range.to)
            .bind(query.store.id())
            .bind(query.product.id())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = entries.len(), "Stock entries listed");
        Ok(entries)
    }

    /// Counts rows matching `query`, ignoring its page.
    pub async fn count(&self, query: &EntryQuery) -> DbResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM stock_entries e {RANGE_FILTER}"
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(query.range.from)
            .bind(query.range.to)
            .bind(query.store.id())
            .bind(query.product.id())
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// The row for one product, store and day, if it exists.
    pub async fn get(
        &self,
        product_id: &str,
        shop_id: &str,
        date: NaiveDate,
    ) -> DbResult<Option<StockEntry>> {
        let sql = format!(
            "{ENTRY_SELECT} WHERE e.product_id = ?1 AND e.shop_id = ?2 AND e.stock_date = ?3"
        );
        let entry = sqlx::query_as::<_, StockEntry>(&sql)
            .bind(product_id)
            .bind(shop_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// The most recent row strictly before `date`: the source of the next
    /// day's opening stock.
    pub async fn latest_before(
        &self,
        product_id: &str,
        shop_id: &str,
        date: NaiveDate,
    ) -> DbResult<Option<StockEntry>> {
        let sql = format!(
            "{ENTRY_SELECT} WHERE e.product_id = ?1 AND e.shop_id = ?2 AND e.stock_date < ?3 \
             ORDER BY e.stock_date DESC LIMIT 1"
        );
        let entry = sqlx::query_as::<_, StockEntry>(&sql)
            .bind(product_id)
            .bind(shop_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// Inserts the row, or overwrites the counts of the existing row for the
    /// same product, store and day. Returns the stored row, joined.
    pub async fn upsert(&self, entry: &StockEntry) -> DbResult<StockEntry> {
        debug!(
            product_id = %entry.product_id,
            shop_id = %entry.shop_id,
            date = %entry.stock_date,
            opening = entry.opening_stock,
            closing = entry.closing_stock,
            added = entry.stock_added,
            actual = ?entry.actual_stock,
            "Upserting stock entry"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_entries (
                id, product_id, shop_id, stock_date,
                opening_stock, closing_stock, stock_added, actual_stock,
                recorded_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            ON CONFLICT (product_id, shop_id, stock_date) DO UPDATE SET
                opening_stock = excluded.opening_stock,
                closing_stock = excluded.closing_stock,
                stock_added   = excluded.stock_added,
                actual_stock  = excluded.actual_stock,
                recorded_by   = excluded.recorded_by,
                updated_at    = excluded.updated_at
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.product_id)
        .bind(&entry.shop_id)
        .bind(entry.stock_date)
        .bind(entry.opening_stock)
        .bind(entry.closing_stock)
        .bind(entry.stock_added)
        .bind(entry.actual_stock)
        .bind(entry.operator_name.as_deref())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get(&entry.product_id, &entry.shop_id, entry.stock_date)
            .await?
            .ok_or_else(|| DbError::not_found("StockEntry", &entry.id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
