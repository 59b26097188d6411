//! # Stock Ledger
//!
//! Applies movements to persisted rows and announces them.
//!
//! ## One Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_sale(product, store, date, qty)                                 │
//! │       │                                                                 │
//! │       ├── session scoped to another store? → OutOfScope                │
//! │       ▼                                                                 │
//! │  get row for (product, store, date)                                    │
//! │       └── missing → open_day from latest row before date               │
//! │       ▼                                                                 │
//! │  movement::apply_sale (pure, validates)                                │
//! │       ▼                                                                 │
//! │  save_entry, stamped with the session's operator name                  │
//! │       ▼                                                                 │
//! │  bus.publish(stocks, products, pos)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed movement writes nothing and publishes nothing.
//!
//! Movements on one ledger run one at a time: the read of the current row
//! and the save of the next one happen under a single lock, so concurrent
//! sales never overwrite each other's closing stock.

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::context::SessionContext;
use crate::error::{QueryError, QueryResult};
use crate::invalidation::{CacheKey, Invalidation, InvalidationBus};
use crate::source::StockWriter;
use tally_core::movement::{apply_correction, apply_count, apply_receipt, apply_sale, open_day};
use tally_core::validation::validate_id;
use tally_core::{CoreError, CoreResult, Product, StockCorrection, StockEntry};

pub struct StockLedger<W> {
    writer: Arc<W>,
    bus: InvalidationBus,
    context: SessionContext,
    /// Held from reading a row until its successor is saved.
    movements: Mutex<()>,
}

impl<W: StockWriter> StockLedger<W> {
    pub fn new(writer: Arc<W>, bus: InvalidationBus, context: SessionContext) -> Self {
        StockLedger {
            writer,
            bus,
            context,
            movements: Mutex::new(()),
        }
    }

    pub fn bus(&self) -> &InvalidationBus {
        &self.bus
    }

    /// Opens the day's row, carrying opening stock from the latest earlier
    /// row. An existing row is returned untouched.
    pub async fn open_day(
        &self,
        product_id: &str,
        shop_id: &str,
        date: NaiveDate,
    ) -> QueryResult<StockEntry> {
        self.check_scope(shop_id)?;
        let _guard = self.movements.lock().await;

        if let Some(existing) = self.writer.entry(product_id, shop_id, date).await? {
            debug!(id = %existing.id, "Day already open");
            return Ok(existing);
        }

        let mut entry = self.fresh_row(product_id, shop_id, date).await?;
        entry.operator_name = self.context.operator();
        let saved = self.writer.save_entry(&entry).await?;

        info!(
            product_id = %product_id,
            shop_id = %shop_id,
            date = %date,
            opening = saved.opening_stock,
            "Stock day opened"
        );
        self.bus.publish(Invalidation::stock_movement("open_day"));
        Ok(saved)
    }

    pub async fn record_sale(
        &self,
        product_id: &str,
        shop_id: &str,
        date: NaiveDate,
        qty: i64,
    ) -> QueryResult<StockEntry> {
        self.apply(product_id, shop_id, date, "sale", |e| apply_sale(e, qty))
            .await
    }

    pub async fn record_receipt(
        &self,
        product_id: &str,
        shop_id: &str,
        date: NaiveDate,
        qty: i64,
    ) -> QueryResult<StockEntry> {
        self.apply(product_id, shop_id, date, "receipt", |e| apply_receipt(e, qty))
            .await
    }

    pub async fn record_count(
        &self,
        product_id: &str,
        shop_id: &str,
        date: NaiveDate,
        counted: i64,
    ) -> QueryResult<StockEntry> {
        self.apply(product_id, shop_id, date, "count", |e| apply_count(e, counted))
            .await
    }

    /// Manual edit of a row's counts.
    pub async fn correct(
        &self,
        product_id: &str,
        shop_id: &str,
        date: NaiveDate,
        correction: &StockCorrection,
    ) -> QueryResult<StockEntry> {
        self.apply(product_id, shop_id, date, "correction", |e| {
            apply_correction(e, correction)
        })
        .await
    }

    /// Changes a product's selling and cost price. Prices are shared by
    /// every store, so a store-scoped session may not change them.
    pub async fn update_prices(
        &self,
        product_id: &str,
        price_cents: i64,
        cost_price_cents: Option<i64>,
    ) -> QueryResult<Product> {
        if let Some(scope) = &self.context.store_scope {
            return Err(QueryError::OutOfScope {
                scope: scope.clone(),
                requested: "all stores".to_string(),
            });
        }
        validate_id("product", product_id)?;

        let product = self
            .writer
            .update_prices(product_id, price_cents, cost_price_cents)
            .await?;

        info!(
            product_id = %product_id,
            price_cents,
            cost_price_cents = ?cost_price_cents,
            operator = ?self.context.operator(),
            "Product prices updated"
        );
        // profit and loss of existing rows change with the price
        self.bus.publish(Invalidation::new(
            [CacheKey::Products, CacheKey::Stocks, CacheKey::Pos],
            "price",
        ));
        Ok(product)
    }

    async fn apply<F>(
        &self,
        product_id: &str,
        shop_id: &str,
        date: NaiveDate,
        reason: &'static str,
        movement: F,
    ) -> QueryResult<StockEntry>
    where
        F: FnOnce(&StockEntry) -> CoreResult<StockEntry>,
    {
        self.check_scope(shop_id)?;
        let _guard = self.movements.lock().await;

        let current = match self.writer.entry(product_id, shop_id, date).await? {
            Some(entry) => entry,
            None => self.fresh_row(product_id, shop_id, date).await?,
        };

        let mut next = movement(&current)?;
        next.operator_name = self.context.operator();
        let saved = self.writer.save_entry(&next).await?;

        info!(
            movement = reason,
            product_id = %product_id,
            shop_id = %shop_id,
            date = %date,
            closing = saved.closing_stock,
            actual = ?saved.actual_stock,
            operator = ?saved.operator_name,
            "Stock movement recorded"
        );
        self.bus.publish(Invalidation::stock_movement(reason));
        Ok(saved)
    }

    /// Builds (without saving) the row a movement starts from.
    async fn fresh_row(
        &self,
        product_id: &str,
        shop_id: &str,
        date: NaiveDate,
    ) -> QueryResult<StockEntry> {
        validate_id("product", product_id)?;
        validate_id("store", shop_id)?;

        let product = self
            .writer
            .product(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        let store = self
            .writer
            .store(shop_id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| CoreError::StoreNotFound(shop_id.to_string()))?;

        let prior = self.writer.latest_before(product_id, shop_id, date).await?;
        Ok(open_day(&product, &store, date, prior.as_ref()))
    }

    fn check_scope(&self, shop_id: &str) -> QueryResult<()> {
        if self.context.can_modify(shop_id) {
            return Ok(());
        }
        Err(QueryError::OutOfScope {
            scope: self.context.store_scope.clone().unwrap_or_default(),
            requested: shop_id.to_string(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ReportSettings;
    use crate::query::{StockQuery, StockQueryParams};
    use tally_core::{DateRange, Product, Store, ValidationError};
    use tally_db::{Database, DbConfig};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    struct Fixture {
        db: Arc<Database>,
        ledger: StockLedger<Database>,
        latte: Product,
        cafe: Store,
    }

    async fn fixture() -> Fixture {
        let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
        let latte = db.products().create("LATTE", "Latte", 1000, Some(600)).await.unwrap();
        let cafe = db.stores().create("Harbour Café").await.unwrap();
        let ledger = StockLedger::new(
            Arc::clone(&db),
            InvalidationBus::default(),
            SessionContext::new("u1", "Maria"),
        );
        Fixture { db, ledger, latte, cafe }
    }

    #[tokio::test]
    async fn test_day_reconciles_end_to_end() {
        let f = fixture().await;
        let (p, s) = (f.latte.id.as_str(), f.cafe.id.as_str());

        f.ledger.record_receipt(p, s, day(1), 100).await.unwrap();
        // day 2 opens from day 1's closing
        f.ledger.record_sale(p, s, day(2), 15).await.unwrap();
        let counted = f.ledger.record_count(p, s, day(2), 80).await.unwrap();

        assert_eq!(counted.opening_stock, 100);
        assert_eq!(counted.closing_stock, 85);
        assert_eq!(counted.actual_stock, Some(80));
        assert_eq!(counted.operator_name.as_deref(), Some("Maria"));

        let q = StockQuery::new(Arc::clone(&f.db), SessionContext::default(), ReportSettings::default());
        let report = q
            .update(StockQueryParams::new(DateRange::single(day(2))))
            .await;
        assert_eq!(report.summary.total_sold, 15);
        assert_eq!(report.summary.total_profit.cents(), 6000);
        assert_eq!(report.summary.total_product_loss.cents(), 3000);
    }

    #[tokio::test]
    async fn test_open_day_carries_actual_count() {
        let f = fixture().await;
        let (p, s) = (f.latte.id.as_str(), f.cafe.id.as_str());
        f.ledger.record_receipt(p, s, day(1), 20).await.unwrap();
        f.ledger.record_count(p, s, day(1), 18).await.unwrap();

        let opened = f.ledger.open_day(p, s, day(3)).await.unwrap();
        assert_eq!(opened.opening_stock, 18);
        assert_eq!(opened.closing_stock, 18);

        // opening again is a no-op
        let again = f.ledger.open_day(p, s, day(3)).await.unwrap();
        assert_eq!(again, opened);
    }

    #[tokio::test]
    async fn test_oversell_writes_nothing() {
        let f = fixture().await;
        let (p, s) = (f.latte.id.as_str(), f.cafe.id.as_str());
        f.ledger.record_receipt(p, s, day(1), 3).await.unwrap();

        let mut rx = f.ledger.bus().subscribe();
        let err = f.ledger.record_sale(p, s, day(1), 5).await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::Core(CoreError::InsufficientStock { available: 3, requested: 5, .. })
        ));
        assert!(rx.try_recv().is_err());

        let row = f.db.stock_entries().get(p, s, day(1)).await.unwrap().unwrap();
        assert_eq!(row.closing_stock, 3);
    }

    #[tokio::test]
    async fn test_invalid_quantity() {
        let f = fixture().await;
        let err = f
            .ledger
            .record_receipt(&f.latte.id, &f.cafe.id, day(1), 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::Core(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));
    }

    #[tokio::test]
    async fn test_movement_publishes_invalidation() {
        let f = fixture().await;
        let mut rx = f.ledger.bus().subscribe();
        f.ledger
            .record_receipt(&f.latte.id, &f.cafe.id, day(1), 4)
            .await
            .unwrap();

        let signal = rx.recv().await.unwrap();
        assert_eq!(signal.reason, "receipt");
        assert!(signal.touches(CacheKey::Stocks));
        assert!(signal.touches(CacheKey::Products));
        assert!(signal.touches(CacheKey::Pos));
    }

    #[tokio::test]
    async fn test_unknown_product_and_store() {
        let f = fixture().await;
        let err = f.ledger.record_receipt("ghost", &f.cafe.id, day(1), 1).await.unwrap_err();
        assert!(matches!(err, QueryError::Core(CoreError::ProductNotFound(_))));

        let err = f.ledger.record_receipt(&f.latte.id, "nowhere", day(1), 1).await.unwrap_err();
        assert!(matches!(err, QueryError::Core(CoreError::StoreNotFound(_))));
    }

    #[tokio::test]
    async fn test_scoped_session_cannot_touch_other_store() {
        let f = fixture().await;
        let other = f.db.stores().create("Station Kiosk").await.unwrap();
        let scoped = StockLedger::new(
            Arc::clone(&f.db),
            InvalidationBus::default(),
            SessionContext::new("u2", "Sam").with_store_scope(f.cafe.id.clone()),
        );

        let err = scoped.record_receipt(&f.latte.id, &other.id, day(1), 1).await.unwrap_err();
        assert!(matches!(err, QueryError::OutOfScope { .. }));
        assert!(scoped.record_receipt(&f.latte.id, &f.cafe.id, day(1), 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_correction_clears_count() {
        let f = fixture().await;
        let (p, s) = (f.latte.id.as_str(), f.cafe.id.as_str());
        f.ledger.record_receipt(p, s, day(1), 10).await.unwrap();
        f.ledger.record_count(p, s, day(1), 2).await.unwrap();

        let fix = StockCorrection {
            actual_stock: Some(None),
            stock_added: Some(12),
            closing_stock: Some(12),
            ..Default::default()
        };
        let corrected = f.ledger.correct(p, s, day(1), &fix).await.unwrap();
        assert_eq!(corrected.actual_stock, None);
        assert_eq!(corrected.stock_added, 12);
        assert_eq!(corrected.closing_stock, 12);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_all_land() {
        let f = fixture().await;
        let ledger = Arc::new(f.ledger);
        let (p, s) = (f.latte.id.clone(), f.cafe.id.clone());
        ledger.record_receipt(&p, &s, day(1), 100).await.unwrap();

        let sales: Vec<_> = (0..20)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let (p, s) = (p.clone(), s.clone());
                tokio::spawn(async move { ledger.record_sale(&p, &s, day(1), 1).await })
            })
            .collect();
        for sale in sales {
            sale.await.unwrap().unwrap();
        }

        let row = f.db.stock_entries().get(&p, &s, day(1)).await.unwrap().unwrap();
        assert_eq!(row.closing_stock, 80);
    }

    #[tokio::test]
    async fn test_price_update_reprices_history() {
        let f = fixture().await;
        let (p, s) = (f.latte.id.as_str(), f.cafe.id.as_str());
        f.ledger.record_receipt(p, s, day(1), 10).await.unwrap();
        f.ledger.record_sale(p, s, day(1), 2).await.unwrap();

        let mut rx = f.ledger.bus().subscribe();
        let product = f.ledger.update_prices(p, 1200, Some(700)).await.unwrap();
        assert_eq!(product.price_cents, 1200);

        let signal = rx.recv().await.unwrap();
        assert_eq!(signal.reason, "price");
        assert!(signal.touches(CacheKey::Products));
        assert!(signal.touches(CacheKey::Stocks));

        let row = f.db.stock_entries().get(p, s, day(1)).await.unwrap().unwrap();
        assert_eq!(row.price_cents, 1200);
        assert_eq!(row.cost_price_cents, Some(700));
    }

    #[tokio::test]
    async fn test_price_update_rules() {
        let f = fixture().await;
        let scoped = StockLedger::new(
            Arc::clone(&f.db),
            InvalidationBus::default(),
            SessionContext::new("u2", "Sam").with_store_scope(f.cafe.id.clone()),
        );
        let err = scoped.update_prices(&f.latte.id, 900, None).await.unwrap_err();
        assert!(matches!(err, QueryError::OutOfScope { .. }));

        let err = f.ledger.update_prices(&f.latte.id, -1, None).await.unwrap_err();
        assert!(matches!(err, QueryError::Db(tally_db::DbError::Invalid(_))));

        let err = f.ledger.update_prices("ghost", 900, None).await.unwrap_err();
        assert!(matches!(err, QueryError::Db(e) if e.is_not_found()));

        let unchanged = f.db.products().get_by_id(&f.latte.id).await.unwrap().unwrap();
        assert_eq!(unchanged.price_cents, 1000);
    }
}
