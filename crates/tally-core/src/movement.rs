//! # Stock Movements
//!
//! The row lifecycle as pure functions. Each movement takes the current row
//! and returns the next one; persisting it is the caller's job.
//!
//! ## Lifecycle of One Row
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  open_day(product, store, date, prior)                                  │
//! │    opening = prior.actual ?? prior.closing ?? 0                         │
//! │    closing = opening                                                    │
//! │       │                                                                 │
//! │       ├── apply_receipt(qty)   added += qty, closing += qty             │
//! │       ├── apply_sale(qty)      closing −= qty  (never below zero)       │
//! │       ├── apply_count(n)       actual = n                               │
//! │       └── apply_correction(c)  overwrite counts after validation        │
//! │                                                                         │
//! │  Rows are never deleted.                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Once a physical count exists, later receipts and sales move it along with
//! the expected closing figure, so a mid-day count is not invalidated by
//! trading that happens after it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::{natural_key, Product, StockEntry, Store};
use crate::validation::{validate_quantity, validate_stock_level};

// =============================================================================
// Opening a Day
// =============================================================================

/// Opening stock carried forward from the previous row.
///
/// The last physical count wins over the system figure.
pub fn carried_opening(prior: Option<&StockEntry>) -> i64 {
    match prior {
        Some(p) => p.actual_stock.unwrap_or(p.closing_stock).max(0),
        None => 0,
    }
}

/// Creates the row for `product` in `store` on `date`.
///
/// Joined display fields are filled from the product and store so the row is
/// report-ready without another lookup.
///
/// ## Example
/// ```rust
/// use chrono::{NaiveDate, Utc};
/// use tally_core::movement::open_day;
/// use tally_core::{Product, StockEntry, Store};
///
/// let now = Utc::now();
/// let product = Product {
///     id: "p1".into(), sku: "COLA".into(), name: "Cola".into(),
///     price_cents: 250, cost_price_cents: Some(120), is_active: true,
///     created_at: now, updated_at: now,
/// };
/// let store = Store { id: "s1".into(), name: "Kiosk".into(), is_active: true, created_at: now, updated_at: now };
///
/// let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
/// let mut yesterday = StockEntry::blank("p1", "s1", monday.pred_opt().unwrap());
/// yesterday.closing_stock = 12;
/// yesterday.actual_stock = Some(10);
///
/// let today = open_day(&product, &store, monday, Some(&yesterday));
/// assert_eq!(today.opening_stock, 10);
/// assert_eq!(today.closing_stock, 10);
/// assert_eq!(today.actual_stock, None);
/// ```
pub fn open_day(
    product: &Product,
    store: &Store,
    date: NaiveDate,
    prior: Option<&StockEntry>,
) -> StockEntry {
    let opening = carried_opening(prior);

    StockEntry {
        id: natural_key(&product.id, &store.id, date),
        product_id: product.id.clone(),
        shop_id: store.id.clone(),
        stock_date: date,
        opening_stock: opening,
        closing_stock: opening,
        stock_added: 0,
        actual_stock: None,
        product_name: product.name.clone(),
        price_cents: product.price_cents,
        cost_price_cents: product.cost_price_cents,
        store_name: store.name.clone(),
        operator_name: None,
    }
}

// =============================================================================
// Movements
// =============================================================================

/// Records a sale of `qty` units.
///
/// ## Errors
/// - `Validation` if `qty` is not a positive quantity
/// - `InsufficientStock` if `qty` exceeds the expected closing stock
pub fn apply_sale(entry: &StockEntry, qty: i64) -> CoreResult<StockEntry> {
    validate_quantity(qty)?;

    if qty > entry.closing_stock {
        return Err(CoreError::InsufficientStock {
            product_id: entry.product_id.clone(),
            available: entry.closing_stock,
            requested: qty,
        });
    }

    let mut next = entry.clone();
    next.closing_stock -= qty;
    next.actual_stock = next.actual_stock.map(|a| (a - qty).max(0));
    Ok(next)
}

/// Records `qty` units received into the store.
pub fn apply_receipt(entry: &StockEntry, qty: i64) -> CoreResult<StockEntry> {
    validate_quantity(qty)?;

    let mut next = entry.clone();
    next.stock_added = next.stock_added.saturating_add(qty);
    next.closing_stock = next.closing_stock.saturating_add(qty);
    next.actual_stock = next.actual_stock.map(|a| a.saturating_add(qty));
    Ok(next)
}

/// Records a physical count. Zero is a valid count.
pub fn apply_count(entry: &StockEntry, counted: i64) -> CoreResult<StockEntry> {
    validate_stock_level("actual_stock", counted)?;

    let mut next = entry.clone();
    next.actual_stock = Some(counted);
    Ok(next)
}

/// A manual overwrite of a row's counts.
///
/// `None` leaves that count unchanged. `actual_stock: Some(None)` clears a
/// physical count that was recorded by mistake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockCorrection {
    pub opening_stock: Option<i64>,
    pub closing_stock: Option<i64>,
    pub stock_added: Option<i64>,
    #[serde(default, with = "double_option")]
    #[ts(type = "number | null | undefined")]
    pub actual_stock: Option<Option<i64>>,
}

impl StockCorrection {
    pub fn is_empty(&self) -> bool {
        self.opening_stock.is_none()
            && self.closing_stock.is_none()
            && self.stock_added.is_none()
            && self.actual_stock.is_none()
    }
}

/// Applies a manual correction after validating every supplied count.
///
/// Nothing is applied unless all supplied figures are valid.
pub fn apply_correction(entry: &StockEntry, correction: &StockCorrection) -> CoreResult<StockEntry> {
    if let Some(v) = correction.opening_stock {
        validate_stock_level("opening_stock", v)?;
    }
    if let Some(v) = correction.closing_stock {
        validate_stock_level("closing_stock", v)?;
    }
    if let Some(v) = correction.stock_added {
        validate_stock_level("stock_added", v)?;
    }
    if let Some(Some(v)) = correction.actual_stock {
        validate_stock_level("actual_stock", v)?;
    }

    let mut next = entry.clone();
    if let Some(v) = correction.opening_stock {
        next.opening_stock = v;
    }
    if let Some(v) = correction.closing_stock {
        next.closing_stock = v;
    }
    if let Some(v) = correction.stock_added {
        next.stock_added = v;
    }
    if let Some(actual) = correction.actual_stock {
        next.actual_stock = actual;
    }
    Ok(next)
}

/// Distinguishes an absent field (no change) from an explicit `null` (clear).
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<Option<i64>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<i64>::deserialize(deserializer).map(Some)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::reconciliation::{shortage_units, units_sold};
    use chrono::Utc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn product() -> Product {
        let now = Utc::now();
        Product {
            id: "p1".to_string(),
            sku: "LATTE".to_string(),
            name: "Latte".to_string(),
            price_cents: 450,
            cost_price_cents: Some(150),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn store() -> Store {
        let now = Utc::now();
        Store {
            id: "s1".to_string(),
            name: "Harbour Café".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn opened(opening: i64) -> StockEntry {
        let mut prior = StockEntry::blank("p1", "s1", day(1));
        prior.closing_stock = opening;
        open_day(&product(), &store(), day(2), Some(&prior))
    }

    #[test]
    fn test_open_day_without_prior() {
        let entry = open_day(&product(), &store(), day(2), None);
        assert_eq!(entry.id, "p1:s1:2024-03-02");
        assert_eq!(entry.opening_stock, 0);
        assert_eq!(entry.closing_stock, 0);
        assert_eq!(entry.product_name, "Latte");
        assert_eq!(entry.store_name, "Harbour Café");
        assert_eq!(entry.cost_price_cents, Some(150));
    }

    #[test]
    fn test_open_day_prefers_actual_over_closing() {
        let mut prior = StockEntry::blank("p1", "s1", day(1));
        prior.closing_stock = 20;
        assert_eq!(carried_opening(Some(&prior)), 20);
        prior.actual_stock = Some(17);
        assert_eq!(carried_opening(Some(&prior)), 17);
        assert_eq!(carried_opening(None), 0);
    }

    #[test]
    fn test_sale_reduces_closing() {
        let entry = apply_sale(&opened(10), 4).unwrap();
        assert_eq!(entry.closing_stock, 6);
        assert_eq!(units_sold(&entry), 4);
    }

    #[test]
    fn test_sale_rejects_oversell() {
        let err = apply_sale(&opened(3), 5).unwrap_err();
        match err {
            CoreError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sale_rejects_non_positive() {
        assert!(matches!(
            apply_sale(&opened(3), 0),
            Err(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));
        assert!(apply_sale(&opened(3), -2).is_err());
    }

    #[test]
    fn test_receipt_then_sale() {
        let entry = apply_receipt(&opened(5), 10).unwrap();
        assert_eq!(entry.stock_added, 10);
        assert_eq!(entry.closing_stock, 15);

        let entry = apply_sale(&entry, 12).unwrap();
        assert_eq!(entry.closing_stock, 3);
        // opening 5 − closing 3: receipts do not count as sales
        assert_eq!(units_sold(&entry), 2);
    }

    #[test]
    fn test_count_records_shortage() {
        let entry = apply_count(&opened(10), 7).unwrap();
        assert_eq!(entry.actual_stock, Some(7));
        assert_eq!(shortage_units(&entry), 3);
        assert!(apply_count(&entry, -1).is_err());
    }

    #[test]
    fn test_movements_after_count_keep_shortage() {
        let counted = apply_count(&opened(10), 8).unwrap();
        let sold = apply_sale(&counted, 3).unwrap();
        assert_eq!(sold.actual_stock, Some(5));
        let received = apply_receipt(&sold, 4).unwrap();
        assert_eq!(received.actual_stock, Some(9));
        assert_eq!(shortage_units(&received), 2);
    }

    #[test]
    fn test_correction_applies_supplied_fields() {
        let base = apply_count(&opened(10), 9).unwrap();
        let fix = StockCorrection {
            closing_stock: Some(8),
            actual_stock: Some(None),
            ..Default::default()
        };
        let entry = apply_correction(&base, &fix).unwrap();
        assert_eq!(entry.opening_stock, 10);
        assert_eq!(entry.closing_stock, 8);
        assert_eq!(entry.actual_stock, None);
    }

    #[test]
    fn test_correction_is_all_or_nothing() {
        let base = opened(10);
        let fix = StockCorrection {
            opening_stock: Some(4),
            stock_added: Some(-1),
            ..Default::default()
        };
        assert!(apply_correction(&base, &fix).is_err());
        assert!(StockCorrection::default().is_empty());
        assert!(!fix.is_empty());
    }

    #[test]
    fn test_correction_json_null_clears_count() {
        let clear: StockCorrection = serde_json::from_str(r#"{"actual_stock": null}"#).unwrap();
        assert_eq!(clear.actual_stock, Some(None));

        let untouched: StockCorrection = serde_json::from_str(r#"{"closing_stock": 3}"#).unwrap();
        assert_eq!(untouched.actual_stock, None);
        assert_eq!(untouched.closing_stock, Some(3));
    }
}
