//! # Reconciliation Engine
//!
//! Derives financial and inventory signals from raw stock rows.
//!
//! ## Per-Row Metrics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  opening 100 ── sold 15 ──► closing 85 ── counted ──► actual 80        │
//! │                                                                         │
//! │  units_sold     = opening − closing              = 15                   │
//! │  sales_amount   = units_sold × price             = 15 × 10 = 150        │
//! │  profit         = sales − units_sold × cost      = 150 − 90 = 60        │
//! │  shortage_units = max(closing − actual, 0)       = 5                    │
//! │  shortage_loss  = shortage_units × cost          = 5 × 6 = 30           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Shortage is valued at cost, not sale price: the missing unit was never
//! sold, it is shrinkage.
//!
//! Nothing here can fail. A missing cost is zero; a missing count means no
//! shortage; negative units sold flow through unclamped.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::ops::Add;
use ts_rs::TS;

use crate::money::Money;
use crate::types::StockEntry;

// =============================================================================
// Per-Row Metrics
// =============================================================================

/// `opening_stock − closing_stock`. May be negative on correction days.
#[inline]
pub fn units_sold(entry: &StockEntry) -> i64 {
    entry.opening_stock.saturating_sub(entry.closing_stock)
}

/// `units_sold × price`.
#[inline]
pub fn sales_amount(entry: &StockEntry) -> Money {
    entry.price().times(units_sold(entry))
}

/// `units_sold × price − units_sold × cost`, cost defaulting to zero.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use tally_core::reconciliation::profit;
/// use tally_core::StockEntry;
///
/// let mut e = StockEntry::blank("p", "s", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
/// e.opening_stock = 10;
/// e.closing_stock = 12; // correction: two units came back
/// e.price_cents = 500;
/// e.cost_price_cents = Some(300);
/// assert_eq!(profit(&e).cents(), -400);
/// ```
#[inline]
pub fn profit(entry: &StockEntry) -> Money {
    let sold = units_sold(entry);
    entry.price().times(sold) - entry.cost().times(sold)
}

/// Units missing from the shelf: `closing − actual` when positive, otherwise
/// zero. Zero when no physical count has been taken.
#[inline]
pub fn shortage_units(entry: &StockEntry) -> i64 {
    match entry.actual_stock {
        Some(actual) => entry.closing_stock.saturating_sub(actual).max(0),
        None => 0,
    }
}

/// Shortage valued at cost. Never negative.
#[inline]
pub fn shortage_loss(entry: &StockEntry) -> Money {
    let missing = shortage_units(entry);
    if missing == 0 {
        return Money::zero();
    }
    entry.cost().times(missing)
}

/// Counts rows that are physically short but carry no cost price.
///
/// Those rows report zero shrinkage loss, so the report surfaces how many
/// of them were hidden from the loss total.
pub fn uncosted_shortages<I>(entries: I) -> usize
where
    I: IntoIterator,
    I::Item: Borrow<StockEntry>,
{
    entries
        .into_iter()
        .filter(|e| {
            let e: &StockEntry = e.borrow();
            e.is_uncosted() && shortage_units(e) > 0
        })
        .count()
}

// =============================================================================
// Summary
// =============================================================================

/// Totals over a set of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockSummary {
    pub total_sold: i64,
    pub total_sales: Money,
    pub total_profit: Money,
    pub total_product_loss: Money,
}

impl StockSummary {
    /// Folds one more row into the running totals.
    pub fn push(&mut self, entry: &StockEntry) {
        self.total_sold = self.total_sold.saturating_add(units_sold(entry));
        self.total_sales += sales_amount(entry);
        self.total_profit += profit(entry);
        self.total_product_loss += shortage_loss(entry);
    }
}

/// Element-wise sum, so partial summaries can be combined.
impl Add for StockSummary {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        StockSummary {
            total_sold: self.total_sold.saturating_add(other.total_sold),
            total_sales: self.total_sales + other.total_sales,
            total_profit: self.total_profit + other.total_profit,
            total_product_loss: self.total_product_loss + other.total_product_loss,
        }
    }
}

/// Single left-to-right fold over the rows. Empty input yields all zeros.
pub fn summarize<I>(entries: I) -> StockSummary
where
    I: IntoIterator,
    I::Item: Borrow<StockEntry>,
{
    entries
        .into_iter()
        .fold(StockSummary::default(), |mut acc, e| {
            acc.push(e.borrow());
            acc
        })
}

// =============================================================================
// Grouped Summaries
// =============================================================================

/// Dimension to break a summary down by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Dimension {
    Store,
    Product,
}

impl std::str::FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "store" | "shop" => Ok(Dimension::Store),
            "product" => Ok(Dimension::Product),
            other => Err(format!("unknown dimension '{other}'")),
        }
    }
}

/// One line of a grouped summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GroupSummary {
    /// Store or product id.
    pub key: String,
    /// Store or product display name.
    pub name: String,
    /// Number of rows folded into this group.
    pub rows: usize,
    pub summary: StockSummary,
}

/// Breaks the rows down per store or per product.
///
/// Groups appear in order of first appearance, so a date-sorted input yields
/// groups in the order they first traded.
pub fn summarize_by<I>(entries: I, dimension: Dimension) -> Vec<GroupSummary>
where
    I: IntoIterator,
    I::Item: Borrow<StockEntry>,
{
    let mut groups: Vec<GroupSummary> = Vec::new();
    let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for item in entries {
        let entry: &StockEntry = item.borrow();
        let (key, name) = match dimension {
            Dimension::Store => (&entry.shop_id, &entry.store_name),
            Dimension::Product => (&entry.product_id, &entry.product_name),
        };

        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(GroupSummary {
                key: key.clone(),
                name: name.clone(),
                rows: 0,
                summary: StockSummary::default(),
            });
            groups.len() - 1
        });

        let group = &mut groups[slot];
        group.rows += 1;
        group.summary.push(entry);
    }

    groups
}

// =============================================================================
// Presentation Row
// =============================================================================

/// A stock row with every derived metric precomputed for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReconciledEntry {
    #[serde(flatten)]
    pub entry: StockEntry,
    pub units_sold: i64,
    pub sales_amount: Money,
    pub profit: Money,
    pub shortage_units: i64,
    pub product_loss: Money,
}

impl From<&StockEntry> for ReconciledEntry {
    fn from(entry: &StockEntry) -> Self {
        ReconciledEntry {
            units_sold: units_sold(entry),
            sales_amount: sales_amount(entry),
            profit: profit(entry),
            shortage_units: shortage_units(entry),
            product_loss: shortage_loss(entry),
            entry: entry.clone(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn entry(opening: i64, closing: i64, actual: Option<i64>, price: i64, cost: Option<i64>) -> StockEntry {
        let mut e = StockEntry::blank("p1", "s1", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        e.opening_stock = opening;
        e.closing_stock = closing;
        e.actual_stock = actual;
        e.price_cents = price;
        e.cost_price_cents = cost;
        e
    }

    #[test]
    fn test_reference_scenario() {
        let e = entry(100, 85, Some(80), 1000, Some(600));
        assert_eq!(units_sold(&e), 15);
        assert_eq!(sales_amount(&e).cents(), 15_000);
        assert_eq!(profit(&e).cents(), 6_000);
        assert_eq!(shortage_units(&e), 5);
        assert_eq!(shortage_loss(&e).cents(), 3_000);
    }

    #[test]
    fn test_no_count_means_no_shortage() {
        let e = entry(100, 40, None, 1000, Some(600));
        assert_eq!(shortage_units(&e), 0);
        assert!(shortage_loss(&e).is_zero());
    }

    #[test]
    fn test_surplus_is_not_a_credit() {
        let e = entry(100, 85, Some(90), 1000, Some(600));
        assert_eq!(shortage_units(&e), 0);
        assert!(shortage_loss(&e).is_zero());
    }

    #[test]
    fn test_uncosted_product() {
        let e = entry(10, 4, Some(1), 250, None);
        assert_eq!(profit(&e).cents(), 6 * 250);
        assert!(shortage_loss(&e).is_zero());
        assert_eq!(uncosted_shortages([&e]), 1);
    }

    #[test]
    fn test_negative_units_sold_is_symmetric() {
        let e = entry(5, 8, None, 400, Some(100));
        assert_eq!(units_sold(&e), -3);
        assert_eq!(sales_amount(&e).cents(), -1200);
        assert_eq!(profit(&e).cents(), -900);
    }

    #[test]
    fn test_summarize_empty() {
        let empty: Vec<StockEntry> = Vec::new();
        assert_eq!(summarize(&empty), StockSummary::default());
    }

    #[test]
    fn test_summarize_totals() {
        let rows = vec![
            entry(100, 85, Some(80), 1000, Some(600)),
            entry(20, 10, None, 300, None),
        ];
        let s = summarize(&rows);
        assert_eq!(s.total_sold, 25);
        assert_eq!(s.total_sales.cents(), 15_000 + 3_000);
        assert_eq!(s.total_profit.cents(), 6_000 + 3_000);
        assert_eq!(s.total_product_loss.cents(), 3_000);
    }

    #[test]
    fn test_summarize_by_store_keeps_first_appearance_order() {
        let mut a = entry(10, 5, None, 100, Some(50));
        a.shop_id = "s2".into();
        a.store_name = "Harbour".into();
        let mut b = entry(10, 8, None, 100, Some(50));
        b.shop_id = "s1".into();
        b.store_name = "Station".into();
        let mut c = entry(4, 0, None, 100, Some(50));
        c.shop_id = "s2".into();
        c.store_name = "Harbour".into();

        let groups = summarize_by(vec![&a, &b, &c], Dimension::Store);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "s2");
        assert_eq!(groups[0].name, "Harbour");
        assert_eq!(groups[0].rows, 2);
        assert_eq!(groups[0].summary.total_sold, 9);
        assert_eq!(groups[1].key, "s1");
        assert_eq!(groups[1].summary.total_sold, 2);
    }

    #[test]
    fn test_reconciled_entry() {
        let e = entry(100, 85, Some(80), 1000, Some(600));
        let row = ReconciledEntry::from(&e);
        assert_eq!(row.units_sold, 15);
        assert_eq!(row.profit.cents(), 6_000);
        assert_eq!(row.product_loss.cents(), 3_000);

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["product_id"], "p1");
        assert_eq!(json["units_sold"], 15);
    }

    fn arb_entry() -> impl Strategy<Value = StockEntry> {
        (
            0i64..10_000,
            0i64..10_000,
            proptest::option::of(0i64..10_000),
            0i64..100_000,
            proptest::option::of(0i64..100_000),
        )
            .prop_map(|(o, c, a, p, cost)| entry(o, c, a, p, cost))
    }

    proptest! {
        #[test]
        fn profit_matches_formula(e in arb_entry()) {
            let sold = e.opening_stock - e.closing_stock;
            let expected = sold * e.price_cents - sold * e.cost_price_cents.unwrap_or(0);
            prop_assert_eq!(profit(&e).cents(), expected);
        }

        #[test]
        fn shortage_loss_never_negative(e in arb_entry()) {
            let loss = shortage_loss(&e);
            prop_assert!(!loss.is_negative());
            match e.actual_stock {
                None => prop_assert!(loss.is_zero()),
                Some(actual) if actual >= e.closing_stock => prop_assert!(loss.is_zero()),
                Some(_) => {}
            }
        }

        #[test]
        fn summary_is_additive(
            a in proptest::collection::vec(arb_entry(), 0..20),
            b in proptest::collection::vec(arb_entry(), 0..20),
        ) {
            let joined: Vec<StockEntry> = a.iter().chain(b.iter()).cloned().collect();
            prop_assert_eq!(summarize(&joined), summarize(&a) + summarize(&b));
        }
    }
}
