//! # Sort Layer
//!
//! Stable ordering of stock rows over the calendar date or a derived metric.
//!
//! ```text
//! sort field      key
//! ─────────────   ──────────────────────────────
//! date            stock_date
//! units_sold      opening − closing
//! sales_amount    units_sold × price
//! profit          sales − units_sold × cost
//! product_loss    shortage × cost
//! <anything else> no-op, input order preserved
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::str::FromStr;
use ts_rs::TS;

use crate::reconciliation::{profit, sales_amount, shortage_loss, units_sold};
use crate::types::StockEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SortField {
    Date,
    UnitsSold,
    SalesAmount,
    Profit,
    ProductLoss,
}

impl SortField {
    /// Parses a request parameter; unknown names yield `None`.
    pub fn parse(param: &str) -> Option<Self> {
        match param.trim() {
            "date" | "stock_date" => Some(SortField::Date),
            "units_sold" => Some(SortField::UnitsSold),
            "sales_amount" => Some(SortField::SalesAmount),
            "profit" => Some(SortField::Profit),
            "product_loss" => Some(SortField::ProductLoss),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Date => "date",
            SortField::UnitsSold => "units_sold",
            SortField::SalesAmount => "sales_amount",
            SortField::Profit => "profit",
            SortField::ProductLoss => "product_loss",
        }
    }

    fn compare(&self, a: &StockEntry, b: &StockEntry) -> Ordering {
        match self {
            SortField::Date => a.stock_date.cmp(&b.stock_date),
            SortField::UnitsSold => units_sold(a).cmp(&units_sold(b)),
            SortField::SalesAmount => sales_amount(a).cmp(&sales_amount(b)),
            SortField::Profit => profit(a).cmp(&profit(b)),
            SortField::ProductLoss => shortage_loss(a).cmp(&shortage_loss(b)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// `"asc"` (any case) is ascending; everything else is descending.
    pub fn parse(param: &str) -> Self {
        if param.trim().eq_ignore_ascii_case("asc") {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        }
    }
}

impl FromStr for SortDirection {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SortDirection::parse(s))
    }
}

/// Field and direction of a sort. `field: None` leaves order untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SortSpec {
    pub field: Option<SortField>,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        SortSpec {
            field: Some(field),
            direction,
        }
    }

    pub fn from_params(field: &str, direction: &str) -> Self {
        SortSpec {
            field: SortField::parse(field),
            direction: SortDirection::parse(direction),
        }
    }
}

/// Returns a new, stably sorted sequence. The input is not modified.
///
/// Works over owned rows or references (`&StockEntry`), so it composes with
/// [`crate::filter::filter_entries`] without cloning.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use tally_core::{sort_entries, SortDirection, SortField, SortSpec, StockEntry};
///
/// let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// let rows: Vec<StockEntry> = [1, 5, 3]
///     .into_iter()
///     .map(|sold| {
///         let mut e = StockEntry::blank(&format!("p{sold}"), "s1", day);
///         e.opening_stock = sold;
///         e.price_cents = 1000;
///         e
///     })
///     .collect();
///
/// let sorted = sort_entries(&rows, SortSpec::new(SortField::Profit, SortDirection::Desc));
/// let ids: Vec<&str> = sorted.iter().map(|e| e.product_id.as_str()).collect();
/// assert_eq!(ids, ["p5", "p3", "p1"]);
/// ```
pub fn sort_entries<E>(entries: &[E], spec: SortSpec) -> Vec<E>
where
    E: Borrow<StockEntry> + Clone,
{
    let mut sorted = entries.to_vec();

    let Some(field) = spec.field else {
        return sorted;
    };

    // slice::sort_by is stable: equal keys keep their input order
    sorted.sort_by(|a, b| {
        let ord = field.compare(a.borrow(), b.borrow());
        match spec.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });

    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn row(id: &str, day: u32, opening: i64, closing: i64, price: i64) -> StockEntry {
        let mut e = StockEntry::blank(id, "s1", NaiveDate::from_ymd_opt(2024, 3, day).unwrap());
        e.opening_stock = opening;
        e.closing_stock = closing;
        e.price_cents = price;
        e.cost_price_cents = Some(0);
        e
    }

    fn ids<E: Borrow<StockEntry>>(rows: &[E]) -> Vec<String> {
        rows.iter()
            .map(|e| {
                let e: &StockEntry = e.borrow();
                e.product_id.clone()
            })
            .collect()
    }

    #[test]
    fn test_profit_desc() {
        // profits 10, 50, 30
        let rows = vec![row("a", 1, 1, 0, 10), row("b", 1, 5, 0, 10), row("c", 1, 3, 0, 10)];
        let sorted = sort_entries(&rows, SortSpec::from_params("profit", "desc"));
        assert_eq!(ids(&sorted), ["b", "c", "a"]);
        // input untouched
        assert_eq!(ids(&rows), ["a", "b", "c"]);
    }

    #[test]
    fn test_date_asc() {
        let rows = vec![row("a", 3, 0, 0, 0), row("b", 1, 0, 0, 0), row("c", 2, 0, 0, 0)];
        let sorted = sort_entries(&rows, SortSpec::from_params("date", "asc"));
        assert_eq!(ids(&sorted), ["b", "c", "a"]);
    }

    #[test]
    fn test_units_sold_and_sales_amount() {
        let rows = vec![row("a", 1, 10, 2, 100), row("b", 1, 10, 5, 500)];
        let by_units = sort_entries(&rows, SortSpec::new(SortField::UnitsSold, SortDirection::Desc));
        assert_eq!(ids(&by_units), ["a", "b"]);
        let by_sales = sort_entries(&rows, SortSpec::new(SortField::SalesAmount, SortDirection::Desc));
        assert_eq!(ids(&by_sales), ["b", "a"]);
    }

    #[test]
    fn test_product_loss() {
        let mut a = row("a", 1, 10, 10, 0);
        a.actual_stock = Some(9);
        a.cost_price_cents = Some(100);
        let mut b = row("b", 1, 10, 10, 0);
        b.actual_stock = Some(5);
        b.cost_price_cents = Some(100);
        let rows = vec![a, b];
        let sorted = sort_entries(&rows, SortSpec::from_params("product_loss", "asc"));
        assert_eq!(ids(&sorted), ["a", "b"]);
    }

    #[test]
    fn test_unknown_field_is_noop() {
        let rows = vec![row("a", 3, 1, 0, 1), row("b", 1, 9, 0, 1)];
        let spec = SortSpec::from_params("colour", "asc");
        assert_eq!(spec.field, None);
        assert_eq!(ids(&sort_entries(&rows, spec)), ["a", "b"]);
    }

    #[test]
    fn test_sorts_references() {
        let rows = vec![row("a", 2, 0, 0, 0), row("b", 1, 0, 0, 0)];
        let refs: Vec<&StockEntry> = rows.iter().collect();
        let sorted = sort_entries(&refs, SortSpec::new(SortField::Date, SortDirection::Asc));
        assert_eq!(ids(&sorted), ["b", "a"]);
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(SortDirection::parse("ASC"), SortDirection::Asc);
        assert_eq!(SortDirection::parse("desc"), SortDirection::Desc);
        assert_eq!(SortDirection::parse(""), SortDirection::Desc);
        assert_eq!(SortField::parse("units_sold").map(|f| f.as_str()), Some("units_sold"));
    }

    proptest! {
        /// Equal keys keep their input order in both directions.
        #[test]
        fn sort_is_stable(keys in proptest::collection::vec(0i64..4, 0..40), asc in any::<bool>()) {
            let rows: Vec<StockEntry> = keys
                .iter()
                .enumerate()
                .map(|(i, k)| row(&format!("{i}"), 1, *k, 0, 1))
                .collect();
            let direction = if asc { SortDirection::Asc } else { SortDirection::Desc };
            let sorted = sort_entries(&rows, SortSpec::new(SortField::UnitsSold, direction));

            for pair in sorted.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                if a.opening_stock == b.opening_stock {
                    let ia: usize = a.product_id.parse().unwrap();
                    let ib: usize = b.product_id.parse().unwrap();
                    prop_assert!(ia < ib);
                }
            }
        }
    }
}
