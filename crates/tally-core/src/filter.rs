//! # Filter Layer
//!
//! Narrows a set of stock rows to a view subset without touching the source.
//!
//! Three criteria, AND-ed together:
//! - search term: case-insensitive substring of product name, store name or
//!   operator name; empty matches everything
//! - store selection: `All` or exact store id
//! - product selection: `All` or exact product id

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{Selection, StockEntry};

/// Filter criteria for a stock report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockFilter {
    pub search: String,
    pub store: Selection,
    pub product: Selection,
}

impl StockFilter {
    /// Builds a filter from raw request parameters, sentinels included.
    pub fn from_params(search: &str, store: &str, product: &str) -> Self {
        StockFilter {
            search: search.to_string(),
            store: Selection::parse(store),
            product: Selection::parse(product),
        }
    }

    /// True when no criterion narrows the set.
    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty() && self.store.is_all() && self.product.is_all()
    }

    /// Evaluates the filter against a single row.
    pub fn matches(&self, entry: &StockEntry) -> bool {
        self.matches_with(entry, &self.needle())
    }

    fn needle(&self) -> String {
        self.search.trim().to_lowercase()
    }

    /// `needle` is [`Self::needle`], computed once per pass.
    fn matches_with(&self, entry: &StockEntry, needle: &str) -> bool {
        self.store.matches(&entry.shop_id)
            && self.product.matches(&entry.product_id)
            && matches_search(entry, needle)
    }
}

/// `needle` must already be lowercased.
fn matches_search(entry: &StockEntry, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }

    entry.product_name.to_lowercase().contains(needle)
        || entry.store_name.to_lowercase().contains(needle)
        || entry
            .operator_name
            .as_deref()
            .is_some_and(|op| op.to_lowercase().contains(needle))
}

/// Returns the rows matching `filter`, in input order.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use tally_core::{filter_entries, StockEntry, StockFilter};
///
/// let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// let mut cola = StockEntry::blank("p1", "s1", day);
/// cola.product_name = "Diet Cola".into();
/// let mut chips = StockEntry::blank("p2", "s1", day);
/// chips.product_name = "Chips".into();
///
/// let rows = vec![cola, chips];
/// let hits = filter_entries(&rows, &StockFilter::from_params("cola", "all", "all"));
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].product_name, "Diet Cola");
/// ```
pub fn filter_entries<'a>(entries: &'a [StockEntry], filter: &StockFilter) -> Vec<&'a StockEntry> {
    let needle = filter.needle();

    entries
        .iter()
        .filter(|e| filter.matches_with(e, &needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn row(product_id: &str, product: &str, shop_id: &str, store: &str, op: Option<&str>) -> StockEntry {
        let mut e = StockEntry::blank(product_id, shop_id, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        e.product_name = product.to_string();
        e.store_name = store.to_string();
        e.operator_name = op.map(str::to_string);
        e
    }

    fn sample() -> Vec<StockEntry> {
        vec![
            row("p1", "Diet Cola", "s1", "Harbour Café", None),
            row("p2", "Chips", "s1", "Harbour Café", Some("Maria")),
            row("p1", "Diet Cola", "s2", "Station Kiosk", Some("Sam")),
            row("p3", "Flat White", "s2", "Station Kiosk", None),
        ]
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let rows = sample();
        let hits = filter_entries(&rows, &StockFilter::from_params("COLA", "", ""));
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|e| e.product_name == "Diet Cola"));
    }

    #[test]
    fn test_search_matches_store_name() {
        let rows = sample();
        let hits = filter_entries(&rows, &StockFilter::from_params("kiosk", "all", "all"));
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|e| e.shop_id == "s2"));
    }

    #[test]
    fn test_search_matches_operator_name() {
        let rows = sample();
        let hits = filter_entries(&rows, &StockFilter::from_params("mar", "all", "all"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].product_id, "p2");
    }

    #[test]
    fn test_store_and_product_are_anded() {
        let rows = sample();
        let hits = filter_entries(&rows, &StockFilter::from_params("", "s2", "p1"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].operator_name.as_deref(), Some("Sam"));

        let none = filter_entries(&rows, &StockFilter::from_params("chips", "s2", "_all"));
        assert!(none.is_empty());
    }

    #[test]
    fn test_matches_agrees_with_filter_entries() {
        let rows = sample();
        let filter = StockFilter::from_params("café", "all", "p2");
        let via_slice = filter_entries(&rows, &filter).len();
        let via_row = rows.iter().filter(|e| filter.matches(e)).count();
        assert_eq!(via_slice, via_row);
        assert!(!filter.is_empty());
        assert!(StockFilter::default().is_empty());
    }

    proptest! {
        #[test]
        fn empty_filter_is_identity(names in proptest::collection::vec("[a-zA-Z ]{0,12}", 0..30)) {
            let rows: Vec<StockEntry> = names
                .iter()
                .enumerate()
                .map(|(i, n)| row(&format!("p{i}"), n, "s1", "Store", None))
                .collect();
            let hits = filter_entries(&rows, &StockFilter::from_params("", "all", "all"));
            prop_assert_eq!(hits.len(), rows.len());
            for (hit, original) in hits.iter().zip(rows.iter()) {
                prop_assert!(std::ptr::eq(*hit, original));
            }
        }

        #[test]
        fn row_and_slice_filters_agree(
            search in "[a-zA-Z ]{0,4}",
            store in prop::sample::select(vec!["all", "s1", "s2"]),
            product in prop::sample::select(vec!["all", "p1", "p2", "p3"]),
        ) {
            let rows = sample();
            let filter = StockFilter::from_params(&search, store, product);
            let via_slice: Vec<&str> = filter_entries(&rows, &filter)
                .iter()
                .map(|e| e.id.as_str())
                .collect();
            let via_row: Vec<&str> = rows
                .iter()
                .filter(|e| filter.matches(e))
                .map(|e| e.id.as_str())
                .collect();
            prop_assert_eq!(via_slice, via_row);
        }
    }
}
