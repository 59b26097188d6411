//! # Domain Types
//!
//! Core domain types used throughout Tally.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌──────────────────────┐  │
//! │  │    Product      │   │     Store       │   │     StockEntry       │  │
//! │  │  ─────────────  │   │  ─────────────  │   │  ──────────────────  │  │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  product × store ×   │  │
//! │  │  sku            │   │  name           │   │  calendar day        │  │
//! │  │  price_cents    │   └─────────────────┘   │  opening / closing   │  │
//! │  │  cost_price     │                         │  added / actual      │  │
//! │  └─────────────────┘                         │  + joined price/name │  │
//! │                                              └──────────────────────┘  │
//! │  ┌─────────────────┐   ┌─────────────────┐                              │
//! │  │   DateRange     │   │   Selection     │                              │
//! │  │  from ..= to    │   │  All | Only(id) │                              │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MAX_RANGE_DAYS};

// =============================================================================
// Product
// =============================================================================

/// A product that can be stocked and sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name, also what the report search matches against.
    pub name: String,

    /// Selling price in cents.
    pub price_cents: i64,

    /// Cost in cents. `None` means the product was never costed.
    pub cost_price_cents: Option<i64>,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_optional_cents(self.cost_price_cents)
    }
}

// =============================================================================
// Store
// =============================================================================

/// A shop or café location holding its own stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Stock Entry
// =============================================================================

/// One product in one store on one calendar day.
///
/// ## Counts
/// ```text
/// opening_stock ──(+ stock_added)──(− sold)──► closing_stock (expected)
///                                                    │
///                                   physical count ──┴──► actual_stock
///
/// closing − actual > 0  ⇒  shortage (valued at cost)
/// ```
///
/// Missing or null numeric fields in incoming JSON default to zero so
/// totals stay computable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockEntry {
    pub id: String,
    pub product_id: String,
    pub shop_id: String,

    /// Calendar day, no time component.
    #[ts(as = "String")]
    pub stock_date: NaiveDate,

    /// Carried from the prior day's actual (or closing) count.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub opening_stock: i64,

    /// System-expected remaining: opening + added − sold.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub closing_stock: i64,

    /// Received during the day.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub stock_added: i64,

    /// Physically counted. `None` means no count taken yet.
    #[serde(default)]
    pub actual_stock: Option<i64>,

    /// Joined from the product.
    #[serde(default)]
    pub product_name: String,

    /// Joined selling price in cents.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub price_cents: i64,

    /// Joined cost in cents, `None` when the product has no cost.
    #[serde(default)]
    pub cost_price_cents: Option<i64>,

    /// Joined store display name.
    #[serde(default)]
    pub store_name: String,

    /// Whoever last recorded a movement against this row.
    #[serde(default)]
    pub operator_name: Option<String>,
}

impl StockEntry {
    /// An all-zero row for the given product, store and day.
    ///
    /// Joined display fields are left empty; the id is derived from the
    /// natural key so the same day always maps to the same row.
    pub fn blank(product_id: &str, shop_id: &str, stock_date: NaiveDate) -> Self {
        StockEntry {
            id: natural_key(product_id, shop_id, stock_date),
            product_id: product_id.to_string(),
            shop_id: shop_id.to_string(),
            stock_date,
            opening_stock: 0,
            closing_stock: 0,
            stock_added: 0,
            actual_stock: None,
            product_name: String::new(),
            price_cents: 0,
            cost_price_cents: None,
            store_name: String::new(),
            operator_name: None,
        }
    }

    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Cost price, zero when the product is un-costed.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_optional_cents(self.cost_price_cents)
    }

    /// True when the joined product carries no cost price.
    #[inline]
    pub fn is_uncosted(&self) -> bool {
        self.cost_price_cents.is_none()
    }
}

/// Reads a count or price, treating `null` as zero.
fn null_as_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Deterministic row id for a product/store/day triple.
pub fn natural_key(product_id: &str, shop_id: &str, stock_date: NaiveDate) -> String {
    format!("{product_id}:{shop_id}:{}", stock_date.format("%Y-%m-%d"))
}

// =============================================================================
// Date Range
// =============================================================================

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DateRange {
    #[ts(as = "String")]
    pub from: NaiveDate,
    #[ts(as = "String")]
    pub to: NaiveDate,
}

impl DateRange {
    /// Creates a range, rejecting inverted or overly long spans.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::NaiveDate;
    /// use tally_core::DateRange;
    ///
    /// let from = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    /// let to = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
    /// let range = DateRange::new(from, to).unwrap();
    /// assert_eq!(range.days(), 7);
    /// assert!(DateRange::new(to, from).is_err());
    /// ```
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, ValidationError> {
        if from > to {
            return Err(ValidationError::InvertedRange {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let range = DateRange { from, to };
        if range.days() > MAX_RANGE_DAYS {
            return Err(ValidationError::OutOfRange {
                field: "date range (days)".to_string(),
                min: 1,
                max: MAX_RANGE_DAYS,
            });
        }

        Ok(range)
    }

    /// A range covering a single day.
    pub fn single(day: NaiveDate) -> Self {
        DateRange { from: day, to: day }
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from <= day && day <= self.to
    }
}

// =============================================================================
// Selection
// =============================================================================

/// A store or product filter: either everything, or exactly one id.
///
/// Replaces the `""` / `"all"` / `"_all"` sentinel strings used by request
/// parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
#[ts(export)]
pub enum Selection {
    #[default]
    All,
    Only(String),
}

impl Selection {
    /// Parses a request parameter.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::Selection;
    ///
    /// assert_eq!(Selection::parse(""), Selection::All);
    /// assert_eq!(Selection::parse("all"), Selection::All);
    /// assert_eq!(Selection::parse("_all"), Selection::All);
    /// assert_eq!(Selection::parse("store-1"), Selection::Only("store-1".into()));
    /// ```
    pub fn parse(param: &str) -> Self {
        match param.trim() {
            "" | "all" | "_all" => Selection::All,
            id => Selection::Only(id.to_string()),
        }
    }

    /// Exact identity match; `All` matches every id.
    #[inline]
    pub fn matches(&self, id: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(wanted) => wanted == id,
        }
    }

    #[inline]
    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }

    /// The selected id, if narrowed.
    pub fn id(&self) -> Option<&str> {
        match self {
            Selection::All => None,
            Selection::Only(id) => Some(id),
        }
    }
}

impl From<Option<String>> for Selection {
    fn from(value: Option<String>) -> Self {
        value.map_or(Selection::All, |v| Selection::parse(&v))
    }
}

impl std::str::FromStr for Selection {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Selection::parse(s))
    }
}

// =============================================================================
// Paging
// =============================================================================

/// A 1-based page of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Creates a page request, clamping `page` to at least 1 and
    /// `page_size` into `1..=MAX_PAGE_SIZE`.
    pub fn new(page: u32, page_size: u32) -> Self {
        PageRequest {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Rows skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// Number of pages needed for `total` rows (at least 1).
    pub fn page_count(&self, total: usize) -> u32 {
        let size = self.page_size.max(1) as usize;
        (total.div_ceil(size)).max(1) as u32
    }

    /// The slice of `rows` this page covers; empty past the end.
    pub fn slice<'a, T>(&self, rows: &'a [T]) -> &'a [T] {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX).min(rows.len());
        let end = start.saturating_add(self.page_size as usize).min(rows.len());
        &rows[start..end]
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest::new(1, DEFAULT_PAGE_SIZE)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
