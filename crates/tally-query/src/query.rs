//! # Stock Query
//!
//! Orchestrates one report view: fetch rows, then filter, sort, summarize
//! and page them.
//!
//! ## Run Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  params ──► StockSource::fetch_entries(range, store, product)          │
//! │                  │                                                      │
//! │                  ├── Err ──► error! log, empty rows, zero summary,     │
//! │                  │           report.error = Some(message)              │
//! │                  ▼                                                      │
//! │             filter_entries (search, store, product)                    │
//! │                  ▼                                                      │
//! │             sort_entries (stable)                                      │
//! │                  ▼                                                      │
//! │             summarize ◄── over the whole filtered set                  │
//! │                  ▼                                                      │
//! │             page slice ──► rows shown                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The summary never depends on which page is displayed.
//!
//! ## Re-runs
//! - `update(params)` re-runs only when the params differ from the last run
//! - `refresh()` re-runs with the last params unconditionally
//! - `listen(bus)` calls `refresh()` whenever `stocks` is invalidated
//!
//! Concurrent runs are not sequenced: whichever finishes last owns the
//! stored report.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use ts_rs::TS;

use crate::context::{ReportSettings, SessionContext};
use crate::invalidation::{CacheKey, InvalidationBus};
use crate::source::StockSource;
use tally_core::reconciliation::{summarize_by, uncosted_shortages, Dimension, GroupSummary};
use tally_core::{
    filter_entries, sort_entries, summarize, DateRange, PageRequest, ReconciledEntry, Selection,
    SortSpec, StockEntry, StockFilter, StockSummary,
};
use tally_db::EntryQuery;

// =============================================================================
// Parameters
// =============================================================================

/// Everything that determines a report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockQueryParams {
    pub range: DateRange,
    pub filter: StockFilter,
    pub sort: SortSpec,
    /// 1-based page to display.
    pub page: u32,
    /// Overrides `ReportSettings::page_size` when set.
    pub page_size: Option<u32>,
    /// Adds a per-store or per-product breakdown of the filtered set.
    pub group_by: Option<Dimension>,
}

impl StockQueryParams {
    /// All rows in `range`, unsorted, first page.
    pub fn new(range: DateRange) -> Self {
        StockQueryParams {
            range,
            filter: StockFilter::default(),
            sort: SortSpec::default(),
            page: 1,
            page_size: None,
            group_by: None,
        }
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.filter.search = term.into();
        self
    }

    pub fn store(mut self, store: Selection) -> Self {
        self.filter.store = store;
        self
    }

    pub fn product(mut self, product: Selection) -> Self {
        self.filter.product = product;
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn group_by(mut self, dimension: Dimension) -> Self {
        self.group_by = Some(dimension);
        self
    }
}

// =============================================================================
// Report
// =============================================================================

/// The output of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockReport {
    /// The displayed page, derived metrics included.
    pub rows: Vec<ReconciledEntry>,
    /// Rows after filtering, across all pages.
    pub filtered_count: usize,
    /// Totals over the whole filtered set.
    pub summary: StockSummary,
    /// Rows with a shortage that cannot be valued because the product has no
    /// cost price.
    pub uncosted_shortages: usize,
    pub groups: Vec<GroupSummary>,
    pub page: PageRequest,
    pub page_count: u32,
    /// Set when the fetch failed; rows and summary are then empty.
    pub error: Option<String>,
}

impl StockReport {
    pub fn empty(page: PageRequest) -> Self {
        StockReport {
            rows: Vec::new(),
            filtered_count: 0,
            summary: StockSummary::default(),
            uncosted_shortages: 0,
            groups: Vec::new(),
            page,
            page_count: 1,
            error: None,
        }
    }

    pub fn failed(page: PageRequest, message: impl Into<String>) -> Self {
        StockReport {
            error: Some(message.into()),
            ..StockReport::empty(page)
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Filter, sort, summarize and page already-fetched rows.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use tally_core::{PageRequest, SortSpec, StockEntry, StockFilter};
/// use tally_query::build_report;
///
/// let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// let rows: Vec<StockEntry> = (0..30)
///     .map(|i| {
///         let mut e = StockEntry::blank(&format!("p{i}"), "s1", day);
///         e.opening_stock = 1;
///         e.price_cents = 100;
///         e
///     })
///     .collect();
///
/// let report = build_report(&rows, &StockFilter::default(), SortSpec::default(), PageRequest::new(2, 25), None);
/// assert_eq!(report.rows.len(), 5);
/// assert_eq!(report.filtered_count, 30);
/// assert_eq!(report.summary.total_sold, 30);
/// ```
pub fn build_report(
    rows: &[StockEntry],
    filter: &StockFilter,
    sort: SortSpec,
    page: PageRequest,
    group_by: Option<Dimension>,
) -> StockReport {
    let filtered = filter_entries(rows, filter);
    let sorted = sort_entries(&filtered, sort);

    let summary = summarize(sorted.iter().copied());
    let uncosted = uncosted_shortages(sorted.iter().copied());
    let groups = group_by
        .map(|dimension| summarize_by(sorted.iter().copied(), dimension))
        .unwrap_or_default();

    let shown = page
        .slice(&sorted)
        .iter()
        .map(|e| ReconciledEntry::from(*e))
        .collect();

    StockReport {
        rows: shown,
        filtered_count: sorted.len(),
        summary,
        uncosted_shortages: uncosted,
        groups,
        page,
        page_count: page.page_count(sorted.len()),
        error: None,
    }
}

// =============================================================================
// Stock Query
// =============================================================================

#[derive(Debug, Default)]
struct QueryState {
    params: Option<StockQueryParams>,
    report: Option<StockReport>,
    runs: u64,
}

/// One report view over a [`StockSource`].
///
/// Cloning yields another handle onto the same state.
pub struct StockQuery<S> {
    source: Arc<S>,
    context: SessionContext,
    settings: ReportSettings,
    state: Arc<RwLock<QueryState>>,
}

impl<S> Clone for StockQuery<S> {
    fn clone(&self) -> Self {
        StockQuery {
            source: Arc::clone(&self.source),
            context: self.context.clone(),
            settings: self.settings,
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: StockSource> StockQuery<S> {
    pub fn new(source: Arc<S>, context: SessionContext, settings: ReportSettings) -> Self {
        StockQuery {
            source,
            context,
            settings,
            state: Arc::new(RwLock::new(QueryState::default())),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Runs the report for `params`, or returns the stored report when
    /// `params` equal the last run's and that run succeeded.
    pub async fn update(&self, params: StockQueryParams) -> StockReport {
        {
            let state = self.state.read().await;
            if state.params.as_ref() == Some(&params) {
                if let Some(report) = state.report.as_ref().filter(|r| !r.is_error()) {
                    debug!("Stock query params unchanged, reusing report");
                    return report.clone();
                }
            }
        }

        self.run(params).await
    }

    /// Re-runs with the last params. `None` before the first `update`.
    pub async fn refresh(&self) -> Option<StockReport> {
        let params = self.state.read().await.params.clone()?;
        Some(self.run(params).await)
    }

    /// The last stored report.
    pub async fn report(&self) -> Option<StockReport> {
        self.state.read().await.report.clone()
    }

    /// Number of completed runs (memoized `update` calls excluded).
    pub async fn runs(&self) -> u64 {
        self.state.read().await.runs
    }

    async fn run(&self, params: StockQueryParams) -> StockReport {
        let started = Instant::now();

        let mut filter = params.filter.clone();
        filter.store = self.context.effective_store(&filter.store);

        let page = PageRequest::new(
            params.page,
            params.page_size.unwrap_or(self.settings.page_size),
        );

        // push store/product down; the repository does not paginate here so
        // the summary covers the whole filtered set
        let query = EntryQuery::new(params.range)
            .store(filter.store.clone())
            .product(filter.product.clone());

        let report = match self.source.fetch_entries(&query).await {
            Ok(rows) => {
                let report = build_report(&rows, &filter, params.sort, page, params.group_by);
                info!(
                    from = %params.range.from,
                    to = %params.range.to,
                    fetched = rows.len(),
                    filtered = report.filtered_count,
                    page = page.page,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Stock report built"
                );
                report
            }
            Err(e) => {
                error!(
                    error = %e,
                    from = %params.range.from,
                    to = %params.range.to,
                    "Stock fetch failed"
                );
                StockReport::failed(page, e.to_string())
            }
        };

        let mut state = self.state.write().await;
        state.params = Some(params);
        state.report = Some(report.clone());
        state.runs += 1;

        report
    }
}

impl<S: StockSource + 'static> StockQuery<S> {
    /// Refreshes this query whenever `stocks` is invalidated on `bus`.
    ///
    /// The subscription is taken before this returns, so signals published
    /// afterwards are never missed. The task ends when every bus handle is
    /// dropped.
    pub fn listen(&self, bus: &InvalidationBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        let query = self.clone();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(signal) if signal.touches(CacheKey::Stocks) => {
                        debug!(reason = %signal.reason, "Stocks invalidated, refreshing report");
                        query.refresh().await;
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Invalidation listener lagged, refreshing once");
                        query.refresh().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
