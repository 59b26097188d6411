//! # Invalidation Bus
//!
//! Tells dependent views that a named cache is stale.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  StockLedger::record_sale(...)                                          │
//! │       │ persist row                                                     │
//! │       ▼                                                                 │
//! │  bus.publish(Invalidation { keys: [stocks, products, pos], reason })   │
//! │       │                                                                 │
//! │       ├──► StockQuery listener   (touches stocks → refresh())          │
//! │       ├──► product list view     (touches products)                    │
//! │       └──► POS screen            (touches pos)                         │
//! │                                                                         │
//! │  Nobody listening is fine: the signal is dropped.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tracing::debug;
use ts_rs::TS;

/// Default channel capacity. A subscriber this far behind is told it lagged.
pub const DEFAULT_BUS_CAPACITY: usize = 64;

/// A named cache that can be invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum CacheKey {
    Products,
    Stocks,
    Pos,
}

impl CacheKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKey::Products => "products",
            CacheKey::Stocks => "stocks",
            CacheKey::Pos => "pos",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invalidation signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Invalidation {
    pub keys: Vec<CacheKey>,
    pub reason: String,
}

impl Invalidation {
    pub fn new(keys: impl Into<Vec<CacheKey>>, reason: impl Into<String>) -> Self {
        Invalidation {
            keys: keys.into(),
            reason: reason.into(),
        }
    }

    /// The signal every stock movement sends: stock levels, product
    /// availability and the POS screen all read the same rows.
    pub fn stock_movement(reason: impl Into<String>) -> Self {
        Invalidation::new(
            [CacheKey::Stocks, CacheKey::Products, CacheKey::Pos],
            reason,
        )
    }

    pub fn touches(&self, key: CacheKey) -> bool {
        self.keys.contains(&key)
    }
}

/// Broadcast channel for [`Invalidation`] signals. Cloning shares the channel.
#[derive(Debug, Clone)]
pub struct InvalidationBus {
    tx: broadcast::Sender<Invalidation>,
}

impl InvalidationBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        InvalidationBus { tx }
    }

    /// Sends the signal to every current subscriber and returns how many
    /// received it.
    pub fn publish(&self, signal: Invalidation) -> usize {
        let keys: Vec<&str> = signal.keys.iter().map(CacheKey::as_str).collect();
        match self.tx.send(signal.clone()) {
            Ok(receivers) => {
                debug!(?keys, reason = %signal.reason, receivers, "Invalidation published");
                receivers
            }
            Err(_) => {
                debug!(?keys, reason = %signal.reason, "Invalidation dropped, no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.tx.subscribe()
    }
}

impl Default for InvalidationBus {
    fn default() -> Self {
        InvalidationBus::new(DEFAULT_BUS_CAPACITY)
    }
}
