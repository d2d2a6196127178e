//! Market data types shared with the router's peers
//!
//! The router never fetches market data itself: the watcher peer polls and
//! precomputes per-ticker state, the streamer peer delivers live trades.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single trade event delivered by the streamer peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Trading symbol (e.g., "BTCUSDT")
    pub ticker: String,
    /// Trade price
    pub price: Decimal,
    /// Trade quantity
    pub quantity: Decimal,
    /// Exchange trade time
    pub time: DateTime<Utc>,
}

/// A closed candle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Candle close time
    pub close_time: DateTime<Utc>,
}

/// Per-ticker state precomputed by the watcher peer
///
/// The watcher polls market state on its own schedule and hands the result
/// over so rules can be evaluated without recomputing anything here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerSnapshot {
    /// Trading symbol the state belongs to
    pub ticker: String,
    /// Last observed price
    pub price: Decimal,
    /// Most recent closed candle, if the watcher has one
    pub candle: Option<Candle>,
    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,
}
