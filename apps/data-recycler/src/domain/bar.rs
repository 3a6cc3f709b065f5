//! OHLCV bar type.
//!
//! A `Bar` is one observation read from the historical row source. Bars are
//! immutable once loaded; the sequencer holds transient copies only.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLCV observation for a symbol at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    /// Ticker symbol the bar was recorded for.
    pub symbol: String,

    /// Historical timestamp (start of the bar period).
    pub timestamp: DateTime<Utc>,

    /// Open price.
    pub open: Decimal,

    /// High price.
    pub high: Decimal,

    /// Low price.
    pub low: Decimal,

    /// Close price.
    pub close: Decimal,

    /// Volume (shares).
    pub volume: i64,
}

impl Bar {
    /// Create a new bar.
    #[must_use]
    pub fn new(
        symbol: &str,
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: i64,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}
