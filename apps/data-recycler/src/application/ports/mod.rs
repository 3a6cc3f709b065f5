//! Ports - Interfaces the replay engine depends on.
//!
//! The only external collaborator the recycler consumes is a historical row
//! source: something that can return ordered bars for a symbol over a date
//! range. Persistent backends (a relational store, an archive service) live
//! behind the `BarSource` trait; an in-memory implementation ships for tests
//! and fixtures.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::Bar;

/// Errors raised by a historical row source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// IO error reading data.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure (query error, malformed row, etc.).
    #[error("source error: {0}")]
    Backend(String),
}

/// Historical row source contract.
///
/// Implementations return bars ascending by timestamp and an empty vector
/// when no data exists for the symbol in the window. Passing `None` for a
/// bound means "earliest stored" / "latest stored" respectively, which the
/// full-history replay modes rely on.
pub trait BarSource: Send + Sync {
    /// Load bars for a symbol within the (optionally unbounded) window.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be read.
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>, SourceError>;

    /// Symbols this source has at least one bar for, in deterministic order.
    fn available_symbols(&self) -> Vec<String>;

    /// Name of this source, for operator logs.
    fn name(&self) -> &'static str;
}

/// In-memory bar source for tests and fixtures.
#[derive(Debug, Default)]
pub struct InMemoryBarSource {
    data: HashMap<String, Vec<Bar>>,
}

impl InMemoryBarSource {
    /// Create a new empty in-memory source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    /// Add bars for a symbol. Bars are kept sorted ascending by timestamp.
    pub fn add_bars(&mut self, symbol: &str, mut bars: Vec<Bar>) {
        bars.sort_by_key(|bar| bar.timestamp);
        self.data
            .entry(symbol.to_string())
            .or_default()
            .extend(bars);
        if let Some(series) = self.data.get_mut(symbol) {
            series.sort_by_key(|bar| bar.timestamp);
        }
    }
}

impl BarSource for InMemoryBarSource {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>, SourceError> {
        let bars = self
            .data
            .get(symbol)
            .map(|series| {
                series
                    .iter()
                    .filter(|bar| start.is_none_or(|s| bar.timestamp >= s))
                    .filter(|bar| end.is_none_or(|e| bar.timestamp < e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(bars)
    }

    fn available_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .data
            .iter()
            .filter(|(_, series)| !series.is_empty())
            .map(|(sym, _)| sym.clone())
            .collect();
        symbols.sort();
        symbols
    }

    fn name(&self) -> &'static str {
        "InMemory"
    }
}
