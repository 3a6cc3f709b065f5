//! CSV-backed historical row source.
//!
//! The production row source is a relational store owned by another system;
//! this adapter gives the binary a self-contained leaf so a replay session
//! can be driven from an exported bar file.
//!
//! # File format
//!
//! CSV with a header row:
//!
//! ```csv
//! symbol,timestamp,open,high,low,close,volume
//! AAPL,2024-01-02T14:30:00Z,150.25,151.50,149.75,150.75,1000000
//! ```

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::application::ports::{BarSource, InMemoryBarSource, SourceError};
use crate::domain::Bar;

/// Bar source backed by a CSV export, loaded fully at startup.
#[derive(Debug)]
pub struct CsvBarSource {
    inner: InMemoryBarSource,
}

impl CsvBarSource {
    /// Load bars from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns a `SourceError` if the file cannot be read or a row is
    /// malformed.
    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Load bars from any CSV reader.
    ///
    /// # Errors
    ///
    /// Returns a `SourceError` if a row cannot be parsed.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SourceError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut inner = InMemoryBarSource::new();

        for record in csv_reader.deserialize::<Bar>() {
            let bar = record.map_err(|e| SourceError::Backend(format!("bad CSV row: {e}")))?;
            let symbol = bar.symbol.clone();
            inner.add_bars(&symbol, vec![bar]);
        }

        Ok(Self { inner })
    }
}

impl BarSource for CsvBarSource {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>, SourceError> {
        self.inner.fetch_bars(symbol, start, end)
    }

    fn available_symbols(&self) -> Vec<String> {
        self.inner.available_symbols()
    }

    fn name(&self) -> &'static str {
        "Csv"
    }
}
