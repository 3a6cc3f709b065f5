//! Replay session error types.

use thiserror::Error;

use crate::application::ports::SourceError;

/// Invalid or contradictory session configuration.
///
/// Fatal at startup; a session with a configuration error never reaches
/// streaming and the server never accepts connections.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Speed multiplier must be a positive, finite number.
    #[error("speed multiplier must be > 0, got {0}")]
    InvalidSpeed(f64),

    /// Loop count must be -1 (infinite) or a positive pass count.
    #[error("loop count must be -1 or >= 1, got {0}")]
    InvalidLoopCount(i64),

    /// Date-range mode requires both bounds.
    #[error("date_range mode requires both start and end dates")]
    MissingDateRange,

    /// Date-range bounds are inverted or equal.
    #[error("invalid date range: start {start} is not before end {end}")]
    InvalidDateRange {
        /// Requested start bound.
        start: String,
        /// Requested end bound.
        end: String,
    },

    /// The symbol list was empty.
    #[error("no symbols configured for replay")]
    EmptySymbolList,
}

/// Errors raised by a running replay session.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// A resolved source symbol has zero bars for the requested window.
    /// Fatal for the session: there is nothing to replay.
    #[error("no bars for resolved symbol {0} in the requested window")]
    NoData(String),

    /// The underlying row source failed.
    #[error(transparent)]
    Source(#[from] SourceError),
}
