//! Core types for the replay session.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::error::ConfigError;

/// Nominal spacing between ticks at speed 1.0, matching the source data's
/// one-minute bar granularity.
pub const BASE_INTERVAL: Duration = Duration::from_secs(60);

/// Replay mode for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayMode {
    /// All available data, exactly one pass (the conventional default).
    #[default]
    SinglePass,
    /// Repeat passes over all available data, indefinitely or N times.
    Loop,
    /// A single pass through an explicitly bounded window.
    DateRange,
}

impl ReplayMode {
    /// Parse mode from string.
    ///
    /// Unknown strings are `None` so a misspelled mode fails configuration
    /// instead of silently falling back to a single pass.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "single_pass" => Some(Self::SinglePass),
            "loop" => Some(Self::Loop),
            "date_range" => Some(Self::DateRange),
            _ => None,
        }
    }

    /// Get the mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SinglePass => "single_pass",
            Self::Loop => "loop",
            Self::DateRange => "date_range",
        }
    }
}

/// Immutable configuration for one replay session.
///
/// Constructed once at startup and passed into the resolver and sequencer;
/// no component reads configuration from process-global state.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Symbols the feed should carry.
    pub symbols: Vec<String>,
    /// Replay mode.
    pub mode: ReplayMode,
    /// Scales the inter-tick wait; 1.0 approximates the source cadence.
    pub speed_multiplier: f64,
    /// -1 for infinite looping, otherwise the number of passes.
    pub loop_count: i64,
    /// Start bound (required for `date_range` mode).
    pub start_date: Option<DateTime<Utc>>,
    /// End bound, exclusive (required for `date_range` mode).
    pub end_date: Option<DateTime<Utc>>,
    /// Nominal inter-tick spacing at speed 1.0.
    pub base_interval: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            mode: ReplayMode::default(),
            speed_multiplier: 1.0,
            loop_count: -1,
            start_date: None,
            end_date: None,
            base_interval: BASE_INTERVAL,
        }
    }
}

impl ReplayConfig {
    /// Validate the configuration.
    ///
    /// Invalid combinations fail here, at session start, never mid-stream.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` describing the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::EmptySymbolList);
        }

        if !(self.speed_multiplier.is_finite() && self.speed_multiplier > 0.0) {
            return Err(ConfigError::InvalidSpeed(self.speed_multiplier));
        }

        if self.loop_count == 0 || self.loop_count < -1 {
            return Err(ConfigError::InvalidLoopCount(self.loop_count));
        }

        if self.mode == ReplayMode::DateRange {
            match (self.start_date, self.end_date) {
                (Some(start), Some(end)) => {
                    if start >= end {
                        return Err(ConfigError::InvalidDateRange {
                            start: start.to_rfc3339(),
                            end: end.to_rfc3339(),
                        });
                    }
                }
                _ => return Err(ConfigError::MissingDateRange),
            }
        }

        Ok(())
    }

    /// Wall-clock wait between ticks: `base_interval / speed_multiplier`.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.base_interval.div_f64(self.speed_multiplier)
    }

    /// Number of passes to emit, or `None` for infinite looping.
    ///
    /// `single_pass` and `date_range` emit exactly one pass unless the loop
    /// count is explicitly set above one; `loop` honours the loop count,
    /// with -1 meaning never stop.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn total_passes(&self) -> Option<u64> {
        match self.mode {
            ReplayMode::Loop => {
                if self.loop_count == -1 {
                    None
                } else {
                    Some(self.loop_count as u64)
                }
            }
            ReplayMode::SinglePass | ReplayMode::DateRange => {
                if self.loop_count > 1 {
                    Some(self.loop_count as u64)
                } else {
                    Some(1)
                }
            }
        }
    }

    /// The loading window for the mode: explicit bounds for `date_range`,
    /// the full available range otherwise.
    #[must_use]
    pub const fn window(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match self.mode {
            ReplayMode::DateRange => (self.start_date, self.end_date),
            ReplayMode::SinglePass | ReplayMode::Loop => (None, None),
        }
    }
}

/// Final accounting for a completed session, logged at Closing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Synchronized emission cycles sent to the hub.
    pub ticks_emitted: u64,
    /// Full passes through the loaded data.
    pub passes_completed: u64,
}
