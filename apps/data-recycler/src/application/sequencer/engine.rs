//! Replay sequencer engine: loading, pacing, and tick emission.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::error::ReplayError;
use super::types::{ReplayConfig, SessionSummary};
use crate::application::ports::BarSource;
use crate::domain::{Bar, SymbolMapping};
use crate::infrastructure::broadcast::{SharedTickHub, TickFrame};
use crate::infrastructure::stream::messages::{TickBar, encode_tick};

/// Loaded bar series for one requested symbol.
#[derive(Debug)]
struct SymbolSeries {
    requested: String,
    bars: Arc<Vec<Bar>>,
}

/// Historical data replay sequencer.
///
/// Owns the loaded bar series and cursor state exclusively; a single task
/// runs the tick loop, alternating between the inter-tick timer and
/// emission into the broadcast hub. Sleeping between ticks is the only
/// intentional blocking point in the hot path.
pub struct ReplaySequencer {
    config: ReplayConfig,
    mapping: SymbolMapping,
    source: Arc<dyn BarSource>,
    hub: SharedTickHub,
    cancel: CancellationToken,
    series: Vec<SymbolSeries>,
    seq: u64,
    loaded: bool,
}

impl std::fmt::Debug for ReplaySequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplaySequencer")
            .field("config", &self.config)
            .field("source", &self.source.name())
            .field("series", &self.series.len())
            .field("seq", &self.seq)
            .field("loaded", &self.loaded)
            .finish_non_exhaustive()
    }
}

impl ReplaySequencer {
    /// Create a new sequencer for one session.
    #[must_use]
    pub fn new(
        config: ReplayConfig,
        mapping: SymbolMapping,
        source: Arc<dyn BarSource>,
        hub: SharedTickHub,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            mapping,
            source,
            hub,
            cancel,
            series: Vec::new(),
            seq: 0,
            loaded: false,
        }
    }

    /// Load all bars for every resolved source symbol (the Loading state).
    ///
    /// Series are fetched once per distinct resolved symbol and shared
    /// between requested symbols that proxy to it.
    ///
    /// # Errors
    ///
    /// Returns `ReplayError::NoData` if a resolved symbol yields zero bars
    /// for the mode's window, or a source error if loading fails.
    pub fn load(&mut self) -> Result<(), ReplayError> {
        if self.loaded {
            return Ok(());
        }

        let (start, end) = self.config.window();
        info!(
            source = %self.source.name(),
            mode = %self.config.mode.as_str(),
            symbols = self.mapping.len(),
            "loading replay data"
        );

        let mut cache: HashMap<String, Arc<Vec<Bar>>> = HashMap::new();

        for (requested, resolved) in self.mapping.iter() {
            let bars = match cache.get(resolved) {
                Some(bars) => Arc::clone(bars),
                None => {
                    let fetched = self.source.fetch_bars(resolved, start, end)?;
                    if fetched.is_empty() {
                        return Err(ReplayError::NoData(resolved.to_string()));
                    }
                    debug!(symbol = %resolved, bars = fetched.len(), "loaded series");
                    let shared = Arc::new(fetched);
                    cache.insert(resolved.to_string(), Arc::clone(&shared));
                    shared
                }
            };

            self.series.push(SymbolSeries {
                requested: requested.to_string(),
                bars,
            });
        }

        self.loaded = true;
        info!(
            pass_len = self.pass_len(),
            series = self.series.len(),
            "replay data loaded"
        );
        Ok(())
    }

    /// Ticks per pass: the shortest loaded series bounds each pass.
    #[must_use]
    pub fn pass_len(&self) -> usize {
        self.series
            .iter()
            .map(|series| series.bars.len())
            .min()
            .unwrap_or(0)
    }

    /// Run the session: Streaming until the configured passes complete or the
    /// session token is cancelled, then Closing (cancels the token so the
    /// stream server drops all client connections).
    ///
    /// # Errors
    ///
    /// Returns a `ReplayError` if loading fails; per-tick encoding problems
    /// are logged and skipped, never escalated.
    pub async fn run(mut self) -> Result<SessionSummary, ReplayError> {
        if !self.loaded {
            self.load()?;
        }

        let pass_len = self.pass_len();
        let total_passes = self.config.total_passes();
        let mut summary = SessionSummary::default();

        let mut ticker = tokio::time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            mode = %self.config.mode.as_str(),
            speed = self.config.speed_multiplier,
            interval_ms = self.config.tick_interval().as_millis(),
            pass_len,
            "streaming"
        );

        'session: loop {
            for index in 0..pass_len {
                tokio::select! {
                    () = self.cancel.cancelled() => {
                        info!("replay session cancelled");
                        break 'session;
                    }
                    _ = ticker.tick() => {
                        self.emit_tick(index, &mut summary);
                    }
                }
            }

            summary.passes_completed += 1;
            debug!(passes = summary.passes_completed, "pass complete");

            if let Some(total) = total_passes
                && summary.passes_completed >= total
            {
                break 'session;
            }
        }

        info!(
            ticks = summary.ticks_emitted,
            passes = summary.passes_completed,
            "replay session closing"
        );
        self.cancel.cancel();
        Ok(summary)
    }

    /// Emit one synchronized tick across all symbols.
    ///
    /// Every symbol advances together; a symbol with no bar at this cursor
    /// is omitted from the tick rather than stalling the others. Timestamps
    /// are the wall clock at emission, never the historical bar time.
    fn emit_tick(&mut self, index: usize, summary: &mut SessionSummary) {
        let now = Utc::now();

        let bars: Vec<TickBar> = self
            .series
            .iter()
            .filter_map(|series| {
                series.bars.get(index).map(|bar| TickBar {
                    symbol: series.requested.clone(),
                    timestamp: now,
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                    volume: bar.volume,
                })
            })
            .collect();

        let (payload, errors) = encode_tick(&bars);
        for error in errors {
            warn!(error = %error, "skipping unencodable bar");
        }

        let Some(payload) = payload else {
            warn!(index, "skipping tick with no encodable bars");
            return;
        };

        self.seq += 1;
        summary.ticks_emitted += 1;

        let receivers = self.hub.send_tick(TickFrame {
            seq: self.seq,
            payload: Arc::from(payload.as_str()),
        });
        trace!(
            seq = self.seq,
            receivers = receivers.unwrap_or(0),
            "tick emitted"
        );
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use super::*;
    use crate::application::ports::InMemoryBarSource;
    use crate::application::sequencer::types::ReplayMode;
    use crate::domain::resolve_symbols;
    use crate::infrastructure::broadcast::TickHub;

    fn bar(symbol: &str, minute: u32, close_cents: i64) -> Bar {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 14, minute, 0).unwrap();
        Bar::new(
            symbol,
            ts,
            Decimal::new(close_cents - 50, 2),
            Decimal::new(close_cents + 100, 2),
            Decimal::new(close_cents - 100, 2),
            Decimal::new(close_cents, 2),
            1_000,
        )
    }

    fn sequencer_for(
        source: InMemoryBarSource,
        symbols: &[&str],
        config: ReplayConfig,
    ) -> (ReplaySequencer, SharedTickHub, CancellationToken) {
        let requested: Vec<String> = symbols.iter().map(ToString::to_string).collect();
        let available: BTreeSet<String> = source.available_symbols().into_iter().collect();
        let mapping = resolve_symbols(&requested, &available, None).unwrap();

        let hub = Arc::new(TickHub::with_defaults());
        let cancel = CancellationToken::new();
        let sequencer = ReplaySequencer::new(
            ReplayConfig {
                symbols: requested,
                ..config
            },
            mapping,
            Arc::new(source),
            Arc::clone(&hub),
            cancel.clone(),
        );
        (sequencer, hub, cancel)
    }

    #[test]
    fn load_fails_on_empty_series() {
        let mut source = InMemoryBarSource::new();
        source.add_bars("AAPL", vec![bar("AAPL", 0, 10_000)]);

        let config = ReplayConfig {
            mode: ReplayMode::DateRange,
            start_date: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            end_date: Some(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()),
            ..ReplayConfig::default()
        };
        let (mut sequencer, _hub, _cancel) = sequencer_for(source, &["AAPL"], config);

        let err = sequencer.load().unwrap_err();
        assert!(matches!(err, ReplayError::NoData(sym) if sym == "AAPL"));
    }

    #[test]
    fn shortest_series_bounds_the_pass() {
        let mut source = InMemoryBarSource::new();
        source.add_bars(
            "AAPL",
            vec![
                bar("AAPL", 0, 10_000),
                bar("AAPL", 1, 10_100),
                bar("AAPL", 2, 10_200),
            ],
        );
        source.add_bars("MSFT", vec![bar("MSFT", 0, 40_000), bar("MSFT", 1, 40_100)]);

        let (mut sequencer, _hub, _cancel) =
            sequencer_for(source, &["AAPL", "MSFT"], ReplayConfig::default());
        sequencer.load().unwrap();
        assert_eq!(sequencer.pass_len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_an_infinite_loop_session() {
        let mut source = InMemoryBarSource::new();
        source.add_bars("AAPL", vec![bar("AAPL", 0, 10_000), bar("AAPL", 1, 10_100)]);

        let config = ReplayConfig {
            mode: ReplayMode::Loop,
            loop_count: -1,
            speed_multiplier: 60.0,
            ..ReplayConfig::default()
        };
        let (sequencer, hub, cancel) = sequencer_for(source, &["AAPL"], config);
        let mut rx = hub.subscribe();

        let handle = tokio::spawn(sequencer.run());

        // Let a few ticks happen, then cancel.
        for _ in 0..5 {
            rx.recv().await.unwrap();
        }
        cancel.cancel();

        let summary = handle.await.unwrap().unwrap();
        assert!(summary.ticks_emitted >= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_cancels_the_session_token() {
        let mut source = InMemoryBarSource::new();
        source.add_bars("AAPL", vec![bar("AAPL", 0, 10_000)]);

        let (sequencer, _hub, cancel) =
            sequencer_for(source, &["AAPL"], ReplayConfig::default());
        let summary = sequencer.run().await.unwrap();

        assert_eq!(summary.passes_completed, 1);
        assert!(cancel.is_cancelled());
    }
}
