//! Replay Session Integration Tests
//!
//! Drives the sequencer end to end against an in-memory source and asserts
//! on the ticks observed through the broadcast hub: pass accounting, pacing,
//! and payload fidelity.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use data_recycler::{
    Bar, BarSource, InMemoryBarSource, ReplayConfig, ReplayMode, ReplaySequencer, SharedTickHub,
    TickHub, resolve_symbols,
};

fn minute_bar(symbol: &str, minute: u32, close_cents: i64) -> Bar {
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
    config: ReplayConfig,
) -> (ReplaySequencer, SharedTickHub, CancellationToken) {
    let available: BTreeSet<String> = source.available_symbols().into_iter().collect();
    let mapping = resolve_symbols(&config.symbols, &available, None).unwrap();

    let hub = Arc::new(TickHub::with_defaults());
    let cancel = CancellationToken::new();
    let sequencer = ReplaySequencer::new(
        config,
        mapping,
        Arc::new(source),
        Arc::clone(&hub),
        cancel.clone(),
    );
    (sequencer, hub, cancel)
}

fn config_for(symbols: &[&str], mode: ReplayMode, loop_count: i64) -> ReplayConfig {
    ReplayConfig {
        symbols: symbols.iter().map(ToString::to_string).collect(),
        mode,
        loop_count,
        ..ReplayConfig::default()
    }
}

fn tick_elements(payload: &str) -> Vec<Value> {
    let value: Value = serde_json::from_str(payload).unwrap();
    value.as_array().unwrap().clone()
}

// =============================================================================
// Pass Accounting
// =============================================================================

#[tokio::test(start_paused = true)]
async fn single_pass_emits_each_bar_exactly_once() {
    let mut source = InMemoryBarSource::new();
    source.add_bars(
        "AAPL",
        (0..5).map(|i| minute_bar("AAPL", i, 10_000 + i64::from(i) * 100)).collect(),
    );

    let config = config_for(&["AAPL"], ReplayMode::SinglePass, -1);
    let (sequencer, hub, _cancel) = sequencer_for(source, config);
    let mut rx = hub.subscribe();

    let summary = sequencer.run().await.unwrap();
    assert_eq!(summary.ticks_emitted, 5);
    assert_eq!(summary.passes_completed, 1);

    // The five ticks replay the bars in historical order, one element each.
    for i in 0..5 {
        let frame = rx.recv().await.unwrap();
        let elements = tick_elements(&frame.payload);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0]["S"], "AAPL");
        let expected_close = 100.0 + f64::from(i);
        assert!((elements[0]["c"].as_f64().unwrap() - expected_close).abs() < 1e-9);
    }
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn bounded_loop_replays_the_series_per_pass() {
    let mut source = InMemoryBarSource::new();
    source.add_bars(
        "AAPL",
        vec![
            minute_bar("AAPL", 0, 10_000),
            minute_bar("AAPL", 1, 10_100),
            minute_bar("AAPL", 2, 10_200),
        ],
    );

    let config = config_for(&["AAPL"], ReplayMode::Loop, 2);
    let (sequencer, hub, _cancel) = sequencer_for(source, config);
    let mut rx = hub.subscribe();

    let summary = sequencer.run().await.unwrap();
    assert_eq!(summary.ticks_emitted, 6);
    assert_eq!(summary.passes_completed, 2);

    // Bars repeat from the start on the second pass, and sequence numbers
    // keep increasing across the loop boundary.
    let mut closes = Vec::new();
    let mut seqs = Vec::new();
    for _ in 0..6 {
        let frame = rx.recv().await.unwrap();
        seqs.push(frame.seq);
        closes.push(tick_elements(&frame.payload)[0]["c"].as_f64().unwrap());
    }
    assert_eq!(seqs, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(closes, vec![100.0, 101.0, 102.0, 100.0, 101.0, 102.0]);
}

#[tokio::test(start_paused = true)]
async fn date_range_window_limits_the_replayed_bars() {
    let mut source = InMemoryBarSource::new();
    source.add_bars(
        "AAPL",
        (0..10).map(|i| minute_bar("AAPL", i, 10_000 + i64::from(i) * 100)).collect(),
    );

    let config = ReplayConfig {
        start_date: Some(Utc.with_ymd_and_hms(2024, 1, 2, 14, 2, 0).unwrap()),
        end_date: Some(Utc.with_ymd_and_hms(2024, 1, 2, 14, 6, 0).unwrap()),
        ..config_for(&["AAPL"], ReplayMode::DateRange, -1)
    };
    let (sequencer, hub, _cancel) = sequencer_for(source, config);
    let mut rx = hub.subscribe();

    // Start inclusive, end exclusive: minutes 2, 3, 4, 5.
    let summary = sequencer.run().await.unwrap();
    assert_eq!(summary.ticks_emitted, 4);

    let first = tick_elements(&hub_recv(&mut rx).await)[0]["c"].as_f64().unwrap();
    assert!((first - 102.0).abs() < 1e-9);
}

async fn hub_recv(rx: &mut tokio::sync::broadcast::Receiver<data_recycler::TickFrame>) -> String {
    rx.recv().await.unwrap().payload.to_string()
}

// =============================================================================
// Pacing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn tick_spacing_follows_base_interval_over_speed() {
    let mut source = InMemoryBarSource::new();
    source.add_bars(
        "AAPL",
        (0..4).map(|i| minute_bar("AAPL", i, 10_000)).collect(),
    );

    // 60s bars at 2x replay in 30s of (paused, auto-advanced) time.
    let config = ReplayConfig {
        speed_multiplier: 2.0,
        ..config_for(&["AAPL"], ReplayMode::SinglePass, -1)
    };
    let (sequencer, hub, _cancel) = sequencer_for(source, config);
    let mut rx = hub.subscribe();

    let handle = tokio::spawn(sequencer.run());

    let mut arrivals = Vec::new();
    for _ in 0..4 {
        rx.recv().await.unwrap();
        arrivals.push(tokio::time::Instant::now());
    }
    handle.await.unwrap().unwrap();

    for pair in arrivals.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_secs(30));
    }
}

// =============================================================================
// Payload Fidelity
// =============================================================================

#[tokio::test(start_paused = true)]
async fn tick_carries_bar_values_with_wall_clock_timestamp() {
    let historical = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
    let bar = Bar::new(
        "AAPL",
        historical,
        Decimal::new(15025, 2),
        Decimal::new(15150, 2),
        Decimal::new(14975, 2),
        Decimal::new(15075, 2),
        1_000_000,
    );
    let mut source = InMemoryBarSource::new();
    source.add_bars("AAPL", vec![bar]);

    let config = config_for(&["AAPL"], ReplayMode::SinglePass, -1);
    let (sequencer, hub, _cancel) = sequencer_for(source, config);
    let mut rx = hub.subscribe();

    sequencer.run().await.unwrap();

    let elements = tick_elements(&rx.recv().await.unwrap().payload);
    let tick = &elements[0];

    assert_eq!(tick["S"], "AAPL");
    assert!((tick["o"].as_f64().unwrap() - 150.25).abs() < 1e-9);
    assert!((tick["h"].as_f64().unwrap() - 151.50).abs() < 1e-9);
    assert!((tick["l"].as_f64().unwrap() - 149.75).abs() < 1e-9);
    assert!((tick["c"].as_f64().unwrap() - 150.75).abs() < 1e-9);
    assert_eq!(tick["v"], 1_000_000);

    // The emitted timestamp is the wall clock at send time, never the bar's
    // historical timestamp.
    let emitted: DateTime<Utc> = tick["t"].as_str().unwrap().parse().unwrap();
    assert_ne!(emitted, historical);
    assert!(emitted > historical);
}
