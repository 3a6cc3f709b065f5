#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Data Recycler - Historical Market Data Replay Server
//!
//! A local WebSocket server that replays persisted OHLCV bars as a
//! live-looking market data feed. The wire format and handshake match the
//! real stream, so unmodified downstream consumers (trading logic,
//! persistence pipelines) can be exercised deterministically without live
//! market access.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core replay types with no I/O
//!   - `bar`: OHLCV bar
//!   - `resolver`: Symbol-to-proxy resolution
//!
//! - **Application**: Ports and the replay engine
//!   - `ports`: Historical row source contract
//!   - `sequencer`: Replay configuration, pacing, and tick emission
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `broadcast`: Channel-based tick distribution
//!   - `config`: Environment configuration
//!   - `source`: CSV-backed row source
//!   - `stream`: Wire messages and the WebSocket server
//!   - `telemetry`: Tracing setup
//!
//! # Data Flow
//!
//! ```text
//! Row Source ──► Symbol   ──► Replay    ──► Tick      ──► Stream  ──► Client 1
//!  (bars)       Resolver     Sequencer     Broadcast     Server  ──► Client 2
//!                            (timing)      (fan-out)             ──► Client N
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core replay types with no I/O dependencies.
pub mod domain;

/// Application layer - Ports and the replay sequencer.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::{Bar, ResolveError, SymbolMapping, resolve_symbols};

// Application types
pub use application::{
    BarSource, InMemoryBarSource, ReplayError, ReplaySequencer, SessionSummary, SourceError,
};
pub use application::sequencer::{ConfigError, ReplayConfig, ReplayMode};

// Infrastructure
pub use infrastructure::broadcast::{SharedTickHub, TickFrame, TickHub};
pub use infrastructure::config::{RecyclerSettings, ServerSettings, SettingsError};
pub use infrastructure::source::CsvBarSource;
pub use infrastructure::stream::{
    ClientRequest, EmissionError, ErrorMessage, ServerError, ServerStats, StreamServer,
    SubscriptionAck, SuccessKind, SuccessMessage, TickBar,
};
pub use infrastructure::telemetry::init as init_telemetry;
