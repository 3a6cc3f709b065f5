//! Replay Sequencer
//!
//! Produces a deterministic, time-paced sequence of ticks from historical
//! bars according to the configured replay mode, and drives emission into
//! the broadcast hub the stream server fans out from.
//!
//! # Session lifecycle
//!
//! - **Loading**: fetch all bars per resolved source symbol, ascending by
//!   timestamp. A resolved symbol with zero bars is fatal for the session.
//! - **Streaming**: emit one bar per symbol per tick in lockstep, waiting
//!   `base_interval / speed_multiplier` between ticks. Pacing is nominal;
//!   it is never derived from the bars' historical timestamps.
//! - **Closing**: cancel the session token, which closes all client
//!   connections.

pub mod engine;
pub mod error;
pub mod types;

pub use engine::ReplaySequencer;
pub use error::{ConfigError, ReplayError};
pub use types::{ReplayConfig, ReplayMode, SessionSummary};
