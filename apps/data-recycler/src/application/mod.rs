//! Application layer - Ports and the replay sequencer.

pub mod ports;
pub mod sequencer;

pub use ports::{BarSource, InMemoryBarSource, SourceError};
pub use sequencer::{ReplayError, ReplaySequencer, SessionSummary};
