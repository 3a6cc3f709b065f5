//! Tick Broadcast Hub
//!
//! Fan-out channel between the sequencer and client connections, built on a
//! tokio broadcast channel: single producer (the sequencer's tick loop),
//! many consumers (one per connection task).
//!
//! Consumers never write back, and a consumer that falls behind the channel
//! capacity observes a lag error instead of exerting backpressure on the
//! producer; the connection task drops that client rather than stalling the
//! sequencer or its peers.

use std::sync::Arc;

use tokio::sync::broadcast;

/// One encoded tick, ready to be written to every connected client.
///
/// The payload is the full outbound JSON array for the tick; sharing it as
/// `Arc<str>` keeps fan-out cheap regardless of client count.
#[derive(Debug, Clone)]
pub struct TickFrame {
    /// Monotonic tick sequence number within the session.
    pub seq: u64,
    /// Encoded wire message.
    pub payload: Arc<str>,
}

/// Default capacity of the tick channel.
///
/// Sized for bursts well beyond any realistic speed multiplier; a client
/// further behind than this is dropped as unresponsive.
pub const DEFAULT_TICK_CAPACITY: usize = 1_024;

/// Central hub for tick distribution.
#[derive(Debug)]
pub struct TickHub {
    tx: broadcast::Sender<TickFrame>,
}

impl TickHub {
    /// Create a new hub with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            tx: broadcast::channel(capacity).0,
        }
    }

    /// Create a new hub with the default capacity.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_TICK_CAPACITY)
    }

    /// Send a tick to all subscribed connections.
    ///
    /// Returns the number of receivers that got the frame, or `None` if no
    /// client is currently connected (the tick is still considered emitted).
    #[must_use]
    pub fn send_tick(&self, frame: TickFrame) -> Option<usize> {
        self.tx.send(frame).ok()
    }

    /// Subscribe a new connection.
    ///
    /// The receiver only observes ticks sent after this call; there is no
    /// replay for late joiners.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TickFrame> {
        self.tx.subscribe()
    }

    /// Number of currently subscribed connections.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Shared hub reference.
pub type SharedTickHub = Arc<TickHub>;

// =============================================================================
// Tests
// =============================================================================
