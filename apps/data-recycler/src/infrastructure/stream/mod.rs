//! Stream serving - wire messages and the WebSocket server.

pub mod messages;
pub mod server;

pub use messages::{
    ClientRequest, EmissionError, ErrorMessage, SubscriptionAck, SuccessKind, SuccessMessage,
    TickBar,
};
pub use server::{ServerError, ServerStats, StreamServer};
