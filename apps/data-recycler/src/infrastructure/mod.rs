//! Infrastructure layer - Adapters and external integrations.

pub mod broadcast;
pub mod config;
pub mod source;
pub mod stream;
pub mod telemetry;
