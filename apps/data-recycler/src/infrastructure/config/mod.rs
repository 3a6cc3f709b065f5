//! Configuration loading.

pub mod settings;

pub use settings::{RecyclerSettings, ServerSettings, SettingsError};
