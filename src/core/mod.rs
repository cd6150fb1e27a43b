//! Core application state
//!
//! - Persisted settings
//! - Conversion profiles
//! - Per-run job configuration

mod profiles;
mod state;

pub use profiles::ConversionProfile;
pub use state::{PrepareJob, PrepareOptions, Settings, SourceMode};
