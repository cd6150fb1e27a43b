//! USB volume inspection
//!
//! - `probe`: candidate volumes, filesystem type, capacity
//! - `scan`: tree statistics
//! - `analysis`: car-radio compatibility rules and the text report

pub mod analysis;
pub mod probe;
pub mod scan;

pub use analysis::{analyze, format_size};
pub use probe::{is_probably_system_volume, list_candidate_volumes, VolumeInfo};
