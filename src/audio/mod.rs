// Audio module - file detection, title reading, naming and tag hardening

pub mod detection;
pub mod metadata;
pub mod metadata_writer;
pub mod naming;

pub use detection::{is_hidden_name, is_mp3_file};
pub use metadata::read_title;
pub use metadata_writer::reset_keeping_title;
pub use naming::output_file_name;
