//! Metadata hardening for converted files
//!
//! Some head units crash or hang on large or exotic tags. After conversion we
//! wipe every tag the file carries and write back a lone ID3v2.3 title frame.
//! This is advisory: the title already went through ffmpeg, so any failure
//! here leaves a perfectly playable file and is only logged.

use std::path::Path;

use lofty::config::WriteOptions;
use lofty::id3::v2::Id3v2Tag;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::TagType;

/// Strip all metadata from `path` and keep only `title`, saved as ID3v2.3
pub fn reset_keeping_title(path: &Path, title: &str) {
    if let Err(e) = try_reset_keeping_title(path, title) {
        log::debug!("Metadata reset skipped for {}: {}", path.display(), e);
    }
}

fn try_reset_keeping_title(path: &Path, title: &str) -> Result<(), String> {
    remove_all_tags(path);

    let mut tag = Id3v2Tag::new();
    tag.set_title(title.to_string());

    tag.save_to_path(path, WriteOptions::default().use_id3v23(true))
        .map_err(|e| format!("Failed to save title tag: {}", e))
}

/// Delete every tag the file carries, ignoring individual failures
///
/// Only tag types actually present are removed: lofty writes an empty
/// ID3v1 block when asked to remove one that is absent.
fn remove_all_tags(path: &Path) {
    let tag_types: Vec<TagType> = match Probe::open(path).and_then(|p| p.read()) {
        Ok(tagged_file) => tagged_file.tags().iter().map(|t| t.tag_type()).collect(),
        Err(e) => {
            log::debug!("Could not read tags of {}: {}", path.display(), e);
            Vec::new()
        }
    };

    for tag_type in tag_types {
        if let Err(e) = tag_type.remove_from_path(path) {
            log::debug!("Could not remove {:?} from {}: {}", tag_type, path.display(), e);
        }
    }
}
