use std::path::Path;

use lofty::prelude::*;

/// Read the embedded title of an audio file
///
/// Falls back to the file name without extension when the file cannot be
/// parsed or carries no non-empty title.
pub fn read_title(path: &Path) -> String {
    match read_tag_title(path) {
        Some(title) => title,
        None => file_stem(path),
    }
}

fn read_tag_title(path: &Path) -> Option<String> {
    let tagged_file = match lofty::read_from_path(path) {
        Ok(f) => f,
        Err(e) => {
            log::debug!("No readable tags in {}: {}", path.display(), e);
            return None;
        }
    };

    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())?;
    let title = tag.title()?;
    let title = title.trim();

    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
