use std::ffi::OsStr;
use std::path::Path;

/// Check if a file is an MP3 based on its extension (case-insensitive)
pub fn is_mp3_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("mp3"))
        .unwrap_or(false)
}

/// Check if a file name is hidden or a macOS resource-fork shadow (`._name`)
///
/// Such files are invisible to every count and never picked up as a source.
pub fn is_hidden_name(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') || name.starts_with("._")
}
