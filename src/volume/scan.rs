//! Tree statistics for the compatibility analyzer

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::audio::{is_hidden_name, is_mp3_file};

/// File names longer than this many characters are counted as long
pub const MAX_NAME_LEN: usize = 64;

/// Counters describing the layout of a volume
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub file_count: usize,
    pub mp3_count: usize,
    pub other_count: usize,
    /// Deepest directory below the root; the root itself is depth 0
    pub max_depth: usize,
    pub max_files_in_dir: usize,
    pub long_name_count: usize,
    pub non_ascii_name_count: usize,
    pub total_mp3_bytes: u64,
}

/// Walk the whole tree under `root` and collect its statistics
///
/// Hidden files (`.name`) and macOS resource forks (`._name`) are ignored by
/// every counter. Hidden directories are still walked, symlinked ones are
/// not. Unreadable entries are skipped.
pub fn scan(root: &Path) -> TreeStats {
    let mut stats = TreeStats::default();
    let mut files_per_dir: HashMap<PathBuf, usize> = HashMap::new();

    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_dir() {
            stats.max_depth = stats.max_depth.max(entry.depth());
            continue;
        }
        // Links to directories are directories, just not walked into
        if entry.path_is_symlink() && entry.path().is_dir() {
            continue;
        }

        let name = entry.file_name();
        if is_hidden_name(name) {
            continue;
        }

        if let Some(parent) = entry.path().parent() {
            *files_per_dir.entry(parent.to_path_buf()).or_default() += 1;
        }

        stats.file_count += 1;
        if is_mp3_file(entry.path()) {
            stats.mp3_count += 1;
            // A file we cannot stat still counts, it just adds nothing
            stats.total_mp3_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        } else {
            stats.other_count += 1;
        }

        let name = name.to_string_lossy();
        if name.chars().count() > MAX_NAME_LEN {
            stats.long_name_count += 1;
        }
        if !name.is_ascii() {
            stats.non_ascii_name_count += 1;
        }
    }

    stats.max_files_in_dir = files_per_dir.values().copied().max().unwrap_or(0);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path, bytes: usize) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, vec![0u8; bytes]).unwrap();
    }

    #[test]
    fn test_empty_tree() {
        let dir = TempDir::new().unwrap();
        assert_eq!(scan(dir.path()), TreeStats::default());
    }

    #[test]
    fn test_missing_root_yields_empty_stats() {
        assert_eq!(scan(Path::new("/nonexistent/usb/stick")), TreeStats::default());
    }

    #[test]
    fn test_counts_mp3_and_other_files() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.mp3"), 100);
        touch(&dir.path().join("B.MP3"), 50);
        touch(&dir.path().join("cover.jpg"), 10);
        touch(&dir.path().join("notes.txt"), 10);

        let stats = scan(dir.path());
        assert_eq!(stats.file_count, 4);
        assert_eq!(stats.mp3_count, 2);
        assert_eq!(stats.other_count, 2);
        assert_eq!(stats.total_mp3_bytes, 150);
        assert_eq!(stats.max_depth, 0);
        assert_eq!(stats.max_files_in_dir, 4);
    }

    #[test]
    fn test_hidden_files_do_not_change_stats() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("show/ep1.mp3"), 100);
        touch(&dir.path().join("show/ep2.mp3"), 100);
        let before = scan(dir.path());

        touch(&dir.path().join(".DS_Store"), 10);
        touch(&dir.path().join("show/._ep1.mp3"), 4096);
        touch(&dir.path().join("show/.hidden.mp3"), 4096);
        touch(&dir.path().join(".Trashes_marker"), 1);

        assert_eq!(scan(dir.path()), before);
    }

    #[test]
    fn test_depth_counts_directories_below_root() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a/b/c/deep.mp3"), 1);
        touch(&dir.path().join("a/shallow.mp3"), 1);

        let stats = scan(dir.path());
        assert_eq!(stats.max_depth, 3);
        assert_eq!(stats.max_files_in_dir, 1);
    }

    #[test]
    fn test_empty_subdirectories_still_count_for_depth() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("x/y")).unwrap();
        assert_eq!(scan(dir.path()).max_depth, 2);
    }

    #[test]
    fn test_max_files_in_single_directory() {
        let dir = TempDir::new().unwrap();
        for i in 0..7 {
            touch(&dir.path().join(format!("busy/{i}.mp3")), 1);
        }
        for i in 0..3 {
            touch(&dir.path().join(format!("quiet/{i}.mp3")), 1);
        }
        touch(&dir.path().join("root.mp3"), 1);

        let stats = scan(dir.path());
        assert_eq!(stats.max_files_in_dir, 7);
        assert_eq!(stats.file_count, 11);
    }

    #[test]
    fn test_long_and_non_ascii_names() {
        let dir = TempDir::new().unwrap();
        let exactly_limit = format!("{}.mp3", "a".repeat(MAX_NAME_LEN - 4));
        let over_limit = format!("{}.mp3", "b".repeat(MAX_NAME_LEN));
        touch(&dir.path().join(exactly_limit), 1);
        touch(&dir.path().join(over_limit), 1);
        touch(&dir.path().join("été.mp3"), 1);
        touch(&dir.path().join("plain.mp3"), 1);

        let stats = scan(dir.path());
        assert_eq!(stats.long_name_count, 1);
        assert_eq!(stats.non_ascii_name_count, 1);
    }

    #[test]
    fn test_long_name_measured_in_characters() {
        let dir = TempDir::new().unwrap();
        // 60 two-byte characters: over 64 bytes, under 64 characters
        let name = format!("{}.mp3", "é".repeat(60));
        touch(&dir.path().join(name), 1);

        let stats = scan(dir.path());
        assert_eq!(stats.long_name_count, 0);
        assert_eq!(stats.non_ascii_name_count, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_is_not_a_file() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        touch(&outside.path().join("elsewhere.mp3"), 10);
        touch(&dir.path().join("real.mp3"), 20);
        std::os::unix::fs::symlink(outside.path(), dir.path().join("linked.mp3")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.mp3"), dir.path().join("alias.mp3")).unwrap();

        let stats = scan(dir.path());
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.mp3_count, 2);
        assert_eq!(stats.other_count, 0);
        assert_eq!(stats.max_depth, 0);
    }
}
