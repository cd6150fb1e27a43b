//! Car-radio compatibility analysis
//!
//! Combines the probe and the scanner into a report. Every problem is
//! advisory: the front-end shows them and asks before going ahead.

use std::fmt;
use std::path::Path;

use super::probe::{FsType, VolumeInfo};
use super::scan::{scan, TreeStats};

use super::scan::MAX_NAME_LEN;

/// Deepest directory level most head units browse
pub const MAX_DEPTH: usize = 2;
/// Files per directory before indexing gets unreliable
pub const MAX_FILES_PER_DIR: usize = 200;
/// Total file count some units stop indexing at
pub const MAX_TOTAL_FILES: usize = 1500;

/// One compatibility concern, in the order the rules are checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    UnsupportedFilesystem(FsType),
    VfatFilesystem,
    TooDeep(usize),
    CrowdedDirectory(usize),
    TooManyFiles(usize),
    NonAsciiNames(usize),
    LongNames(usize),
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::UnsupportedFilesystem(fs) => write!(
                f,
                "Filesystem detected: {}. FAT32 (or FAT16) is recommended.",
                fs
            ),
            Problem::VfatFilesystem => write!(
                f,
                "Filesystem detected: VFAT (FAT). FAT32 is recommended if possible."
            ),
            Problem::TooDeep(depth) => write!(
                f,
                "Deep folder tree (max depth {}). A simple tree is recommended.",
                depth
            ),
            Problem::CrowdedDirectory(count) => write!(
                f,
                "Too many files in one folder (max {}). 50 to 100 is recommended.",
                count
            ),
            Problem::TooManyFiles(count) => write!(
                f,
                "Many files ({}). Some car radios limit indexing.",
                count
            ),
            Problem::NonAsciiNames(count) => write!(
                f,
                "File names with non-ASCII characters detected ({}). This can cause problems.",
                count
            ),
            Problem::LongNames(count) => write!(
                f,
                "Long file names detected ({}). Short names are recommended.",
                count
            ),
        }
    }
}

/// Snapshot of a volume and everything wrong with it
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub volume: VolumeInfo,
    pub stats: TreeStats,
    pub problems: Vec<Problem>,
}

impl AnalysisReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }

    /// EXFAT, NTFS or unknown: worth an explicit confirmation before writing
    pub fn has_unsupported_filesystem(&self) -> bool {
        self.problems
            .iter()
            .any(|p| matches!(p, Problem::UnsupportedFilesystem(_)))
    }

    /// Human-readable report, stamped with the local time
    pub fn render(&self) -> String {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.render_at(&stamp)
    }

    fn render_at(&self, stamp: &str) -> String {
        let stats = &self.stats;
        let mut lines = vec![
            format!("=== Analysis report: {} ===", self.volume.path.display()),
            format!("Generated: {}", stamp),
            String::new(),
        ];

        if self.is_ok() {
            lines.push("Verdict: USB stick validated".to_string());
            lines.push(String::new());
        } else {
            lines.push("Verdict: USB stick may cause problems".to_string());
            lines.push(String::new());
            lines.push("Possible reasons:".to_string());
            lines.extend(self.problems.iter().map(|p| format!(" - {}", p)));
            lines.push(String::new());
        }

        lines.extend([
            "Specifications:".to_string(),
            format!(" - Filesystem: {}", self.volume.fs_type),
            format!(" - Total capacity: {}", format_size(self.volume.total_bytes)),
            format!(" - Free space: {}", format_size(self.volume.free_bytes)),
            String::new(),
            "Content:".to_string(),
            format!(" - Files: {}", stats.file_count),
            format!(" - MP3: {}", stats.mp3_count),
            format!(" - Other: {}", stats.other_count),
            format!(" - Max depth: {}", stats.max_depth),
            format!(" - Max files in one folder: {}", stats.max_files_in_dir),
            format!(" - Long names (>{}): {}", MAX_NAME_LEN, stats.long_name_count),
            format!(" - Non-ASCII names: {}", stats.non_ascii_name_count),
            format!(" - Total MP3: {}", format_size(stats.total_mp3_bytes)),
            String::new(),
            "Car radio recommendations:".to_string(),
            " - FAT32 recommended".to_string(),
            " - 50 to 100 files per folder at most".to_string(),
            format!(" - Simple tree ({} levels)", MAX_DEPTH),
            " - Short ASCII file names".to_string(),
        ]);

        lines.join("\n")
    }
}

/// Probe and scan `volume` from scratch
pub fn analyze(volume: &Path) -> AnalysisReport {
    let info = VolumeInfo::probe(volume);
    let stats = scan(volume);
    evaluate(info, stats)
}

/// Apply the compatibility rules to already collected facts
pub fn evaluate(volume: VolumeInfo, stats: TreeStats) -> AnalysisReport {
    let problems = find_problems(volume.fs_type, &stats);
    AnalysisReport {
        volume,
        stats,
        problems,
    }
}

pub fn find_problems(fs_type: FsType, stats: &TreeStats) -> Vec<Problem> {
    let mut problems = Vec::new();

    match fs_type {
        FsType::Exfat | FsType::Ntfs | FsType::Unknown => {
            problems.push(Problem::UnsupportedFilesystem(fs_type));
        }
        FsType::Vfat => problems.push(Problem::VfatFilesystem),
        FsType::Fat32 | FsType::Fat16 => {}
    }
    if stats.max_depth > MAX_DEPTH {
        problems.push(Problem::TooDeep(stats.max_depth));
    }
    if stats.max_files_in_dir > MAX_FILES_PER_DIR {
        problems.push(Problem::CrowdedDirectory(stats.max_files_in_dir));
    }
    if stats.file_count > MAX_TOTAL_FILES {
        problems.push(Problem::TooManyFiles(stats.file_count));
    }
    if stats.non_ascii_name_count > 0 {
        problems.push(Problem::NonAsciiNames(stats.non_ascii_name_count));
    }
    if stats.long_name_count > 0 {
        problems.push(Problem::LongNames(stats.long_name_count));
    }

    problems
}

/// Format a byte count with binary units, e.g. `1.50 MB`
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}
