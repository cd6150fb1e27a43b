//! Best-effort detection of removable volumes, filesystem type and capacity
//!
//! Nothing here fails: a candidate that cannot be probed is skipped, an
//! unknown filesystem is reported as [`FsType::Unknown`] and an unreadable
//! capacity as zero.

use std::fmt;
use std::path::{Path, PathBuf};

/// Filesystem families that matter to car radios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsType {
    Fat32,
    Fat16,
    Vfat,
    Exfat,
    Ntfs,
    Unknown,
}

impl FsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FsType::Fat32 => "FAT32",
            FsType::Fat16 => "FAT16",
            FsType::Vfat => "VFAT",
            FsType::Exfat => "EXFAT",
            FsType::Ntfs => "NTFS",
            FsType::Unknown => "UNKNOWN",
        }
    }

    /// Map an OS-reported filesystem name onto a known family
    ///
    /// Accepts the spellings of `findmnt` (`vfat`, `exfat`, `ntfs3`),
    /// `diskutil` (`MS-DOS FAT32`, `ExFAT`), Windows (`FAT32`, `FAT`, `NTFS`)
    /// and sysinfo (`msdos`).
    pub fn classify(raw: &str) -> Self {
        let name = raw.trim().to_uppercase();
        if name.is_empty() {
            return FsType::Unknown;
        }
        // exFAT first: its name contains "FAT"
        if name.contains("EXFAT") {
            FsType::Exfat
        } else if name.contains("NTFS") {
            FsType::Ntfs
        } else if name == "VFAT" {
            FsType::Vfat
        } else if name.contains("FAT32") || name.contains("FAT_32") || name == "MSDOS" {
            FsType::Fat32
        } else if name.contains("FAT16") || name.contains("FAT_16") || name == "FAT" {
            FsType::Fat16
        } else if name.contains("MS-DOS") {
            FsType::Fat32
        } else {
            FsType::Unknown
        }
    }
}

impl fmt::Display for FsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a volume, taken fresh on every analysis
#[derive(Debug, Clone)]
pub struct VolumeInfo {
    pub path: PathBuf,
    pub fs_type: FsType,
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl VolumeInfo {
    pub fn probe(path: &Path) -> Self {
        let (total_bytes, free_bytes) = capacity(path);
        Self {
            path: path.to_path_buf(),
            fs_type: filesystem_type(path),
            total_bytes,
            free_bytes,
        }
    }
}

/// List the volumes a USB stick is likely mounted at, in discovery order
pub fn list_candidate_volumes() -> Vec<PathBuf> {
    let volumes = platform_candidates();
    volumes.into_iter().filter(|v| v.exists()).collect()
}

#[cfg(windows)]
fn platform_candidates() -> Vec<PathBuf> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let removable: Vec<PathBuf> = disks
        .iter()
        .filter(|d| d.is_removable())
        .map(|d| d.mount_point().to_path_buf())
        .collect();

    if !removable.is_empty() {
        return removable;
    }

    // No removable flag anywhere: offer every drive letter that exists
    disks.iter().map(|d| d.mount_point().to_path_buf()).collect()
}

#[cfg(target_os = "macos")]
fn platform_candidates() -> Vec<PathBuf> {
    child_dirs(Path::new("/Volumes"))
}

#[cfg(all(unix, not(target_os = "macos")))]
fn platform_candidates() -> Vec<PathBuf> {
    use std::collections::HashSet;

    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default();

    let mut bases: Vec<PathBuf> = Vec::new();
    if !user.is_empty() {
        bases.push(Path::new("/media").join(&user));
        bases.push(Path::new("/run/media").join(&user));
    }
    bases.push(PathBuf::from("/media"));
    bases.push(PathBuf::from("/mnt"));

    let mut seen = HashSet::new();
    let mut volumes = Vec::new();
    for base in bases {
        for dir in child_dirs(&base) {
            if seen.insert(dir.clone()) {
                volumes.push(dir);
            }
        }
    }
    volumes
}

#[cfg(not(any(windows, unix)))]
fn platform_candidates() -> Vec<PathBuf> {
    Vec::new()
}

/// Sorted subdirectories of `base`, empty if it cannot be read
#[cfg(unix)]
fn child_dirs(base: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(base) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

/// Ask the OS which filesystem holds `path`
pub fn filesystem_type(path: &Path) -> FsType {
    let detected = native_filesystem_name(path)
        .map(|name| FsType::classify(&name))
        .filter(|fs| *fs != FsType::Unknown);

    match detected {
        Some(fs) => fs,
        None => sysinfo_filesystem_name(path)
            .map(|name| FsType::classify(&name))
            .unwrap_or(FsType::Unknown),
    }
}

#[cfg(target_os = "linux")]
fn native_filesystem_name(path: &Path) -> Option<String> {
    let output = std::process::Command::new("findmnt")
        .args(["-no", "FSTYPE", "--target"])
        .arg(path)
        .output()
        .ok()?;
    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if name.is_empty() { None } else { Some(name) }
}

#[cfg(target_os = "macos")]
fn native_filesystem_name(path: &Path) -> Option<String> {
    let output = std::process::Command::new("diskutil").arg("info").arg(path).output().ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_diskutil_personality(&stdout)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn native_filesystem_name(_path: &Path) -> Option<String> {
    None
}

/// Extract the value of `File System Personality:` from `diskutil info` output
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn parse_diskutil_personality(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim() == "File System Personality" {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

/// Filesystem name of the mount that most specifically contains `path`
fn sysinfo_filesystem_name(path: &Path) -> Option<String> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let target = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    #[cfg(not(unix))]
    let target = strip_verbatim_prefix(&target);
    disks
        .iter()
        .filter(|d| target.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().components().count())
        .map(|d| d.file_system().to_string_lossy().to_string())
}

/// Total and free bytes of the filesystem holding `path`, `(0, 0)` if unknown
#[cfg(unix)]
pub fn capacity(path: &Path) -> (u64, u64) {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return (0, 0);
    };
    let mut stats = MaybeUninit::<libc::statvfs>::zeroed();
    let result = unsafe { libc::statvfs(c_path.as_ptr(), stats.as_mut_ptr()) };
    if result != 0 {
        return (0, 0);
    }
    let stats = unsafe { stats.assume_init() };
    let frsize = stats.f_frsize as u64;
    let total = (stats.f_blocks as u64).saturating_mul(frsize);
    let free = (stats.f_bavail as u64).saturating_mul(frsize);
    (total, free)
}

#[cfg(not(unix))]
pub fn capacity(path: &Path) -> (u64, u64) {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let target = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let target = strip_verbatim_prefix(&target);
    disks
        .iter()
        .filter(|d| target.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().components().count())
        .map(|d| (d.total_space(), d.available_space()))
        .unwrap_or((0, 0))
}

/// Heuristic guard against preparing the machine's own system drive
pub fn is_probably_system_volume(path: &Path) -> bool {
    let Ok(resolved) = std::fs::canonicalize(path) else {
        return false;
    };

    #[cfg(windows)]
    {
        let system_drive = std::env::var("SystemDrive").unwrap_or_else(|_| "C:".to_string());
        let resolved = strip_verbatim_prefix(&resolved);
        resolved.to_string_lossy().to_uppercase() == format!("{}\\", system_drive.to_uppercase())
    }

    #[cfg(not(windows))]
    {
        resolved == Path::new("/")
    }
}

/// `canonicalize` on Windows yields `\\?\C:\...`; mount points do not carry the prefix
#[cfg(not(unix))]
fn strip_verbatim_prefix(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix(r"\\?\") {
        Some(rest) => PathBuf::from(rest),
        None => path.to_path_buf(),
    }
}
