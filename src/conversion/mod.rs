//! MP3 conversion
//!
//! Finds the ffmpeg binary, runs it per file and drives the batch worker.

mod background;
mod ffmpeg;
mod pipeline;

pub use background::PrepareEvent;
pub use ffmpeg::Transcoder;
pub use pipeline::start_prepare;

use std::path::{Path, PathBuf};

use crate::error::PrepareError;

/// Environment variable that points at a specific ffmpeg binary
pub const FFMPEG_ENV: &str = "AUTORADIO_FFMPEG";

#[cfg(windows)]
const FFMPEG_NAMES: [&str; 2] = ["ffmpeg.exe", "ffmpeg"];
#[cfg(not(windows))]
const FFMPEG_NAMES: [&str; 1] = ["ffmpeg"];

/// Per-platform folders under `tools/` that may hold a bundled ffmpeg
fn platform_tool_dirs() -> Vec<&'static str> {
    if cfg!(windows) {
        vec!["windows", "win", "win32", "win64", "windows-x86_64", "windows-amd64"]
    } else if cfg!(target_os = "macos") {
        let mut dirs = if cfg!(target_arch = "aarch64") {
            vec!["macos-arm64", "macos-arm", "darwin-arm64"]
        } else {
            vec!["macos-x86_64", "macos-x64", "darwin-x86_64"]
        };
        dirs.extend(["macos", "darwin", "osx"]);
        dirs
    } else {
        vec!["linux", "linux-x86_64", "linux-x64", "linux-arm64", "linux-aarch64"]
    }
}

/// Candidate locations of a bundled ffmpeg below `tools_root`, in search order
fn bundled_candidates(tools_root: &Path) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = FFMPEG_NAMES.iter().map(|n| tools_root.join(n)).collect();
    for sub in platform_tool_dirs() {
        candidates.extend(FFMPEG_NAMES.iter().map(|n| tools_root.join(sub).join(n)));
    }
    candidates
}

/// Locate ffmpeg
///
/// Looks at `AUTORADIO_FFMPEG`, then `tools/` next to the executable (and
/// its per-platform subfolders), then every directory on `PATH`.
pub fn find_ffmpeg() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(FFMPEG_ENV).map(PathBuf::from) {
        if path.is_file() {
            log::debug!("Using ffmpeg from {}: {:?}", FFMPEG_ENV, path);
            return Some(path);
        }
        log::warn!("{} points to a missing file: {:?}", FFMPEG_ENV, path);
    }

    if let Ok(exe_path) = std::env::current_exe()
        && let Some(exe_dir) = exe_path.parent()
    {
        for candidate in bundled_candidates(&exe_dir.join("tools")) {
            if candidate.is_file() {
                ensure_executable(&candidate);
                log::debug!("Found bundled ffmpeg at {:?}", candidate);
                return Some(candidate);
            }
        }
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .flat_map(|dir| FFMPEG_NAMES.iter().map(move |n| dir.join(n)))
        .find(|candidate| candidate.is_file() && is_executable(candidate))
}

/// Verify that ffmpeg exists and is executable
pub fn verify_ffmpeg(path: &Path) -> Result<(), PrepareError> {
    if !path.is_file() {
        return Err(PrepareError::EncoderNotFound);
    }
    if !is_executable(path) {
        return Err(PrepareError::Preflight(format!(
            "ffmpeg at {} is not executable",
            path.display()
        )));
    }
    Ok(())
}

/// Find and verify ffmpeg in one go
pub fn locate_ffmpeg() -> Result<PathBuf, PrepareError> {
    let path = find_ffmpeg().ok_or(PrepareError::EncoderNotFound)?;
    verify_ffmpeg(&path)?;
    Ok(path)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Best-effort `chmod +x` on a bundled binary that lost its mode bits
#[cfg(unix)]
fn ensure_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if is_executable(path) {
        return;
    }
    let Ok(metadata) = std::fs::metadata(path) else {
        return;
    };
    let mut permissions = metadata.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    if let Err(e) = std::fs::set_permissions(path, permissions) {
        log::debug!("Could not make {:?} executable: {}", path, e);
    }
}

#[cfg(not(unix))]
fn ensure_executable(_path: &Path) {}
