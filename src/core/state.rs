//! Application state types
//!
//! - Settings: persisted preferences
//! - SourceMode: where a run takes its MP3 files from
//! - PrepareOptions / PrepareJob: immutable configuration of one run

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::profiles::{ConversionProfile, DEFAULT_PROFILE_KEY};
use crate::error::PrepareError;
use crate::volume::is_probably_system_volume;

/// Folder created at the volume root
pub const DEST_ROOT_DIRNAME: &str = "PODCASTS";
/// Flat folder inside [`DEST_ROOT_DIRNAME`] that receives converted files
pub const DEST_SUBDIR: &str = "INBOX";
/// Scratch folder created inside the chosen temp directory
pub const TEMP_SUBDIR: &str = "autoradio_tmp";

const APP_DIR_NAME: &str = "autoradio-usb";

fn default_profile() -> String {
    DEFAULT_PROFILE_KEY.to_string()
}

fn default_true() -> bool {
    true
}

fn default_norm_mode() -> String {
    "fast".to_string()
}

/// Application-wide settings
///
/// Persisted to `<data dir>/autoradio-usb/settings.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Key of the conversion profile
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Where the scratch folder goes; `None` means Desktop, else home
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub reset_metadata: bool,
    #[serde(default = "default_true")]
    pub short_titles: bool,
    #[serde(default = "default_true")]
    pub clean_destination: bool,
    #[serde(default = "default_true")]
    pub clean_temp: bool,
    /// Loudness normalization mode, stored for later use
    #[serde(default = "default_norm_mode")]
    pub audio_norm_mode: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            temp_dir: None,
            reset_metadata: true,
            short_titles: true,
            clean_destination: true,
            clean_temp: true,
            audio_norm_mode: default_norm_mode(),
        }
    }
}

impl Settings {
    const SETTINGS_FILE: &'static str = "settings.json";

    /// Keys accepted by [`Settings::set`]
    pub const KEYS: [&'static str; 7] = [
        "profile",
        "temp_dir",
        "reset_metadata",
        "short_titles",
        "clean_destination",
        "clean_temp",
        "audio_norm_mode",
    ];

    /// Get the app data directory, creating it if needed
    fn get_app_data_dir() -> Result<PathBuf, String> {
        let data_dir =
            dirs::data_dir().ok_or_else(|| "Could not determine data directory".to_string())?;

        let app_dir = data_dir.join(APP_DIR_NAME);
        if !app_dir.exists() {
            std::fs::create_dir_all(&app_dir)
                .map_err(|e| format!("Failed to create app data directory: {}", e))?;
        }

        Ok(app_dir)
    }

    pub fn settings_path() -> Result<PathBuf, String> {
        Ok(Self::get_app_data_dir()?.join(Self::SETTINGS_FILE))
    }

    /// Load settings from disk, or return defaults if missing or unreadable
    pub fn load() -> Self {
        match Self::settings_path() {
            Ok(path) => Self::load_from(&path),
            Err(e) => {
                log::debug!("Using default settings: {}", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match Self::try_load_from(path) {
            Ok(settings) => {
                log::debug!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                log::debug!("Using default settings: {}", e);
                Self::default()
            }
        }
    }

    fn try_load_from(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Err("Settings file not found".to_string());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read settings: {}", e))?;

        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse settings: {}", e))
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        std::fs::write(path, json).map_err(|e| format!("Failed to write settings: {}", e))?;

        log::debug!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Change one setting from its textual form
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "profile" => {
                let profile = ConversionProfile::find(value).ok_or_else(|| {
                    format!(
                        "Unknown profile '{}' (expected one of: {})",
                        value,
                        ConversionProfile::keys().join(", ")
                    )
                })?;
                self.profile = profile.key.to_string();
            }
            "temp_dir" => {
                let value = value.trim();
                self.temp_dir = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "reset_metadata" => self.reset_metadata = parse_bool(value)?,
            "short_titles" => self.short_titles = parse_bool(value)?,
            "clean_destination" => self.clean_destination = parse_bool(value)?,
            "clean_temp" => self.clean_temp = parse_bool(value)?,
            "audio_norm_mode" => self.audio_norm_mode = value.trim().to_string(),
            _ => {
                return Err(format!(
                    "Unknown setting '{}' (expected one of: {})",
                    key,
                    Self::KEYS.join(", ")
                ));
            }
        }
        Ok(())
    }

    /// Configured temp directory, else the Desktop, else the home folder
    pub fn effective_temp_dir(&self) -> PathBuf {
        if let Some(dir) = &self.temp_dir {
            return dir.clone();
        }
        dirs::desktop_dir()
            .filter(|d| d.is_dir())
            .or_else(dirs::home_dir)
            .unwrap_or_else(std::env::temp_dir)
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(format!("Expected true or false, got '{}'", other)),
    }
}

/// Where a run takes its MP3 files from
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceMode {
    /// Only the files given explicitly
    #[value(name = "selected")]
    SelectedFiles,
    /// Only MP3 files already somewhere on the volume
    #[value(name = "volume")]
    FilesAlreadyOnVolume,
    /// Explicit files first, then the volume's own
    #[value(name = "both")]
    Both,
}

impl SourceMode {
    pub fn uses_selection(&self) -> bool {
        matches!(self, SourceMode::SelectedFiles | SourceMode::Both)
    }

    pub fn uses_volume(&self) -> bool {
        matches!(self, SourceMode::FilesAlreadyOnVolume | SourceMode::Both)
    }
}

/// Per-run switches
#[derive(Debug, Clone, PartialEq)]
pub struct PrepareOptions {
    pub profile: ConversionProfile,
    pub reset_metadata: bool,
    pub short_titles: bool,
    pub clean_destination: bool,
    pub clean_temp: bool,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for PrepareOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            profile: ConversionProfile::find_or_default(&settings.profile),
            reset_metadata: settings.reset_metadata,
            short_titles: settings.short_titles,
            clean_destination: settings.clean_destination,
            clean_temp: settings.clean_temp,
        }
    }
}

/// Everything one run needs, captured once and moved into the worker
#[derive(Debug, Clone)]
pub struct PrepareJob {
    pub volume: PathBuf,
    pub source_mode: SourceMode,
    pub selected_files: Vec<PathBuf>,
    /// Parent of the scratch folder
    pub temp_dir: PathBuf,
    pub options: PrepareOptions,
}

impl PrepareJob {
    /// `<volume>/PODCASTS`
    pub fn dest_root(&self) -> PathBuf {
        self.volume.join(DEST_ROOT_DIRNAME)
    }

    /// `<volume>/PODCASTS/INBOX`
    pub fn inbox_dir(&self) -> PathBuf {
        self.dest_root().join(DEST_SUBDIR)
    }

    /// `<temp dir>/autoradio_tmp`
    pub fn work_dir(&self) -> PathBuf {
        self.temp_dir.join(TEMP_SUBDIR)
    }

    /// Blocking checks that must pass before anything is touched
    pub fn validate(&self) -> Result<(), PrepareError> {
        if self.volume.as_os_str().is_empty() {
            return Err(PrepareError::Preflight("no USB volume selected".to_string()));
        }
        if !self.volume.is_dir() {
            return Err(PrepareError::Preflight(format!(
                "volume not found: {}",
                self.volume.display()
            )));
        }
        if is_probably_system_volume(&self.volume) {
            return Err(PrepareError::Preflight(format!(
                "{} looks like the system drive, refusing to write to it",
                self.volume.display()
            )));
        }
        if self.temp_dir.as_os_str().is_empty() || !self.temp_dir.is_dir() {
            return Err(PrepareError::Preflight(format!(
                "temp folder not found: {}",
                self.temp_dir.display()
            )));
        }
        if self.source_mode == SourceMode::SelectedFiles && self.selected_files.is_empty() {
            return Err(PrepareError::Preflight(
                "no MP3 file selected".to_string(),
            ));
        }
        Ok(())
    }
}
