//! Logging setup
//!
//! Everything goes to the terminal and to a file users can attach to a bug
//! report:
//! - macOS: `~/Library/Logs/autoradio-usb/autoradio-usb.log`
//! - elsewhere: `<local data dir>/autoradio-usb/logs/autoradio-usb.log`

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

const LOG_FILE_NAME: &str = "autoradio-usb.log";

/// Log files above this size are moved aside at startup
const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

pub fn get_log_directory() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Logs").join("autoradio-usb"))
    } else {
        dirs::data_local_dir().map(|d| d.join("autoradio-usb").join("logs"))
    }
}

pub fn get_log_file_path() -> Option<PathBuf> {
    get_log_directory().map(|d| d.join(LOG_FILE_NAME))
}

fn log_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_thread_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build()
}

/// Move `log_path` to `<name>.old` when it grew past `max_bytes`
fn rotate_if_large(log_path: &Path, max_bytes: u64) {
    let Ok(metadata) = fs::metadata(log_path) else {
        return;
    };
    if metadata.len() > max_bytes {
        let mut backup = log_path.as_os_str().to_owned();
        backup.push(".old");
        let _ = fs::rename(log_path, PathBuf::from(backup));
    }
}

/// Initialize terminal + file logging
///
/// The terminal shows `term_level` and above, the file always captures
/// debug. Falls back to the terminal alone when the file cannot be opened.
/// Returns the log file path on success.
pub fn init_logging(term_level: LevelFilter) -> Option<PathBuf> {
    let Some(log_dir) = get_log_directory() else {
        eprintln!("Warning: Could not determine log directory");
        init_terminal_only(term_level);
        return None;
    };

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        init_terminal_only(term_level);
        return None;
    }

    let log_path = log_dir.join(LOG_FILE_NAME);
    rotate_if_large(&log_path, MAX_LOG_BYTES);

    let log_file = match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file: {}", e);
            init_terminal_only(term_level);
            return None;
        }
    };

    let loggers: Vec<Box<dyn SharedLogger>> = vec![
        TermLogger::new(term_level, log_config(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(LevelFilter::Debug, log_config(), log_file),
    ];

    if CombinedLogger::init(loggers).is_err() {
        eprintln!("Warning: Logger already initialized");
    }

    log::info!("=== autoradio-usb session started ===");
    log::debug!("Log file: {}", log_path.display());

    Some(log_path)
}

fn init_terminal_only(term_level: LevelFilter) {
    let term_logger = TermLogger::new(term_level, log_config(), TerminalMode::Mixed, ColorChoice::Auto);
    let _ = CombinedLogger::init(vec![term_logger]);
}
