//! autoradio-usb
//!
//! Prepares a USB stick for car radios: checks its layout, converts MP3
//! episodes to a conservative profile and copies them, renamed and with
//! minimal tags, into `PODCASTS/INBOX`.

mod audio;
mod conversion;
mod core;
mod error;
mod logging;
#[cfg(test)]
mod test_fixtures;
mod volume;

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use crate::conversion::{locate_ffmpeg, start_prepare, PrepareEvent, Transcoder};
use crate::core::{ConversionProfile, PrepareJob, PrepareOptions, Settings, SourceMode};
use crate::volume::{analyze, format_size, is_probably_system_volume, list_candidate_volumes, VolumeInfo};

/// How often the front-end drains worker events
const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(
    name = "autoradio-usb",
    version,
    about = "Prepare a USB stick of MP3 podcasts for car radios"
)]
struct Cli {
    /// Show debug output in the terminal
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List mounted volumes that look like USB sticks
    Volumes,

    /// Check a volume for car-radio compatibility problems
    Analyze { volume: PathBuf },

    /// Convert MP3 files into <VOLUME>/PODCASTS/INBOX
    Prepare {
        volume: PathBuf,

        /// MP3 files to add (used by the `selected` and `both` modes)
        #[arg(long, num_args = 1..)]
        files: Vec<PathBuf>,

        /// Source mode. Default: `selected` when files are given, else `volume`.
        #[arg(long, value_enum)]
        mode: Option<SourceMode>,

        /// Folder that receives the scratch directory
        #[arg(long)]
        temp: Option<PathBuf>,

        /// Encoding profile: eco, standard or quality
        #[arg(long)]
        profile: Option<String>,

        /// Keep source metadata instead of leaving only the title
        #[arg(long, default_value_t = false)]
        keep_metadata: bool,

        /// Allow 60-character titles in file names instead of 15
        #[arg(long, default_value_t = false)]
        long_titles: bool,

        /// Add to the INBOX folder instead of emptying it first
        #[arg(long, default_value_t = false)]
        keep_destination: bool,

        /// Leave the scratch directory in place afterwards
        #[arg(long, default_value_t = false)]
        keep_temp: bool,

        /// Do not ask for confirmation
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },

    /// Show or change persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current settings
    Show,
    /// Change one setting and save it
    Set { key: String, value: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let term_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logging::init_logging(term_level);
    log_diagnostics();

    let result = match cli.cmd {
        Commands::Volumes => list_volumes(),
        Commands::Analyze { volume } => analyze_volume(&volume),
        Commands::Prepare {
            volume,
            files,
            mode,
            temp,
            profile,
            keep_metadata,
            long_titles,
            keep_destination,
            keep_temp,
            yes,
        } => {
            let mut settings = Settings::load();
            if let Some(profile) = profile {
                if ConversionProfile::find(&profile).is_none() {
                    log::error!(
                        "Unknown profile '{}' (expected one of: {})",
                        profile,
                        ConversionProfile::keys().join(", ")
                    );
                    return ExitCode::FAILURE;
                }
                settings.profile = profile;
            }

            let mut options = PrepareOptions::from(&settings);
            options.reset_metadata &= !keep_metadata;
            options.short_titles &= !long_titles;
            options.clean_destination &= !keep_destination;
            options.clean_temp &= !keep_temp;

            let source_mode = mode.unwrap_or(if files.is_empty() {
                SourceMode::FilesAlreadyOnVolume
            } else {
                SourceMode::SelectedFiles
            });

            let job = PrepareJob {
                volume,
                source_mode,
                selected_files: files,
                temp_dir: temp.unwrap_or_else(|| settings.effective_temp_dir()),
                options,
            };
            prepare(job, yes)
        }
        Commands::Config { action } => configure(action),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn log_diagnostics() {
    log::debug!(
        "autoradio-usb {} on {} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    match conversion::find_ffmpeg() {
        Some(path) => log::debug!("ffmpeg detected: {}", path.display()),
        None => log::debug!("ffmpeg not detected"),
    }
}

fn list_volumes() -> Result<bool, String> {
    let volumes = list_candidate_volumes();
    if volumes.is_empty() {
        println!("No USB volume found.");
        return Ok(true);
    }

    for path in volumes {
        let info = VolumeInfo::probe(&path);
        println!(
            "{}  {}  {} free of {}",
            info.path.display(),
            info.fs_type,
            format_size(info.free_bytes),
            format_size(info.total_bytes)
        );
    }
    Ok(true)
}

/// Reject paths that are missing or are the machine's own drive
fn check_volume(volume: &Path) -> Result<(), String> {
    if !volume.is_dir() {
        return Err(format!("Volume not found: {}", volume.display()));
    }
    if is_probably_system_volume(volume) {
        return Err(format!(
            "{} looks like the system drive, pick the USB stick instead",
            volume.display()
        ));
    }
    Ok(())
}

fn analyze_volume(volume: &Path) -> Result<bool, String> {
    check_volume(volume)?;

    log::info!("Analyzing {}…", volume.display());
    let report = analyze(volume);
    for problem in &report.problems {
        log::debug!("Analysis problem: {}", problem);
    }
    println!("{}", report.render());
    Ok(true)
}

fn prepare(job: PrepareJob, assume_yes: bool) -> Result<bool, String> {
    let ffmpeg = locate_ffmpeg().map_err(|e| e.to_string())?;
    log::info!("ffmpeg detected: {}", ffmpeg.display());

    check_volume(&job.volume)?;
    job.validate().map_err(|e| e.to_string())?;

    let report = analyze(&job.volume);
    for problem in &report.problems {
        log::warn!("{}", problem);
    }
    if report.has_unsupported_filesystem()
        && !assume_yes
        && !confirm(&format!(
            "The filesystem is {}, which many car radios cannot read. Continue anyway?",
            report.volume.fs_type
        ))
    {
        log::info!("Preparation cancelled");
        return Ok(false);
    }
    if job.options.clean_destination
        && !assume_yes
        && !confirm(&format!(
            "Everything in {} will be deleted. Continue?",
            job.inbox_dir().display()
        ))
    {
        log::info!("Preparation cancelled");
        return Ok(false);
    }

    log::info!(
        "=== Preparation: {} ({}) ===",
        job.volume.display(),
        job.options.profile.label
    );

    let interrupts = spawn_interrupt_watcher();
    let (handle, events) = start_prepare(job, Transcoder::new(ffmpeg));

    let success = loop {
        if interrupts.try_recv().is_ok() && !handle.is_stopping() {
            log::warn!("Stop requested");
            log::info!("Stopping…");
            handle.stop();
        }

        let finished = handle.is_finished();
        if let Some(success) = drain_events(&events) {
            break success;
        }
        if finished {
            // The worker is gone without a terminal event
            break false;
        }
        thread::sleep(DRAIN_INTERVAL);
    };

    let outcome = handle.join();
    log::debug!("Worker outcome: {:?}", outcome);
    Ok(success)
}

/// Mirror pending worker events to the log, returning the `Done` flag if seen
fn drain_events(events: &mpsc::Receiver<PrepareEvent>) -> Option<bool> {
    let mut done = None;
    for event in events.try_iter() {
        match event {
            PrepareEvent::Log(line) => {
                if line.starts_with("Error") {
                    log::error!("{}", line);
                } else if line.starts_with("Warning") || line.contains("stopped") {
                    log::warn!("{}", line);
                } else {
                    log::info!("{}", line);
                }
            }
            PrepareEvent::Status(text) => log::info!("{}", text),
            PrepareEvent::Progress { current, total } => {
                log::debug!("Progress {}/{}", current, total)
            }
            PrepareEvent::Done { success } => done = Some(success),
        }
    }
    done
}

/// Forward every Ctrl-C to the returned channel
fn spawn_interrupt_watcher() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                log::warn!("Ctrl-C handling unavailable: {}", e);
                return;
            }
        };
        runtime.block_on(async {
            while tokio::signal::ctrl_c().await.is_ok() {
                if tx.send(()).is_err() {
                    break;
                }
            }
        });
    });
    rx
}

fn confirm(question: &str) -> bool {
    print!("{} [y/N] ", question);
    let _ = std::io::stdout().flush();

    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn configure(action: ConfigAction) -> Result<bool, String> {
    match action {
        ConfigAction::Show => {
            let settings = Settings::load();
            let json = serde_json::to_string_pretty(&settings)
                .map_err(|e| format!("Failed to serialize settings: {}", e))?;
            println!("{}", json);
            if let Ok(path) = Settings::settings_path() {
                println!("Settings file: {}", path.display());
            }
            println!("Temp folder in use: {}", settings.effective_temp_dir().display());
            if let Some(log_path) = logging::get_log_file_path() {
                println!("Log file: {}", log_path.display());
            }
        }
        ConfigAction::Set { key, value } => {
            let mut settings = Settings::load();
            settings.set(&key, &value)?;
            settings.save()?;
            log::info!("Saved {} = {}", key, value);
        }
    }
    Ok(true)
}
