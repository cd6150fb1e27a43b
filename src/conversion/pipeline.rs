//! Batch preparation worker
//!
//! Core principle: the job is captured once and the worker owns it. The
//! front-end only sees events and can only ask the run to stop.
//!
//! A run goes through collecting sources, preparing the scratch and inbox
//! folders, converting each file in order and finalizing. Every run ends
//! with exactly one [`PrepareEvent::Done`].

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use walkdir::WalkDir;

use super::background::{PrepareEvent, RunOutcome, RunPhase, RunState};
use super::ffmpeg::Transcoder;
use crate::audio::{is_hidden_name, is_mp3_file, output_file_name, read_title, reset_keeping_title};
use crate::core::{PrepareJob, SourceMode};
use crate::error::PrepareError;

/// Handle for controlling a running preparation from the front-end
pub struct PrepareHandle {
    state: Arc<RunState>,
    thread: JoinHandle<RunOutcome>,
}

impl PrepareHandle {
    /// Request a stop; the worker reports `Done { success: false }` shortly after
    pub fn stop(&self) {
        self.state.request_stop();
    }

    pub fn is_stopping(&self) -> bool {
        self.state.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> RunOutcome {
        self.thread.join().unwrap_or_else(|_| {
            log::error!("Preparation worker panicked");
            RunOutcome::Failed
        })
    }
}

/// Start a preparation on a background thread
pub fn start_prepare(
    job: PrepareJob,
    transcoder: Transcoder,
) -> (PrepareHandle, mpsc::Receiver<PrepareEvent>) {
    let state = Arc::new(RunState::new());
    let (tx, rx) = mpsc::channel();

    let worker_state = state.clone();
    let thread = thread::spawn(move || run_job(&job, &transcoder, &worker_state, &tx));

    (PrepareHandle { state, thread }, rx)
}

/// Run a whole job on the current thread
pub fn run_job(
    job: &PrepareJob,
    transcoder: &Transcoder,
    state: &RunState,
    tx: &mpsc::Sender<PrepareEvent>,
) -> RunOutcome {
    let mut worker = Worker {
        job,
        transcoder,
        state,
        tx,
        phase: RunPhase::Idle,
        converted: 0,
    };

    let outcome = match worker.execute() {
        Ok(()) => {
            worker.log("=== Preparation finished ===");
            RunOutcome::Completed {
                converted: worker.converted,
            }
        }
        Err(e) if e.is_cancelled() => {
            worker.log("Preparation stopped by user.");
            RunOutcome::Cancelled {
                converted: worker.converted,
            }
        }
        Err(e) => {
            worker.log(format!("Error: {}", e));
            RunOutcome::Failed
        }
    };

    worker.phase = outcome.phase();
    log::debug!("Preparation ended in {:?} after {} file(s)", worker.phase, worker.converted);
    worker.status(match outcome {
        RunOutcome::Completed { .. } => "Done",
        RunOutcome::Cancelled { .. } => "Stopped",
        RunOutcome::Failed => "Failed",
    });
    worker.send(PrepareEvent::Done {
        success: outcome.is_success(),
    });
    outcome
}

struct Worker<'a> {
    job: &'a PrepareJob,
    transcoder: &'a Transcoder,
    state: &'a RunState,
    tx: &'a mpsc::Sender<PrepareEvent>,
    phase: RunPhase,
    converted: usize,
}

impl Worker<'_> {
    fn send(&self, event: PrepareEvent) {
        // A closed channel means nobody is listening any more
        let _ = self.tx.send(event);
    }

    fn log(&self, line: impl Into<String>) {
        self.send(PrepareEvent::Log(line.into()));
    }

    fn status(&self, text: impl Into<String>) {
        self.send(PrepareEvent::Status(text.into()));
    }

    fn enter(&mut self, phase: RunPhase) {
        log::debug!("Preparation phase: {:?}", phase);
        self.phase = phase;
    }

    fn execute(&mut self) -> Result<(), PrepareError> {
        let job = self.job;
        let options = &job.options;

        self.enter(RunPhase::CollectingSources);
        self.status("Collecting source files…");
        let sources = collect_sources(job);
        if sources.is_empty() {
            return Err(PrepareError::NoSources);
        }

        self.enter(RunPhase::Preparing);
        let work_dir = job.work_dir();
        std::fs::create_dir_all(&work_dir).map_err(PrepareError::io(format!(
            "Failed to create temp folder {}",
            work_dir.display()
        )))?;

        let inbox = job.inbox_dir();
        if options.clean_destination {
            self.enter(RunPhase::CleaningDestination);
            self.status("Cleaning the INBOX folder on the USB stick…");
            if inbox.exists() {
                std::fs::remove_dir_all(&inbox).map_err(PrepareError::io(format!(
                    "Failed to clean {}",
                    inbox.display()
                )))?;
            }
        }
        std::fs::create_dir_all(&inbox).map_err(PrepareError::io(format!(
            "Failed to create {}",
            inbox.display()
        )))?;

        let total = sources.len();
        let bitrate = options.profile.bitrate;
        self.log(format!("Files to process: {}", total));

        for (i, src) in sources.iter().enumerate() {
            if self.state.is_cancelled() {
                return Err(PrepareError::Cancelled);
            }

            let index = i + 1;
            self.enter(RunPhase::ConvertingFile(index));
            let display_name = src
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            self.status(format!("Processing {}/{}: {}", index, total, display_name));
            self.send(PrepareEvent::Progress {
                current: i,
                total,
            });

            let title = read_title(src);
            let out_name = output_file_name(index, &title, options.short_titles);
            let tmp_out = work_dir.join(&out_name);

            self.transcoder
                .convert(src, &tmp_out, bitrate, options.reset_metadata, self.state)?;

            if options.reset_metadata {
                reset_keeping_title(&tmp_out, &title);
            }

            let dest_file = inbox.join(&out_name);
            copy_preserving_times(&tmp_out, &dest_file)?;
            self.converted += 1;
            self.log(format!("OK {}", out_name));
        }

        self.send(PrepareEvent::Progress {
            current: total,
            total,
        });

        self.enter(RunPhase::Finalizing);
        self.status("Finalizing…");
        if options.clean_temp {
            match std::fs::remove_dir_all(&work_dir) {
                Ok(()) => self.log("Temporary files removed."),
                Err(e) => self.log(format!("Warning: could not remove temporary files: {}", e)),
            }
        }

        Ok(())
    }
}

/// Copy a converted file onto the volume, keeping its access and modification times
fn copy_preserving_times(src: &Path, dst: &Path) -> Result<(), PrepareError> {
    std::fs::copy(src, dst).map_err(PrepareError::io(format!(
        "Failed to copy {} to {}",
        src.display(),
        dst.display()
    )))?;

    if let Ok(metadata) = std::fs::metadata(src) {
        let atime = filetime::FileTime::from_last_access_time(&metadata);
        let mtime = filetime::FileTime::from_last_modification_time(&metadata);
        if let Err(e) = filetime::set_file_times(dst, atime, mtime) {
            log::debug!("Could not preserve timestamps on {}: {}", dst.display(), e);
        }
    }
    Ok(())
}

/// Resolve the MP3 files a job will convert, in order
///
/// Explicit selections come first, then files found on the volume. A path
/// seen twice (after resolving) keeps its first position. When the inbox is
/// about to be wiped its content is left out, since it will not exist by the
/// time it would be converted.
pub fn collect_sources(job: &PrepareJob) -> Vec<PathBuf> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut sources = Vec::new();

    let mut add = |path: &Path| {
        if !is_usable_source(path) {
            return;
        }
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if seen.insert(key) {
            sources.push(path.to_path_buf());
        }
    };

    if job.source_mode.uses_selection() {
        for path in &job.selected_files {
            add(path);
        }
    }

    if job.source_mode.uses_volume() {
        let skip_inbox = job.options.clean_destination.then(|| job.inbox_dir());
        for entry in WalkDir::new(&job.volume)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| match &skip_inbox {
                Some(inbox) => e.path() != inbox.as_path(),
                None => true,
            })
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() {
                add(entry.path());
            }
        }
    }

    if job.source_mode == SourceMode::SelectedFiles && sources.len() < job.selected_files.len() {
        log::debug!(
            "Ignored {} selected path(s) that are not readable MP3 files",
            job.selected_files.len() - sources.len()
        );
    }

    sources
}

fn is_usable_source(path: &Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    !is_hidden_name(name) && is_mp3_file(path) && path.is_file() && File::open(path).is_ok()
}
