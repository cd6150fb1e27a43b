//! Shared run state and the events the worker emits

use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    CollectingSources,
    Preparing,
    CleaningDestination,
    /// 1-based index of the file being converted
    ConvertingFile(usize),
    Finalizing,
    Completed,
    Cancelled,
    Failed,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { converted: usize },
    Cancelled { converted: usize },
    Failed,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }

    pub fn phase(&self) -> RunPhase {
        match self {
            RunOutcome::Completed { .. } => RunPhase::Completed,
            RunOutcome::Cancelled { .. } => RunPhase::Cancelled,
            RunOutcome::Failed => RunPhase::Failed,
        }
    }
}

/// Events emitted by the worker, in order
#[derive(Debug, Clone, PartialEq)]
pub enum PrepareEvent {
    /// A line for the running log
    Log(String),
    /// Short status text
    Status(String),
    /// `current` files done out of `total`
    Progress { current: usize, total: usize },
    /// Last event of every run
    Done { success: bool },
}

/// State shared between the front-end and the worker
///
/// The cancellation flag only ever goes from false to true during a run. The
/// process slot holds the encoder child while one is running so a stop
/// request can kill it right away.
#[derive(Debug, Default)]
pub struct RunState {
    cancelled: AtomicBool,
    process: Mutex<Option<Child>>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop and kill the running encoder, if any
    pub fn request_stop(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(child) = self.process().as_mut() {
            if let Err(e) = child.kill() {
                log::debug!("Could not kill encoder process: {}", e);
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn has_process(&self) -> bool {
        self.process().is_some()
    }

    /// Hand a freshly spawned encoder to the shared slot
    pub(crate) fn register_process(&self, child: Child) {
        *self.process() = Some(child);
    }

    /// Non-blocking status check of the registered encoder
    pub(crate) fn poll_process(&self) -> std::io::Result<Option<ExitStatus>> {
        match self.process().as_mut() {
            Some(child) => child.try_wait(),
            None => Err(std::io::Error::other("no encoder process registered")),
        }
    }

    /// Kill the registered encoder and wait for it to be reaped
    pub(crate) fn kill_process(&self) {
        if let Some(child) = self.process().as_mut() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    /// Remove the encoder from the shared slot
    pub(crate) fn unregister_process(&self) -> Option<Child> {
        self.process().take()
    }

    fn process(&self) -> MutexGuard<'_, Option<Child>> {
        self.process.lock().unwrap_or_else(|e| e.into_inner())
    }
}
