//! Errors raised while preparing a USB drive
//!
//! Only the batch pipeline and the transcode invoker produce these. Probing,
//! title reading and metadata hardening are best-effort and never fail the run.

use std::io;

use thiserror::Error;

/// Failure (or user stop) of a preparation run
#[derive(Debug, Error)]
pub enum PrepareError {
    /// The user asked the run to stop. Not an error condition for reporting purposes.
    #[error("stopped by user")]
    Cancelled,

    /// The encoder ran and exited with a nonzero status
    #[error("ffmpeg exited with {status}: {stderr}")]
    EncoderFailed { status: String, stderr: String },

    /// The encoder process could not be started
    #[error("failed to spawn ffmpeg: {0}")]
    EncoderSpawn(#[source] io::Error),

    /// No encoder binary could be located
    #[error("ffmpeg is required: place it in tools/ or add it to PATH")]
    EncoderNotFound,

    /// A filesystem operation failed
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Source collection produced nothing to convert
    #[error("no MP3 file to process")]
    NoSources,

    /// A pre-flight check refused to start the job
    #[error("{0}")]
    Preflight(String),
}

impl PrepareError {
    /// Build a closure suitable for `map_err` that wraps an I/O error with context
    pub fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let context = context.into();
        move |source| Self::Io { context, source }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
