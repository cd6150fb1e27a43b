//! FFmpeg subprocess handling for MP3 conversion

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use super::background::RunState;
use crate::error::PrepareError;

/// Longest stderr excerpt carried in an error
pub const STDERR_EXCERPT_LEN: usize = 1200;

/// How often a running encoder is checked for exit or cancellation
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs ffmpeg with the car-radio profile: CBR MP3, 44.1 kHz, joint stereo
#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg_path: PathBuf,
    poll_interval: Duration,
}

impl Transcoder {
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Build the ffmpeg argument list
    ///
    /// With `strip_metadata` the source's metadata and chapters are dropped
    /// and only an ID3v2.3 tag (no ID3v1) is written.
    pub fn build_args(src: &Path, dst: &Path, bitrate: &str, strip_metadata: bool) -> Vec<OsString> {
        let mut args = Vec::from(["-y", "-hide_banner", "-loglevel", "error", "-i"].map(OsString::from));
        args.push(src.as_os_str().to_owned());

        if strip_metadata {
            args.extend(["-map_metadata", "-1", "-map_chapters", "-1"].map(OsString::from));
        }

        args.extend(
            [
                "-vn",
                "-ac",
                "2",
                "-ar",
                "44100",
                "-codec:a",
                "libmp3lame",
                "-b:a",
                bitrate,
                "-joint_stereo",
                "1",
            ]
            .map(OsString::from),
        );

        if strip_metadata {
            args.extend(["-write_id3v1", "0", "-id3v2_version", "3"].map(OsString::from));
        }

        args.push(dst.as_os_str().to_owned());
        args
    }

    /// Convert `src` into `dst`, blocking until ffmpeg exits or the run is stopped
    ///
    /// The child is only held in `state` while this call runs. A stopped run
    /// or a failed encode removes the partial output.
    pub fn convert(
        &self,
        src: &Path,
        dst: &Path,
        bitrate: &str,
        strip_metadata: bool,
        state: &RunState,
    ) -> Result<(), PrepareError> {
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(PrepareError::io(format!(
                "Failed to create {}",
                parent.display()
            )))?;
        }

        if state.is_cancelled() {
            return Err(PrepareError::Cancelled);
        }

        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(Self::build_args(src, dst, bitrate, strip_metadata));
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());
        // Keep the terminal's Ctrl-C away from the encoder; the app stops it itself
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(PrepareError::EncoderSpawn)?;

        // Drain stderr on its own thread so a chatty encoder cannot fill the pipe
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).to_string()
            })
        });

        state.register_process(child);
        let waited = self.wait_for_exit(state);
        drop(state.unregister_process());

        let status = match waited {
            Ok(status) => status,
            Err(e) => {
                let _ = std::fs::remove_file(dst);
                return Err(e);
            }
        };

        if status.success() {
            return Ok(());
        }

        let _ = std::fs::remove_file(dst);
        if interrupted(&status) {
            state.request_stop();
        }
        if state.is_cancelled() {
            return Err(PrepareError::Cancelled);
        }

        let stderr = stderr_reader
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();

        Err(PrepareError::EncoderFailed {
            status: status.to_string(),
            stderr: excerpt(&stderr),
        })
    }

    fn wait_for_exit(&self, state: &RunState) -> Result<std::process::ExitStatus, PrepareError> {
        loop {
            if state.is_cancelled() {
                state.kill_process();
                return Err(PrepareError::Cancelled);
            }

            match state.poll_process() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => thread::sleep(self.poll_interval),
                Err(e) => {
                    state.kill_process();
                    return Err(PrepareError::Io {
                        context: "Failed to wait for ffmpeg".to_string(),
                        source: e,
                    });
                }
            }
        }
    }
}

/// Whether the encoder died from SIGINT, which only a user sends
#[cfg(unix)]
fn interrupted(status: &std::process::ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(libc::SIGINT)
}

#[cfg(not(unix))]
fn interrupted(_status: &std::process::ExitStatus) -> bool {
    false
}

/// First [`STDERR_EXCERPT_LEN`] characters of the encoder output
fn excerpt(stderr: &str) -> String {
    stderr.trim().chars().take(STDERR_EXCERPT_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_as_strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().to_string()).collect()
    }

    #[test]
    fn test_args_without_strip() {
        let args = Transcoder::build_args(Path::new("in.m4a"), Path::new("out.mp3"), "128k", false);
        assert_eq!(
            args_as_strings(&args),
            vec![
                "-y", "-hide_banner", "-loglevel", "error", "-i", "in.m4a", "-vn", "-ac", "2",
                "-ar", "44100", "-codec:a", "libmp3lame", "-b:a", "128k", "-joint_stereo", "1",
                "out.mp3",
            ]
        );
    }

    #[test]
    fn test_args_with_strip() {
        let args = Transcoder::build_args(Path::new("in.mp3"), Path::new("out.mp3"), "96k", true);
        let args = args_as_strings(&args);
        assert_eq!(&args[5..10], &["in.mp3", "-map_metadata", "-1", "-map_chapters", "-1"]);
        assert_eq!(
            &args[args.len() - 5..],
            &["-write_id3v1", "0", "-id3v2_version", "3", "out.mp3"]
        );
        assert!(args.contains(&"96k".to_string()));
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let long = "x".repeat(STDERR_EXCERPT_LEN * 2);
        assert_eq!(excerpt(&long).len(), STDERR_EXCERPT_LEN);
        assert_eq!(excerpt("  bad codec\n"), "bad codec");
    }

    #[test]
    fn test_cancelled_before_spawn() {
        let dir = tempfile::TempDir::new().unwrap();
        let transcoder = Transcoder::new(PathBuf::from("/nonexistent/ffmpeg"));
        let state = RunState::new();
        state.request_stop();

        let result = transcoder.convert(&dir.path().join("in.mp3"), &dir.path().join("out.mp3"), "128k", false, &state);
        assert!(matches!(result, Err(PrepareError::Cancelled)));
        assert!(!state.has_process());
    }

    #[test]
    fn test_missing_encoder_is_spawn_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let transcoder = Transcoder::new(PathBuf::from("/nonexistent/ffmpeg"));
        let result = transcoder.convert(
            &dir.path().join("in.mp3"),
            &dir.path().join("out.mp3"),
            "128k",
            false,
            &RunState::new(),
        );
        assert!(matches!(result, Err(PrepareError::EncoderSpawn(_))));
    }

    #[cfg(unix)]
    mod with_fake_encoder {
        use super::super::*;
        use crate::test_fixtures::*;
        use std::sync::Arc;
        use std::time::Instant;
        use tempfile::TempDir;

        #[test]
        fn test_successful_conversion() {
            let dir = TempDir::new().unwrap();
            let src = dir.path().join("in.mp3");
            std::fs::write(&src, b"audio").unwrap();
            let dst = dir.path().join("nested/out.mp3");

            let state = RunState::new();
            Transcoder::new(copying_encoder())
                .convert(&src, &dst, "128k", true, &state)
                .unwrap();

            assert_eq!(std::fs::read(&dst).unwrap(), b"audio");
            assert!(!state.has_process());
        }

        #[test]
        fn test_encoder_receives_built_args() {
            let dir = TempDir::new().unwrap();
            let src = dir.path().join("in.mp3");
            std::fs::write(&src, b"audio").unwrap();
            let dst = dir.path().join("out.mp3");

            Transcoder::new(recording_encoder())
                .convert(&src, &dst, "192k", false, &RunState::new())
                .unwrap();

            let recorded = std::fs::read_to_string(dir.path().join("out.mp3.args")).unwrap();
            let expected: Vec<String> = Transcoder::build_args(&src, &dst, "192k", false)
                .iter()
                .map(|a| a.to_string_lossy().to_string())
                .collect();
            assert_eq!(recorded.lines().collect::<Vec<_>>(), expected);
        }

        #[test]
        fn test_failure_surfaces_stderr() {
            let dir = TempDir::new().unwrap();
            let src = dir.path().join("in.mp3");
            std::fs::write(&src, b"audio").unwrap();
            let dst = dir.path().join("out.mp3");

            let result = Transcoder::new(failing_encoder()).convert(
                &src,
                &dst,
                "128k",
                false,
                &RunState::new(),
            );

            match result {
                Err(PrepareError::EncoderFailed { status, stderr }) => {
                    assert!(status.contains('2'));
                    assert_eq!(stderr, "bad codec");
                }
                other => panic!("expected EncoderFailed, got {:?}", other),
            }
            assert!(!dst.exists());
        }

        #[test]
        fn test_stop_kills_running_encoder() {
            let dir = TempDir::new().unwrap();
            let src = dir.path().join("in.mp3");
            std::fs::write(&src, b"audio").unwrap();
            let dst = dir.path().join("out.mp3");

            let state = Arc::new(RunState::new());
            let stopper = {
                let state = state.clone();
                std::thread::spawn(move || {
                    while !state.has_process() {
                        std::thread::sleep(Duration::from_millis(10));
                    }
                    std::thread::sleep(Duration::from_millis(100));
                    state.request_stop();
                    Instant::now()
                })
            };

            let result = Transcoder::new(hanging_encoder()).convert(&src, &dst, "128k", false, &state);
            let returned = Instant::now();
            let stopped_at = stopper.join().unwrap();

            assert!(matches!(result, Err(PrepareError::Cancelled)));
            assert!(returned.duration_since(stopped_at) < Duration::from_secs(1));
            assert!(!state.has_process());
            assert!(!dst.exists());
        }

        /// Start `pid_encoder` on a thread and return its PID once it is running
        fn spawn_pid_encoder(
            dir: &Path,
            state: &Arc<RunState>,
        ) -> (std::thread::JoinHandle<Result<(), PrepareError>>, libc::pid_t, PathBuf) {
            let src = dir.join("in.mp3");
            std::fs::write(&src, b"audio").unwrap();
            let dst = dir.join("out.mp3");

            let worker = {
                let state = state.clone();
                let dst = dst.clone();
                std::thread::spawn(move || {
                    Transcoder::new(pid_encoder()).convert(&src, &dst, "128k", false, &state)
                })
            };

            let pid_file = dir.join("out.mp3.pid");
            let deadline = Instant::now() + Duration::from_secs(5);
            while !pid_file.exists() {
                assert!(Instant::now() < deadline, "encoder never started");
                std::thread::sleep(Duration::from_millis(10));
            }
            let pid = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
            (worker, pid, dst)
        }

        #[test]
        fn test_encoder_runs_in_own_process_group() {
            let dir = TempDir::new().unwrap();
            let state = Arc::new(RunState::new());
            let (worker, pid, _) = spawn_pid_encoder(dir.path(), &state);

            let group = unsafe { libc::getpgid(pid) };
            let own_group = unsafe { libc::getpgid(0) };
            state.request_stop();
            let result = worker.join().unwrap();

            assert_eq!(group, pid);
            assert_ne!(group, own_group);
            assert!(matches!(result, Err(PrepareError::Cancelled)));
        }

        #[test]
        fn test_interrupted_encoder_is_a_stop() {
            let dir = TempDir::new().unwrap();
            let state = Arc::new(RunState::new());
            let (worker, pid, dst) = spawn_pid_encoder(dir.path(), &state);

            assert_eq!(unsafe { libc::kill(pid, libc::SIGINT) }, 0);
            std::thread::sleep(Duration::from_millis(100));
            state.request_stop();
            let result = worker.join().unwrap();

            assert!(matches!(result, Err(PrepareError::Cancelled)));
            assert!(state.is_cancelled());
            assert!(!state.has_process());
            assert!(!dst.exists());
        }

        #[test]
        fn test_killed_encoder_without_stop_is_failure() {
            let dir = TempDir::new().unwrap();
            let state = Arc::new(RunState::new());
            let (worker, pid, _) = spawn_pid_encoder(dir.path(), &state);

            assert_eq!(unsafe { libc::kill(pid, libc::SIGKILL) }, 0);
            let result = worker.join().unwrap();

            assert!(matches!(result, Err(PrepareError::EncoderFailed { .. })));
            assert!(!state.is_cancelled());
        }
    }
}
