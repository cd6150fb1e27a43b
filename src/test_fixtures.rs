//! Test fixtures for conversion and metadata tests
//!
//! Tests must not depend on a real ffmpeg being installed, so the encoder is
//! replaced by small shell scripts that honour the same command contract
//! (input after `-i`, output as the last argument).

#![cfg(test)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static FIXTURES_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Get the fixtures directory, creating it if necessary
pub fn fixtures_dir() -> &'static Path {
    FIXTURES_DIR.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("autoradio_test_fixtures_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("Failed to create fixtures directory");
        dir
    })
}

/// MPEG-1 Layer III, 128 kbps, 44.1 kHz, joint stereo, no CRC, no padding
const FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x40];

/// 144 * 128000 / 44100, rounded down
const FRAME_LEN: usize = 417;

/// Write a short stream of silent MPEG frames that tag libraries accept as MP3
pub fn write_silent_mp3(path: &Path) {
    let mut frame = vec![0u8; FRAME_LEN];
    frame[..4].copy_from_slice(&FRAME_HEADER);

    let mut file = std::fs::File::create(path).expect("Failed to create mp3 fixture");
    for _ in 0..20 {
        file.write_all(&frame).expect("Failed to write mp3 frame");
    }
}

/// Shell snippet that finds the `-i` input and the last argument
#[cfg(unix)]
const ARG_PARSER: &str = r#"in=""
prev=""
out=""
for a in "$@"; do
  if [ "$prev" = "-i" ]; then in="$a"; fi
  prev="$a"
  out="$a"
done
"#;

/// Fake encoders, installed once per test process
#[cfg(unix)]
const SCRIPTS: [(&str, &str); 7] = [
    ("copy_encoder.sh", "exec cp \"$in\" \"$out\"\n"),
    (
        "record_encoder.sh",
        "printf '%s\\n' \"$@\" > \"$out.args\"\nexec cp \"$in\" \"$out\"\n",
    ),
    ("fail_encoder.sh", "echo \"bad codec\" >&2\nexit 2\n"),
    (
        "picky_encoder.sh",
        "case \"$in\" in\n  *broken*) echo \"bad codec\" >&2; exit 2;;\nesac\nexec cp \"$in\" \"$out\"\n",
    ),
    ("slow_encoder.sh", "sleep 1\nexec cp \"$in\" \"$out\"\n"),
    ("hang_encoder.sh", "exec sleep 30\n"),
    (
        "pid_encoder.sh",
        "echo $$ > \"$out.pid.tmp\"\nmv \"$out.pid.tmp\" \"$out.pid\"\nexec sleep 30\n",
    ),
];

#[cfg(unix)]
static SCRIPTS_INSTALLED: OnceLock<()> = OnceLock::new();

/// Path of an installed fake encoder script
#[cfg(unix)]
fn script(name: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    SCRIPTS_INSTALLED.get_or_init(|| {
        // Scripts are written under a temporary name and renamed into place,
        // so no path that gets executed is ever open for writing
        for (script_name, body) in SCRIPTS {
            let path = fixtures_dir().join(script_name);
            let staging = fixtures_dir().join(format!("{}.partial", script_name));
            let mut file = std::fs::File::create(&staging).expect("Failed to create script");
            file.write_all(format!("#!/bin/sh\n{}{}", ARG_PARSER, body).as_bytes())
                .expect("Failed to write script");
            file.sync_all().expect("Failed to sync script");
            drop(file);
            std::fs::set_permissions(&staging, std::fs::Permissions::from_mode(0o755))
                .expect("Failed to chmod script");
            std::fs::rename(&staging, &path).expect("Failed to install script");
        }
    });
    fixtures_dir().join(name)
}

/// Fake encoder that copies its input to its output
#[cfg(unix)]
pub fn copying_encoder() -> PathBuf {
    script("copy_encoder.sh")
}

/// Fake encoder that records its arguments next to the output, then copies
#[cfg(unix)]
pub fn recording_encoder() -> PathBuf {
    script("record_encoder.sh")
}

/// Fake encoder that fails like ffmpeg does on a bad codec
#[cfg(unix)]
pub fn failing_encoder() -> PathBuf {
    script("fail_encoder.sh")
}

/// Fake encoder that fails only for inputs whose name contains "broken"
#[cfg(unix)]
pub fn picky_encoder() -> PathBuf {
    script("picky_encoder.sh")
}

/// Fake encoder that takes a while before copying
#[cfg(unix)]
pub fn slow_encoder() -> PathBuf {
    script("slow_encoder.sh")
}

/// Fake encoder that never finishes on its own
#[cfg(unix)]
pub fn hanging_encoder() -> PathBuf {
    script("hang_encoder.sh")
}

/// Fake encoder that writes its PID to `<output>.pid`, then never finishes
#[cfg(unix)]
pub fn pid_encoder() -> PathBuf {
    script("pid_encoder.sh")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_scripts_installed_executable() {
        for path in [copying_encoder(), failing_encoder(), pid_encoder()] {
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o755, 0o755);
        }
        let leftovers = std::fs::read_dir(fixtures_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
