//! PCM delivery to an external playback process.
//!
//! The engine never talks to an audio API directly; it streams raw
//! s16le mono PCM into the stdin of whichever player binary is available
//! (`pw-play`, `aplay`, `mpv`, `ffplay`). Writing the block is also the
//! loop's flow control: the pipe fills, the write blocks, and the engine
//! naturally paces itself to real time.

use std::env;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use log::{info, warn};

use loadtune_types::SAMPLE_RATE;

/// Environment variable that pins playback to a single named backend.
pub const BACKEND_ENV: &str = "LOADTUNE_AUDIO_BACKEND";

/// Zero bytes written immediately after spawn to smoke out players that
/// accept the exec but die on first input.
const PRIMING_BYTES: usize = 4096;

/// Destination for rendered PCM blocks.
pub trait PcmSink {
    /// Deliver one block. Blocking here is the engine's backpressure.
    fn write_block(&mut self, pcm: &[u8]) -> io::Result<()>;

    /// Name of the backend, for the published snapshot.
    fn backend_name(&self) -> &str;
}

#[derive(Debug)]
pub enum SinkError {
    /// A backend was forced via [`BACKEND_ENV`] but could not be started.
    ForcedUnavailable(String),
    /// Every known backend was tried and none survived priming.
    NoBackend,
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::ForcedUnavailable(name) => {
                write!(f, "forced audio backend '{name}' is unavailable or failed to start")
            }
            SinkError::NoBackend => {
                write!(f, "no working audio backend found (tried pw-play, aplay, mpv, ffplay)")
            }
        }
    }
}

impl std::error::Error for SinkError {}

#[derive(Debug, Clone)]
struct Candidate {
    name: &'static str,
    argv: Vec<String>,
}

fn known_backends() -> Vec<Candidate> {
    let rate = SAMPLE_RATE.to_string();
    vec![
        Candidate {
            name: "pw-play",
            argv: ["pw-play", "--rate", rate.as_str(), "--channels", "1", "--format", "s16", "-"]
                .map(String::from)
                .to_vec(),
        },
        Candidate {
            name: "aplay",
            argv: ["aplay", "-q", "-f", "S16_LE", "-r", rate.as_str(), "-c", "1"]
                .map(String::from)
                .to_vec(),
        },
        Candidate {
            name: "mpv",
            argv: vec![
                "mpv".to_string(),
                "--no-video".to_string(),
                "--really-quiet".to_string(),
                "--audio-display=no".to_string(),
                "--demuxer=rawaudio".to_string(),
                "--demuxer-rawaudio-format=s16le".to_string(),
                format!("--demuxer-rawaudio-rate={rate}"),
                "--demuxer-rawaudio-channels=1".to_string(),
                "-".to_string(),
            ],
        },
        Candidate {
            name: "ffplay",
            argv: [
                "ffplay", "-v", "error", "-nostats", "-nodisp", "-f", "s16le", "-ar", rate.as_str(),
                "-ac", "1", "-i", "-",
            ]
            .map(String::from)
            .to_vec(),
        },
    ]
}

/// Candidates in trial order. Termux rarely has working ALSA or PipeWire,
/// so mpv leads there; everywhere else PipeWire leads. A forced name
/// restricts the list to exact matches.
fn ordered_candidates(forced: Option<&str>, termux: bool) -> Vec<Candidate> {
    let base = known_backends();
    let preferred: [&str; 4] = if termux {
        ["mpv", "ffplay", "pw-play", "aplay"]
    } else {
        ["pw-play", "aplay", "mpv", "ffplay"]
    };

    let mut ordered: Vec<Candidate> = preferred
        .iter()
        .filter_map(|name| base.iter().find(|c| c.name == *name).cloned())
        .collect();

    if let Some(forced) = forced {
        ordered.retain(|c| c.name == forced);
    }
    ordered
}

fn running_under_termux() -> bool {
    env::var_os("TERMUX_VERSION").is_some()
        || env::var("PREFIX").map(|p| p.contains("com.termux")).unwrap_or(false)
}

fn forced_backend() -> Option<String> {
    let forced = env::var(BACKEND_ENV).ok()?.trim().to_lowercase();
    if forced.is_empty() {
        None
    } else {
        Some(forced)
    }
}

fn resolve_in_path(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = Path::new(program);
        return path.is_file().then(|| path.to_path_buf());
    }
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}

/// A playback process with an open PCM pipe.
#[derive(Debug)]
pub struct ProcessSink {
    child: Child,
    stdin: ChildStdin,
    name: &'static str,
}

impl ProcessSink {
    /// Try backends in preference order and keep the first that accepts a
    /// priming write. Honors [`BACKEND_ENV`] and the Termux ordering.
    pub fn start() -> Result<Self, SinkError> {
        Self::start_with(forced_backend().as_deref(), running_under_termux())
    }

    fn start_with(forced: Option<&str>, termux: bool) -> Result<Self, SinkError> {
        for candidate in ordered_candidates(forced, termux) {
            if resolve_in_path(&candidate.argv[0]).is_none() {
                continue;
            }
            match Self::try_spawn(&candidate) {
                Ok(sink) => {
                    info!("audio backend: {}", sink.name);
                    return Ok(sink);
                }
                Err(e) => {
                    warn!("backend {} failed to start: {e}", candidate.name);
                }
            }
        }
        match forced {
            Some(name) => Err(SinkError::ForcedUnavailable(name.to_string())),
            None => Err(SinkError::NoBackend),
        }
    }

    fn try_spawn(candidate: &Candidate) -> io::Result<Self> {
        let mut child = Command::new(&candidate.argv[0])
            .args(&candidate.argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let mut stdin = match child.stdin.take() {
            Some(stdin) => stdin,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(io::Error::other("player has no stdin"));
            }
        };

        let silence = vec![0u8; PRIMING_BYTES];
        if let Err(e) = stdin.write_all(&silence).and_then(|_| stdin.flush()) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }

        Ok(Self {
            child,
            stdin,
            name: candidate.name,
        })
    }
}

impl PcmSink for ProcessSink {
    fn write_block(&mut self, pcm: &[u8]) -> io::Result<()> {
        self.stdin.write_all(pcm)?;
        self.stdin.flush()
    }

    fn backend_name(&self) -> &str {
        self.name
    }
}

impl Drop for ProcessSink {
    fn drop(&mut self) {
        // Close the pipe first so well-behaved players drain and exit.
        let _ = self.stdin.flush();
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_order_prefers_pipewire() {
        let names: Vec<&str> = ordered_candidates(None, false).iter().map(|c| c.name).collect();
        assert_eq!(names, ["pw-play", "aplay", "mpv", "ffplay"]);
    }

    #[test]
    fn termux_order_prefers_mpv() {
        let names: Vec<&str> = ordered_candidates(None, true).iter().map(|c| c.name).collect();
        assert_eq!(names, ["mpv", "ffplay", "pw-play", "aplay"]);
    }

    #[test]
    fn forced_backend_restricts_to_exact_match() {
        let names: Vec<&str> = ordered_candidates(Some("aplay"), false)
            .iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["aplay"]);
    }

    #[test]
    fn forced_unknown_backend_matches_nothing() {
        assert!(ordered_candidates(Some("sox"), false).is_empty());
    }

    #[test]
    fn candidates_request_mono_s16_at_engine_rate() {
        for candidate in known_backends() {
            let joined = candidate.argv.join(" ");
            assert!(joined.contains("44100"), "{joined}");
            assert!(joined.to_lowercase().contains("s16"), "{joined}");
        }
    }

    #[test]
    fn forced_missing_backend_reports_distinct_error() {
        let err = ProcessSink::start_with(Some("sox"), false).unwrap_err();
        match err {
            SinkError::ForcedUnavailable(name) => assert_eq!(name, "sox"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn errors_render_with_context() {
        let forced = SinkError::ForcedUnavailable("aplay".to_string()).to_string();
        assert!(forced.contains("aplay"));
        assert!(SinkError::NoBackend.to_string().contains("pw-play"));
    }
}
