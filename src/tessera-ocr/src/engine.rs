//! Tesseract command-line contract
//!
//! The engine is invoked as `<program> <input> <output_base> [-l <lang>]`.
//! On success it writes `<output_base>.txt`; on failure it exits non-zero and
//! explains itself on stderr.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{OcrError, Result};

const DEFAULT_PROGRAM: &str = "tesseract";

/// How often a child is polled while a timeout is armed
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Engine binary; a bare name is looked up on `PATH`
    pub program: PathBuf,
    /// Kill the engine if it runs longer than this
    pub timeout: Option<Duration>,
    /// Root for per-invocation scratch directories (system temp dir if unset)
    pub temp_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            timeout: None,
            temp_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }
}

/// Exit status and captured stderr of one engine run
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EngineOutput {
    pub status: i32,
    pub stderr: String,
}

impl EngineOutput {
    pub(crate) fn success(&self) -> bool {
        self.status == 0
    }
}

pub(crate) fn build_command(
    config: &EngineConfig,
    input: &Path,
    output_base: &Path,
    language: Option<&str>,
) -> Command {
    let mut cmd = Command::new(&config.program);
    cmd.arg(input).arg(output_base);
    if let Some(lang) = language {
        cmd.arg("-l").arg(lang);
    }

    // stdout is discarded so engine banners never reach the caller's output
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    cmd
}

/// Run the engine once and wait for it to exit
pub(crate) fn run(
    config: &EngineConfig,
    input: &Path,
    output_base: &Path,
    language: Option<&str>,
) -> Result<EngineOutput> {
    let mut cmd = build_command(config, input, output_base, language);
    debug!("running OCR engine: {:?}", cmd);

    let mut child = cmd.spawn().map_err(|source| OcrError::Spawn {
        program: config.program.clone(),
        source,
    })?;

    // Drain stderr concurrently so a chatty engine can't fill the pipe and stall
    let pipe = child.stderr.take();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        if let Some(pipe) = pipe {
            forward_stderr(pipe, tx);
        }
    });

    let started = Instant::now();
    let status = match config.timeout {
        Some(limit) => wait_until(&mut child, limit, started + limit)?,
        None => child.wait()?,
    };
    let deadline = config.timeout.map(|limit| started + limit);

    let stderr = collect_stderr(&rx, deadline);
    let output = EngineOutput {
        status: exit_code(status),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    };

    debug!("OCR engine exited with status {}", output.status);
    Ok(output)
}

fn wait_until(child: &mut Child, limit: Duration, deadline: Instant) -> Result<ExitStatus> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }

        if Instant::now() >= deadline {
            warn!("OCR engine exceeded {:?}, killing pid {}", limit, child.id());
            if let Err(e) = child.kill() {
                warn!("failed to kill OCR engine: {}", e);
            }
            let _ = child.wait();
            return Err(OcrError::Timeout(limit));
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn forward_stderr(mut pipe: ChildStderr, tx: Sender<Vec<u8>>) {
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(chunk[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("failed to read OCR engine stderr: {}", e);
                break;
            }
        }
    }
}

/// Gather stderr until the pipe closes or the deadline passes
///
/// A process the engine left behind can keep the pipe open after the engine
/// itself exited; past the deadline whatever arrived so far is used.
fn collect_stderr(rx: &Receiver<Vec<u8>>, deadline: Option<Instant>) -> Vec<u8> {
    let mut buf = Vec::new();
    loop {
        let next = match deadline {
            Some(at) => rx.recv_timeout(at.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match next {
            Ok(chunk) => buf.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "OCR engine stderr still open at deadline, keeping {} bytes",
                    buf.len()
                );
                break;
            }
        }
    }
    buf
}

/// Process exit code; a Unix signal death maps to the negated signal number
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    -1
}

/// Keep only the stderr lines that mention `Error`
pub(crate) fn error_lines(stderr: &str) -> String {
    stderr
        .lines()
        .filter(|line| line.contains("Error"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Check if the configured engine can be launched
pub fn check_engine(config: &EngineConfig) -> bool {
    Command::new(&config.program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
