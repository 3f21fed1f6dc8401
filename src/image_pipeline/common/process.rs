//! Blocking invocation of external command-line tools.
//!
//! Every codec adapter funnels through [`ExternalCommand::run`], which owns the
//! uniform failure contract: non-zero exit becomes [`ProcessingError::Codec`]
//! with the full command line and captured output, an exceeded deadline
//! becomes [`ProcessingError::CodecTimeout`], and a cancelled token kills the
//! child and returns [`ProcessingError::Cancelled`].

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::image_pipeline::common::cancel::CancellationToken;
use crate::image_pipeline::common::error::{ProcessingError, Result};

/// How often a running child is polled for exit, deadline and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
    cancellation: Option<CancellationToken>,
}

/// Combined stdout and stderr of a successful run.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub output: String,
}

impl ExternalCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
            cancellation: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cancellation(mut self, token: Option<&CancellationToken>) -> Self {
        self.cancellation = token.cloned();
        self
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Shell-like rendering, quoting the arguments that need it, so a failed
    /// invocation can be reproduced by hand.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .map(|part| {
                if part.contains(['{', ' ', '[', '(']) {
                    format!("\"{part}\"")
                } else {
                    part
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn run(&self) -> Result<CommandOutput> {
        let name = self.name();
        if let Some(token) = &self.cancellation {
            token.check(&name)?;
        }

        let command_line = self.command_line();
        debug!(command = %command_line, "Running external command");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                    ProcessingError::ToolNotFound(self.program.clone())
                }
                _ => ProcessingError::IoError(e),
            })?;

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let waited = self.wait(&mut child);
        let mut output = join_reader(stdout);
        let stderr = join_reader(stderr);
        if !stderr.is_empty() {
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&stderr);
        }

        match waited? {
            WaitOutcome::Exited(status) if status.success() => Ok(CommandOutput { output }),
            WaitOutcome::Exited(status) => Err(ProcessingError::Codec {
                command: name,
                args: self.args.clone(),
                command_line,
                status: status.to_string(),
                output,
            }),
            WaitOutcome::TimedOut(timeout) => Err(ProcessingError::CodecTimeout {
                command: name,
                command_line,
                timeout,
            }),
            WaitOutcome::Cancelled => Err(ProcessingError::Cancelled { stage: name }),
        }
    }

    fn wait(&self, child: &mut Child) -> Result<WaitOutcome> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(WaitOutcome::Exited(status));
            }
            if self.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled) {
                kill(child);
                return Ok(WaitOutcome::Cancelled);
            }
            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    kill(child);
                    return Ok(WaitOutcome::TimedOut(timeout));
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

enum WaitOutcome {
    Exited(ExitStatus),
    TimedOut(Duration),
    Cancelled,
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!(error = %e, "Failed to kill external command");
    }
    // Reap so the pipes close and the reader threads finish.
    let _ = child.wait();
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer);
            buffer
        })
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}
