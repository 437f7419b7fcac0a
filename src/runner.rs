//! # Command Runner
//!
//! Runs the external `git` binary against an explicit working directory and
//! captures its merged output.
//!
//! The working directory is handed to [`Command::current_dir`] for every
//! invocation, so concurrent workers never share or mutate the process-wide
//! current directory. Success is decided by the exit status alone; the text
//! of the output is kept for diagnostics and is relabelled for display by
//! [`Outcome::display`].
//!
//! Every invocation is bounded by a timeout. A child that outlives it is
//! killed together with its process group (ssh, remote helpers) and reported
//! as a failed, timed-out outcome. Output readers are never waited on past
//! the deadline.

use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::defaults::{DEFAULT_COMMAND_TIMEOUT, OUTPUT_LABEL};
use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const KILL_GRACE: Duration = Duration::from_millis(200);

/// Result of one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// True when the command exited with status zero.
    pub success: bool,
    /// stdout followed by stderr.
    pub output: String,
    /// True when the command was killed by the timeout.
    pub timed_out: bool,
}

impl Outcome {
    /// Output as shown to users, with git's "error"/"fatal" prefix replaced
    /// by the tool's own label.
    pub fn display(&self) -> String {
        relabel(&self.output)
    }
}

/// Replaces "error" (or, when absent, "fatal") with the gpack label.
pub fn relabel(output: &str) -> String {
    let relabelled = if output.contains("error") {
        output.replace("error", OUTPUT_LABEL)
    } else {
        output.replace("fatal", OUTPUT_LABEL)
    };
    relabelled.trim().to_string()
}

/// Executes a program (git by default) with a per-call working directory.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: OsString,
    timeout: Duration,
    envs: Vec<(String, String)>,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner {
    /// Creates a runner for `git` with the default timeout.
    pub fn new() -> Self {
        Self {
            program: OsString::from("git"),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            // git must never block a worker waiting for a password
            envs: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
        }
    }

    /// Replaces the program being run.
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Replaces the per-command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds an environment variable to every command run by this runner.
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    /// The per-command timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `args` in `dir`.
    ///
    /// A non-zero exit is an `Ok` outcome with `success == false`; only a
    /// failure to start the program is an `Err`.
    pub fn run(&self, dir: &Path, args: &[&str]) -> Result<Outcome> {
        debug!(
            "running {} {} in {}",
            self.program.to_string_lossy(),
            args.join(" "),
            dir.display()
        );

        let mut command = Command::new(&self.program);
        command
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.envs {
            command.env(key, value);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // own process group, so a timeout reaches ssh and remote helpers too
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|e| Error::GitSpawn {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;

        let stdout = read_in_background(child.stdout.take());
        let stderr = read_in_background(child.stderr.take());

        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut timed_out = false;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                timed_out = true;
                kill_process_group(&mut child);
                break child.wait()?;
            }
            thread::sleep(POLL_INTERVAL);
        };

        // a leftover grandchild may still hold the pipes open
        let collect_until = if timed_out {
            Instant::now() + KILL_GRACE
        } else {
            deadline.max(Instant::now() + KILL_GRACE)
        };
        let stdout_buf = collect(&stdout, collect_until);
        let stderr_buf = collect(&stderr, collect_until);

        let mut output = String::from_utf8_lossy(&stdout_buf).into_owned();
        output.push_str(&String::from_utf8_lossy(&stderr_buf));
        if timed_out {
            output.push_str(&format!(
                "\nfatal: timed out after {}s",
                self.timeout.as_secs()
            ));
        }

        Ok(Outcome {
            success: status.success() && !timed_out,
            output,
            timed_out,
        })
    }

    /// Runs `args` in `dir` and turns any failure into an `Err`.
    ///
    /// Returns the command's output on success.
    pub fn run_checked(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let outcome = self.run(dir, args)?;
        if outcome.timed_out {
            return Err(Error::Timeout {
                command: args.join(" "),
                path: dir.to_path_buf(),
                seconds: self.timeout.as_secs(),
            });
        }
        if !outcome.success {
            return Err(Error::GitCommand {
                command: args.join(" "),
                path: dir.to_path_buf(),
                output: outcome.display(),
            });
        }
        Ok(outcome.output)
    }
}

/// Drains `source` on a detached thread. The buffer arrives on the returned
/// channel once the pipe closes.
fn read_in_background<R>(source: Option<R>) -> Receiver<Vec<u8>>
where
    R: Read + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buf);
        }
        let _ = sender.send(buf);
    });
    receiver
}

fn collect(receiver: &Receiver<Vec<u8>>, until: Instant) -> Vec<u8> {
    let wait = until.saturating_duration_since(Instant::now());
    receiver.recv_timeout(wait).unwrap_or_default()
}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match i32::try_from(child.id()) {
        Ok(pid) => {
            if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                debug!("killpg {} failed: {}", pid, e);
            }
        }
        Err(_) => debug!("pid {} does not fit a process group id", child.id()),
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
}
