//! Running external executables.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::error::ProcessError;
use super::types::{ProcessOutcome, StageCommand};

/// Runs a stage command to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Returns the name of this runner implementation.
    fn name(&self) -> &str;

    /// Runs `command` and reports how it ended. A non-zero exit is not an
    /// error here; callers judge the outcome against their exit policy.
    async fn run(&self, command: &StageCommand) -> Result<ProcessOutcome, ProcessError>;
}

/// Runs commands as child processes, logging their output line by line.
#[derive(Debug, Clone, Default)]
pub struct SubprocessRunner {
    timeout: Option<Duration>,
}

impl SubprocessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn from_timeout_secs(secs: Option<u64>) -> Self {
        Self::new(secs.map(Duration::from_secs))
    }
}

async fn drain_lines<R>(stream: Option<R>, program: &str, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return;
    };
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if is_stderr => debug!("[{}] {}", program, line),
            Ok(Some(line)) => info!("[{}] {}", program, line),
            Ok(None) => break,
            Err(e) => {
                // Non UTF-8 output; keep draining so the child never blocks.
                debug!("[{}] unreadable output line: {}", program, e);
            }
        }
    }
}

#[async_trait]
impl CommandRunner for SubprocessRunner {
    fn name(&self) -> &str {
        "subprocess"
    }

    async fn run(&self, command: &StageCommand) -> Result<ProcessOutcome, ProcessError> {
        let start = Instant::now();
        let program = command.program_name();
        info!("Running: {}", command);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.current_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ProcessError::spawn(command.program.clone(), e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let finished = async {
            tokio::join!(
                drain_lines(stdout, &program, false),
                drain_lines(stderr, &program, true)
            );
            child.wait().await
        };

        let waited = match self.timeout {
            Some(limit) => {
                let result = timeout(limit, finished).await;
                match result {
                    Ok(waited) => waited,
                    Err(_) => {
                        warn!("{} exceeded {:?}, killing it", program, limit);
                        if let Err(e) = child.kill().await {
                            debug!("Failed to kill {}: {}", program, e);
                        }
                        return Err(ProcessError::Timeout {
                            program: command.program.clone(),
                            timeout_secs: limit.as_secs(),
                        });
                    }
                }
            }
            None => finished.await,
        };

        let status = waited.map_err(|source| ProcessError::Io {
            program: command.program.clone(),
            source,
        })?;

        let outcome = ProcessOutcome {
            code: status.code(),
            elapsed: start.elapsed(),
        };
        debug!(
            "{} finished with code {:?} in {:?}",
            program, outcome.code, outcome.elapsed
        );
        Ok(outcome)
    }
}
