// Subprocess unit of work
// Runs one pipeline command for one input, relaying its progress lines.
// reason: tokio::process for async child management, nix for SIGTERM

use crate::pipeline::SETTINGS_ENV_VAR;
use crate::progress_line::parse_progress_line;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use verba_core::domain::JobError;
use verba_core::port::{ProgressReporter, UnitOfWork, WorkResult};

/// Time between SIGTERM and SIGKILL
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct CommandWork {
    pub(crate) input: String,
    pub(crate) output_path: String,
    pub(crate) program: String,
    pub(crate) args: Vec<String>,
    pub(crate) env: HashMap<String, String>,
    pub(crate) settings: serde_json::Value,
    pub(crate) timeout: Option<Duration>,
    pub(crate) terminate_grace: Duration,
}

enum Exit {
    Finished(std::io::Result<ExitStatus>),
    Cancelled,
    TimedOut,
}

impl CommandWork {
    pub fn new(
        input: impl Into<String>,
        output_path: impl Into<String>,
        program: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            input: input.into(),
            output_path: output_path.into(),
            program: program.into(),
            args,
            env: HashMap::new(),
            settings: json!({}),
            timeout: None,
            terminate_grace: DEFAULT_TERMINATE_GRACE,
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_settings(mut self, settings: serde_json::Value) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }

    fn spawn(&self) -> Result<Child, JobError> {
        Command::new(&self.program)
            .args(&self.args)
            .env_clear()
            .envs(&self.env)
            .env(SETTINGS_ENV_VAR, self.settings.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| JobError::execution(format!("Failed to start {}: {e}", self.program)))
    }
}

#[async_trait]
impl UnitOfWork for CommandWork {
    async fn run(self: Box<Self>, progress: ProgressReporter) -> WorkResult {
        info!(
            job_id = %progress.job_id(),
            program = %self.program,
            input = %self.input,
            timeout_ms = ?self.timeout.map(|t| t.as_millis() as u64),
            "Starting pipeline command"
        );

        let mut child = self.spawn()?;
        let stdout = child.stdout.take();
        let stderr_tail = child.stderr.take().map(|stderr| tokio::spawn(last_line(stderr)));

        let deadline = async {
            match self.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };

        let exit = {
            let drive = async {
                if let Some(stdout) = stdout {
                    let mut lines = BufReader::new(stdout).lines();
                    loop {
                        match lines.next_line().await {
                            Ok(Some(line)) => match parse_progress_line(&line) {
                                Some((percent, message)) => progress.report(percent, message),
                                None => debug!(
                                    job_id = %progress.job_id(),
                                    line = %line,
                                    "Pipeline output"
                                ),
                            },
                            Ok(None) => break,
                            Err(e) => {
                                warn!(
                                    job_id = %progress.job_id(),
                                    error = %e,
                                    "Reading pipeline stdout failed"
                                );
                                break;
                            }
                        }
                    }
                }
                child.wait().await
            };
            tokio::select! {
                status = drive => Exit::Finished(status),
                _ = progress.cancelled() => Exit::Cancelled,
                _ = deadline => Exit::TimedOut,
            }
        };

        match exit {
            Exit::Finished(Ok(status)) if status.success() => {
                info!(
                    job_id = %progress.job_id(),
                    output = %self.output_path,
                    "Pipeline command finished"
                );
                Ok(json!({
                    "type": "single",
                    "input": self.input,
                    "output_path": self.output_path,
                }))
            }
            Exit::Finished(Ok(status)) => {
                let detail = match stderr_tail {
                    Some(handle) => handle.await.ok().flatten(),
                    None => None,
                };
                let code = status
                    .code()
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "a signal".to_string());
                let message = match detail {
                    Some(line) => format!("{} exited with {code}: {line}", self.program),
                    None => format!("{} exited with {code}", self.program),
                };
                Err(JobError::execution(message))
            }
            Exit::Finished(Err(e)) => Err(JobError::execution(format!(
                "Waiting for {} failed: {e}",
                self.program
            ))),
            Exit::Cancelled => {
                abort_tail(stderr_tail);
                terminate(&mut child, self.terminate_grace).await;
                Err(JobError::cancelled("Stopped on request"))
            }
            Exit::TimedOut => {
                abort_tail(stderr_tail);
                terminate(&mut child, self.terminate_grace).await;
                let secs = self.timeout.map(|t| t.as_secs_f64()).unwrap_or_default();
                Err(JobError::timeout(format!(
                    "{} did not finish within {secs}s",
                    self.program
                )))
            }
        }
    }
}

/// Last non-empty line of a stream
async fn last_line<R>(reader: R) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut last = None;
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if !line.is_empty() {
            last = Some(line.to_string());
        }
    }
    last
}

fn abort_tail(handle: Option<tokio::task::JoinHandle<Option<String>>>) {
    if let Some(handle) = handle {
        handle.abort();
    }
}

/// SIGTERM first, then SIGKILL if the child outlives `grace`
async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        info!(pid, "Sending SIGTERM to pipeline command");
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            warn!(pid, error = %e, "SIGTERM failed");
        } else if tokio::time::timeout(grace, child.wait()).await.is_ok() {
            return;
        }
        warn!(pid, "Pipeline command ignored SIGTERM, sending SIGKILL");
    }

    if let Err(e) = child.kill().await {
        warn!(error = %e, "Killing pipeline command failed");
    }
}
