//! Shell command runner

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, SystemTime};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::domain::models::CommandResult;

/// How long pipe readers may drain after a timed-out process is killed.
const READER_GRACE: Duration = Duration::from_secs(5);

/// Runs shell commands with a hard wall-clock timeout.
///
/// stdout and stderr are drained by two reader tasks so a chatty child never
/// blocks on a full pipe. The timeout is one deadline covering both the exit
/// of the shell and the end of its output; a background child that keeps the
/// pipes open past it gets the whole process group killed.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::from_secs(3_600)
    }
}

impl ProcessRunner {
    /// Runner with the given wall-clock ceiling per command.
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Runner with a ceiling of `secs` seconds.
    pub const fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Ceiling applied to every command.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `command` through the platform shell in `cwd`.
    ///
    /// Never fails: spawn errors and timeouts come back as exit code `-1`
    /// with the reason in `stderr`.
    #[instrument(skip(self), fields(cwd = %cwd.display()))]
    pub async fn run(&self, command: &str, cwd: &Path) -> CommandResult {
        let mut cmd = shell_command(command);
        cmd.current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let started_at = SystemTime::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!("Failed to spawn command: {}", err);
                return CommandResult {
                    stdout: String::new(),
                    stderr: format!("Error executing command: {err}"),
                    exit_code: -1,
                    started_at,
                    timed_out: false,
                };
            }
        };

        let pid = child.id();
        let deadline = Instant::now() + self.timeout;
        let mut stdout_task = tokio::spawn(drain(child.stdout.take()));
        let mut stderr_task = tokio::spawn(drain(child.stderr.take()));

        let finished = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(waited) => {
                tokio::time::timeout_at(deadline, join_readers(&mut stdout_task, &mut stderr_task))
                    .await
                    .ok()
                    .map(|output| (waited, output))
            }
            Err(_) => None,
        };

        match finished {
            Some((Ok(status), (stdout, stderr))) => {
                let exit_code = status.code().unwrap_or(-1);
                debug!(exit_code, "Command finished");
                CommandResult {
                    stdout,
                    stderr,
                    exit_code,
                    started_at,
                    timed_out: false,
                }
            }
            Some((Err(err), (stdout, stderr))) => {
                warn!("Failed to wait for command: {}", err);
                CommandResult {
                    stdout,
                    stderr: format!("{stderr}Error executing command: {err}"),
                    exit_code: -1,
                    started_at,
                    timed_out: false,
                }
            }
            // the shell or something it left behind held on past the deadline
            None => {
                let secs = self.timeout.as_secs();
                warn!("Command timed out after {} seconds, killing it", secs);
                kill(pid, &mut child).await;
                let drained = tokio::time::timeout(
                    READER_GRACE,
                    join_readers(&mut stdout_task, &mut stderr_task),
                )
                .await;
                let stdout = match drained {
                    Ok((stdout, _)) => stdout,
                    Err(_) => {
                        stdout_task.abort();
                        stderr_task.abort();
                        String::new()
                    }
                };
                CommandResult {
                    stdout,
                    stderr: format!("Command timed out after {secs} seconds"),
                    exit_code: -1,
                    started_at,
                    timed_out: true,
                }
            }
        }
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut buf = Vec::new();
    if let Err(err) = pipe.read_to_end(&mut buf).await {
        debug!("Pipe read ended early: {}", err);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn join_readers(
    stdout: &mut JoinHandle<String>,
    stderr: &mut JoinHandle<String>,
) -> (String, String) {
    let (stdout, stderr) = tokio::join!(stdout, stderr);
    (stdout.unwrap_or_default(), stderr.unwrap_or_default())
}

/// Kill the whole process group so grandchildren release the pipes too.
///
/// `pid` is captured at spawn: once the shell has been reaped `Child::id`
/// is gone, but its group lives on while any member does.
async fn kill(pid: Option<u32>, child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        if let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) {
            if let Err(err) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                debug!("killpg failed: {}", err);
            }
        }
    }
    #[cfg(not(unix))]
    let _ = pid;
    if let Err(err) = child.kill().await {
        debug!("kill failed: {}", err);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn cwd() -> std::path::PathBuf {
        std::env::temp_dir()
    }

    #[tokio::test]
    async fn test_captures_stdout_stderr_and_exit_code() {
        let runner = ProcessRunner::from_secs(30);
        let result = runner
            .run("echo out; echo err 1>&2; exit 3", &cwd())
            .await;

        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert_eq!(result.exit_code, 3);
        assert!(!result.timed_out);
        assert!(!result.succeeded());
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::from_secs(30);
        let result = runner.run("pwd", dir.path()).await;

        let reported = std::path::PathBuf::from(result.stdout.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
        assert!(result.succeeded());
    }

    #[tokio::test]
    async fn test_start_timestamp_precedes_completion() {
        let runner = ProcessRunner::from_secs(30);
        let result = runner.run("true", &cwd()).await;
        assert!(result.started_at <= SystemTime::now());
    }

    #[tokio::test]
    async fn test_large_output_does_not_deadlock() {
        let runner = ProcessRunner::from_secs(30);
        let result = runner
            .run("i=0; while [ $i -lt 20000 ]; do echo line-$i; echo err-$i 1>&2; i=$((i+1)); done", &cwd())
            .await;

        assert!(result.succeeded());
        assert_eq!(result.stdout.lines().count(), 20_000);
        assert_eq!(result.stderr.lines().count(), 20_000);
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let runner = ProcessRunner::new(Duration::from_millis(300));
        let begun = Instant::now();
        let result = runner.run("sleep 30", &cwd()).await;

        assert!(result.timed_out);
        assert_eq!(result.exit_code, -1);
        assert_eq!(result.stderr, "Command timed out after 0 seconds");
        assert!(begun.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_background_child_holding_pipes_times_out() {
        let runner = ProcessRunner::new(Duration::from_millis(500));
        let begun = Instant::now();
        let result = runner.run("sleep 8 & echo started", &cwd()).await;

        assert!(result.timed_out);
        assert_eq!(result.exit_code, -1);
        assert_eq!(result.stdout, "started\n");
        assert!(begun.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_background_child_closing_pipes_is_not_a_timeout() {
        let runner = ProcessRunner::from_secs(30);
        let result = runner
            .run("sleep 8 >/dev/null 2>&1 & echo started", &cwd())
            .await;

        assert!(!result.timed_out);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "started\n");
    }

    #[tokio::test]
    async fn test_missing_working_directory_is_reported() {
        let runner = ProcessRunner::from_secs(30);
        let result = runner
            .run("true", Path::new("/definitely/not/a/dir"))
            .await;

        assert_eq!(result.exit_code, -1);
        assert!(result.stderr.starts_with("Error executing command:"));
    }
}
