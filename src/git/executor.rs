use crate::error::{GitError, GitResult};
use crate::host::{Host, MessageLevel};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

/// Result of running a git command whose output was echoed to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub success: bool,
}

/// Spawns git commands within a repository
#[derive(Debug, Clone)]
pub struct GitExecutor {
    repo_path: PathBuf,
}

impl GitExecutor {
    /// Create a new GitExecutor for the given repository path
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
        }
    }

    /// Build a `git` command with null stdin and piped stdout/stderr
    fn command<S: AsRef<str>>(&self, args: &[S]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args.iter().map(AsRef::as_ref))
            .current_dir(&self.repo_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Spawn git and hand back the running child
    pub fn spawn<S: AsRef<str>>(&self, args: &[S]) -> GitResult<Child> {
        tracing::debug!(
            cwd = %self.repo_path.display(),
            args = ?args.iter().map(AsRef::as_ref).collect::<Vec<_>>(),
            "Spawning git"
        );

        self.command(args)
            .spawn()
            .map_err(|source| GitError::SpawnFailed {
                cwd: self.repo_path.display().to_string(),
                source,
            })
    }

    /// Run git, echoing stdout lines as info and stderr lines as errors
    ///
    /// Both pipes are read concurrently so neither can fill up and stall git.
    pub async fn run_and_echo<S: AsRef<str>>(
        &self,
        host: &dyn Host,
        args: &[S],
    ) -> GitResult<CommandOutput> {
        let mut child = self.spawn(args)?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (out, err) = tokio::join!(
            echo_lines(host, stdout, MessageLevel::Info),
            echo_lines(host, stderr, MessageLevel::Error),
        );
        out?;
        err?;

        let status = child.wait().await?;
        Ok(CommandOutput {
            exit_code: status.code().unwrap_or(-1),
            success: status.success(),
        })
    }
}

async fn echo_lines<R: AsyncRead + Unpin>(
    host: &dyn Host,
    pipe: Option<R>,
    level: MessageLevel,
) -> GitResult<()> {
    let Some(pipe) = pipe else {
        return Ok(());
    };
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    while let Some(line) = read_line(&mut reader, &mut buf).await? {
        host.report(level, &line).await;
    }
    Ok(())
}

/// Read the next line of git output; `None` at end of input
pub(crate) async fn read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some(decode_line(buf)))
}

/// Decode one line of git output including its terminator
///
/// Only a `\r\n` or `\n` terminator is removed. A `\r` anywhere else is
/// content. Invalid UTF-8 is replaced.
pub(crate) fn decode_line(bytes: &[u8]) -> String {
    let bytes = match bytes.strip_suffix(b"\n") {
        Some(line) => line.strip_suffix(b"\r").unwrap_or(line),
        None => bytes,
    };
    String::from_utf8_lossy(bytes).into_owned()
}

/// Seam through which actions run git
#[async_trait]
pub trait GitRunner: Send + Sync {
    /// Run `git <args>` in `cwd`, surfacing its output through `host`
    async fn run(&self, host: &dyn Host, cwd: &Path, args: &[String]) -> GitResult<CommandOutput>;
}

/// Runs the system `git` binary
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemGit;

#[async_trait]
impl GitRunner for SystemGit {
    async fn run(&self, host: &dyn Host, cwd: &Path, args: &[String]) -> GitResult<CommandOutput> {
        GitExecutor::new(cwd).run_and_echo(host, args).await
    }
}
