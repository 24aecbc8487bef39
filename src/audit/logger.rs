use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Size past which the history is moved aside to `history.log.1`
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Append-only history of git commands run by actions
#[derive(Debug)]
pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    /// History log at `~/.config/gitlog-picker/history.log`
    pub fn new() -> std::io::Result<Self> {
        Self::with_path(Self::default_log_path()?)
    }

    /// History log at `path`, creating its directory
    pub fn with_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let log_path = path.as_ref().to_path_buf();

        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self { log_path })
    }

    fn default_log_path() -> std::io::Result<PathBuf> {
        let home = std::env::var("HOME").map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "HOME environment variable not set",
            )
        })?;

        Ok(PathBuf::from(home)
            .join(".config")
            .join("gitlog-picker")
            .join("history.log"))
    }

    /// Record a git command an action ran
    pub fn log_command(&self, args: &[String], cwd: &Path, exit_code: i32) -> std::io::Result<()> {
        self.append(&format!(
            "[{}] [{}] [{}] [exit:{}] git {}",
            Utc::now().to_rfc3339(),
            current_user(),
            cwd.display(),
            exit_code,
            args.join(" ")
        ))
    }

    /// Record an action that was refused before running anything
    pub fn log_rejected(&self, action: &str, reason: &str) -> std::io::Result<()> {
        self.append(&format!(
            "[{}] [{}] [REJECTED] action={} reason=\"{}\"",
            Utc::now().to_rfc3339(),
            current_user(),
            action,
            reason
        ))
    }

    fn append(&self, entry: &str) -> std::io::Result<()> {
        self.rotate_if_needed()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        writeln!(file, "{}", entry)?;
        file.flush()
    }

    /// Move the history aside once it outgrows `MAX_LOG_SIZE`
    fn rotate_if_needed(&self) -> std::io::Result<()> {
        if !self.log_path.exists() {
            return Ok(());
        }

        if fs::metadata(&self.log_path)?.len() > MAX_LOG_SIZE {
            // history.log -> history.log.1
            fs::rename(&self.log_path, self.log_path.with_extension("log.1"))?;
        }

        Ok(())
    }

    /// Where entries are appended
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

fn current_user() -> String {
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
}
