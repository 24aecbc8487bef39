use async_trait::async_trait;
use std::future::Future;
use std::path::PathBuf;
use thiserror::Error;

/// The unnamed register
pub const UNNAMED_REGISTER: &str = "\"";

/// Errors surfaced by the host editor
#[derive(Debug, Error)]
pub enum HostError {
    #[error("register {0} is not available")]
    Register(String),

    #[error("editor command failed: {0}")]
    Command(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Severity of a user-visible message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Error,
}

/// Where put inserts register contents relative to the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Before,
    After,
}

/// Editor-side collaborator used by the source and the actions
///
/// Everything user-visible goes through `report`, so the core never touches
/// global editor state directly.
#[async_trait]
pub trait Host: Send + Sync {
    /// Show a line to the user
    async fn report(&self, level: MessageLevel, message: &str);

    /// Prompt for text; `None` means the user cancelled
    async fn input(&self, prompt: &str) -> Result<Option<String>, HostError>;

    /// Working directory of the editor process
    async fn current_dir(&self) -> Result<PathBuf, HostError>;

    async fn get_register(&self, name: &str) -> Result<String, HostError>;

    async fn set_register(&self, name: &str, value: &str) -> Result<(), HostError>;

    /// Register the user currently yanks into (`v:register`)
    async fn yank_register(&self) -> Result<String, HostError>;

    /// Put the contents of `register` at the cursor
    async fn put(&self, register: &str, placement: Placement) -> Result<(), HostError>;
}

/// Run `body` while `name` temporarily holds `value`
///
/// The previous contents are written back whether `body` succeeds or fails.
/// A body error wins over a restore error.
pub async fn with_register<'a, T, F, Fut>(
    host: &'a dyn Host,
    name: &str,
    value: &str,
    body: F,
) -> Result<T, HostError>
where
    F: FnOnce(&'a dyn Host) -> Fut,
    Fut: Future<Output = Result<T, HostError>>,
{
    let saved = host.get_register(name).await?;

    let result = match host.set_register(name, value).await {
        Ok(()) => body(host).await,
        Err(e) => Err(e),
    };

    let restored = host.set_register(name, &saved).await;
    match (result, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Err(e), _) => Err(e),
        (Ok(_), Err(e)) => Err(e),
    }
}
