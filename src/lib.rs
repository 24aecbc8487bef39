pub mod actions;
pub mod audit;
pub mod config;
pub mod error;
pub mod git;
pub mod host;
pub mod source;
pub mod terminal;

// Re-export commonly used types for convenience
pub use actions::{ActionDispatcher, ActionFlags, ActionRequest, Previewer};
pub use error::{ActionError, AppError, GitError, GitResult};
pub use git::{CommitRecord, LogOptions, LogStream};
pub use host::{Host, HostError, MessageLevel, Placement};
pub use source::{GitLogSource, SourceParams};
