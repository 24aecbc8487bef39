pub mod executor;
pub mod log;
pub mod parser;

// Re-export commonly used types
pub use executor::{CommandOutput, GitExecutor, GitRunner, SystemGit};
pub use log::{CommitOrdering, DEFAULT_CHUNK_SIZE, LogOptions, LogStream, fetch};
pub use parser::{Commit, CommitRecord, parse_log, parse_log_line, pretty_format};
