//! The `git_log` source: resolves where to run and starts a fetch

use crate::config::SourceConfig;
use crate::git::log::{self, LogOptions, LogStream};
use crate::host::{Host, HostError, MessageLevel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CWD_DEPRECATED: &str =
    "[git_log] \"cwd\" is deprecated, use the browse path instead";

/// Parameters a host passes when gathering items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SourceParams {
    /// Deprecated: prefer the browse path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(flatten)]
    pub options: LogOptions,
}

pub struct GitLogSource {
    defaults: LogOptions,
    chunk_size: usize,
}

impl GitLogSource {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            defaults: config.params.clone(),
            chunk_size: config.chunk_size,
        }
    }

    /// Default parameters for a gather
    pub fn params(&self) -> SourceParams {
        SourceParams {
            cwd: None,
            options: self.defaults.clone(),
        }
    }

    /// Explicit cwd, then the browse path, then the editor's directory
    pub async fn resolve_cwd(
        host: &dyn Host,
        explicit: Option<&Path>,
        browse_path: Option<&Path>,
    ) -> Result<PathBuf, HostError> {
        if let Some(cwd) = explicit {
            tracing::warn!(cwd = %cwd.display(), "deprecated cwd parameter used");
            host.report(MessageLevel::Info, CWD_DEPRECATED).await;
            return Ok(cwd.to_path_buf());
        }

        match browse_path {
            Some(path) if !path.as_os_str().is_empty() => Ok(path.to_path_buf()),
            _ => host.current_dir().await,
        }
    }

    /// Start streaming commits for `params`
    ///
    /// Failures to start are reported to the host and yield a closed stream.
    pub async fn gather(
        &self,
        host: Arc<dyn Host>,
        params: &SourceParams,
        browse_path: Option<&Path>,
    ) -> LogStream {
        let cwd = match Self::resolve_cwd(host.as_ref(), params.cwd.as_deref(), browse_path).await {
            Ok(cwd) => cwd,
            Err(e) => {
                host.report(MessageLevel::Error, &format!("[git_log] {}", e))
                    .await;
                return LogStream::closed();
            }
        };

        match log::fetch(host.clone(), &cwd, &params.options, self.chunk_size) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(cwd = %cwd.display(), error = %e, "failed to start git log");
                host.report(MessageLevel::Error, &format!("[git_log] {}", e))
                    .await;
                LogStream::closed()
            }
        }
    }
}
