use crate::actions::handlers::{CherryPick, CreateBranch, Put, Reset, Yank};
use crate::actions::params::ActionParams;
use crate::audit::AuditLogger;
use crate::error::ActionError;
use crate::git::executor::{GitRunner, SystemGit};
use crate::git::parser::{Commit, CommitRecord};
use crate::host::{Host, MessageLevel, Placement};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Prefix for messages about commit actions
const KIND_NAME: &str = "git_commit";

/// What the host should do with its item list after an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionFlags {
    /// Refresh the items
    None,
    /// Keep the items and the selection as they are
    Persist,
}

/// A named action invoked on the current selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action_name: String,
    #[serde(default)]
    pub items: Vec<CommitRecord>,
    #[serde(default)]
    pub params: ActionParams,
}

/// Everything a handler may look at or use
pub struct ActionContext<'a> {
    pub name: &'a str,
    pub items: &'a [CommitRecord],
    pub params: &'a ActionParams,
    pub host: &'a dyn Host,
    runner: &'a dyn GitRunner,
    audit: Option<&'a AuditLogger>,
}

impl ActionContext<'_> {
    /// The selection, if it is exactly one commit
    pub fn single_commit(&self) -> Result<&Commit, ActionError> {
        match self.items {
            [CommitRecord::Commit(commit)] => Ok(commit),
            _ => Err(ActionError::SelectionCardinality {
                action: self.name.to_string(),
                expected: "one commit item",
            }),
        }
    }

    /// Run git through the dispatcher's runner and record it in the history
    pub async fn git(&self, cwd: &Path, args: Vec<String>) -> Result<(), ActionError> {
        let output = self.runner.run(self.host, cwd, &args).await?;

        if let Some(audit) = self.audit {
            if let Err(e) = audit.log_command(&args, cwd, output.exit_code) {
                tracing::warn!(error = %e, "failed to write command history");
            }
        }

        if !output.success {
            return Err(ActionError::SubprocessFailed {
                command: args.join(" "),
                exit_code: output.exit_code,
            });
        }
        Ok(())
    }

    pub async fn report(&self, level: MessageLevel, message: &str) {
        self.host
            .report(level, &format!("[{}] {}", KIND_NAME, message))
            .await;
    }
}

/// A single named action
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn call(&self, ctx: &ActionContext<'_>) -> Result<ActionFlags, ActionError>;
}

/// Table of named actions for commit items
pub struct ActionDispatcher {
    handlers: BTreeMap<&'static str, Box<dyn ActionHandler>>,
    runner: Box<dyn GitRunner>,
    audit: Option<AuditLogger>,
}

impl ActionDispatcher {
    /// Dispatcher with the built-in actions, running git through `runner`
    pub fn new(runner: Box<dyn GitRunner>) -> Self {
        let mut dispatcher = Self {
            handlers: BTreeMap::new(),
            runner,
            audit: None,
        };
        dispatcher.register("reset", Box::new(Reset));
        dispatcher.register("createBranch", Box::new(CreateBranch));
        dispatcher.register("cherryPick", Box::new(CherryPick));
        dispatcher.register("yank", Box::new(Yank));
        dispatcher.register(
            "insert",
            Box::new(Put {
                placement: Placement::Before,
            }),
        );
        dispatcher.register(
            "append",
            Box::new(Put {
                placement: Placement::After,
            }),
        );
        dispatcher
    }

    /// Record every action command in `logger`
    pub fn with_audit_logger(mut self, logger: AuditLogger) -> Self {
        self.audit = Some(logger);
        self
    }

    /// Add or replace a named action
    pub fn register(&mut self, name: &'static str, handler: Box<dyn ActionHandler>) {
        self.handlers.insert(name, handler);
    }

    /// Names of all registered actions
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    /// Run the requested action and report any failure to the host
    pub async fn dispatch(&self, host: &dyn Host, request: &ActionRequest) -> ActionFlags {
        let name = request.action_name.as_str();

        let Some(handler) = self.handlers.get(name) else {
            let error = ActionError::UnknownAction(name.to_string());
            self.report_failure(host, name, &error).await;
            return ActionFlags::Persist;
        };

        let ctx = ActionContext {
            name,
            items: &request.items,
            params: &request.params,
            host,
            runner: self.runner.as_ref(),
            audit: self.audit.as_ref(),
        };

        tracing::debug!(action = name, items = request.items.len(), "Dispatching action");

        match handler.call(&ctx).await {
            Ok(flags) => flags,
            Err(error) => {
                self.report_failure(host, name, &error).await;
                match error {
                    // git may have changed the repository before failing
                    ActionError::SubprocessFailed { .. } => ActionFlags::None,
                    _ => ActionFlags::Persist,
                }
            }
        }
    }

    async fn report_failure(&self, host: &dyn Host, name: &str, error: &ActionError) {
        tracing::warn!(action = name, error = %error, "action failed");

        if error.is_validation() {
            if let Some(audit) = &self.audit {
                if let Err(e) = audit.log_rejected(name, &error.to_string()) {
                    tracing::warn!(error = %e, "failed to write command history");
                }
            }
        }

        host.report(MessageLevel::Error, &format!("[{}] {}", KIND_NAME, error))
            .await;
    }
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new(Box::new(SystemGit))
    }
}
