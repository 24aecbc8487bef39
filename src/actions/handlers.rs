//! Built-in actions for commit items

use crate::actions::dispatcher::{ActionContext, ActionFlags, ActionHandler};
use crate::actions::params::{bool_param, format_hash, length_param};
use crate::error::ActionError;
use crate::host::{MessageLevel, Placement, UNNAMED_REGISTER, with_register};
use async_trait::async_trait;

/// `git reset [--hard] <hash>`
pub struct Reset;

#[async_trait]
impl ActionHandler for Reset {
    async fn call(&self, ctx: &ActionContext<'_>) -> Result<ActionFlags, ActionError> {
        let commit = ctx.single_commit()?;
        let hard = bool_param(ctx.name, ctx.params, "hard")?;

        let mut args = vec!["reset".to_string()];
        if hard {
            args.push("--hard".to_string());
        }
        args.push(commit.hash.clone());

        ctx.git(&commit.cwd, args).await?;
        Ok(ActionFlags::None)
    }
}

/// Prompt for a name, then `git checkout -b <name> <hash>`
pub struct CreateBranch;

#[async_trait]
impl ActionHandler for CreateBranch {
    async fn call(&self, ctx: &ActionContext<'_>) -> Result<ActionFlags, ActionError> {
        let commit = ctx.single_commit()?;

        let name = ctx.host.input("Branch name: ").await?;
        let name = match name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                ctx.report(MessageLevel::Info, "branch creation cancelled").await;
                return Ok(ActionFlags::Persist);
            }
        };

        let args = vec![
            "checkout".to_string(),
            "-b".to_string(),
            name,
            commit.hash.clone(),
        ];
        ctx.git(&commit.cwd, args).await?;
        Ok(ActionFlags::None)
    }
}

/// `git cherry-pick` every selected commit, in selection order
pub struct CherryPick;

#[async_trait]
impl ActionHandler for CherryPick {
    async fn call(&self, ctx: &ActionContext<'_>) -> Result<ActionFlags, ActionError> {
        let commits: Vec<_> = ctx.items.iter().filter_map(|item| item.as_commit()).collect();
        let Some(first) = commits.first() else {
            return Err(ActionError::SelectionCardinality {
                action: ctx.name.to_string(),
                expected: "one or more commit items",
            });
        };

        let mut args = vec!["cherry-pick".to_string()];
        args.extend(commits.iter().map(|c| c.hash.clone()));

        ctx.git(&first.cwd, args).await?;
        Ok(ActionFlags::None)
    }
}

/// Copy the hash into the unnamed register and the user's yank register
pub struct Yank;

#[async_trait]
impl ActionHandler for Yank {
    async fn call(&self, ctx: &ActionContext<'_>) -> Result<ActionFlags, ActionError> {
        let commit = ctx.single_commit()?;
        let length = length_param(ctx.name, ctx.params)?;
        let hash = format_hash(&commit.hash, length);

        ctx.host.set_register(UNNAMED_REGISTER, hash).await?;
        let target = ctx.host.yank_register().await?;
        if target != UNNAMED_REGISTER {
            ctx.host.set_register(&target, hash).await?;
        }

        ctx.report(MessageLevel::Info, &format!("yanked {}", hash)).await;
        Ok(ActionFlags::None)
    }
}

/// Put the hash before (`insert`) or after (`append`) the cursor
pub struct Put {
    pub placement: Placement,
}

#[async_trait]
impl ActionHandler for Put {
    async fn call(&self, ctx: &ActionContext<'_>) -> Result<ActionFlags, ActionError> {
        let commit = ctx.single_commit()?;
        let length = length_param(ctx.name, ctx.params)?;
        let hash = format_hash(&commit.hash, length);

        let placement = self.placement;
        with_register(ctx.host, UNNAMED_REGISTER, hash, |host| {
            host.put(UNNAMED_REGISTER, placement)
        })
        .await?;

        Ok(ActionFlags::None)
    }
}
