use clap::Parser;
use crossterm::style::Stylize;
use gitlog_picker::actions::{ActionDispatcher, ActionFlags, ActionRequest, Previewer, preview};
use gitlog_picker::audit::AuditLogger;
use gitlog_picker::config::Config;
use gitlog_picker::error::AppResult;
use gitlog_picker::git::{CommitOrdering, CommitRecord};
use gitlog_picker::host::{Host, MessageLevel, UNNAMED_REGISTER};
use gitlog_picker::source::{GitLogSource, SourceParams};
use gitlog_picker::terminal::{TerminalCommand, TerminalHost, parse_command};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Browse git log and act on commits from the terminal
#[derive(Parser, Debug)]
#[command(name = "gitlog-picker", version, about, long_about = None)]
struct Cli {
    /// Include --graph connector lines
    #[arg(long)]
    graph: bool,

    /// Show commits reachable from all refs
    #[arg(long)]
    all: bool,

    /// Oldest commits first
    #[arg(long)]
    reverse: bool,

    /// Commit ordering: date, author-date or topo
    #[arg(long)]
    order: Option<CommitOrdering>,

    /// Repository directory to browse
    #[arg(long, env = "GITLOG_PICKER_PATH")]
    path: Option<PathBuf>,

    /// Deprecated alias for --path
    #[arg(long, hide = true)]
    cwd: Option<PathBuf>,

    /// Config file (defaults to ~/.config/gitlog-picker/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Register that yank writes to besides the unnamed one
    #[arg(long, default_value = UNNAMED_REGISTER)]
    register: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Revisions to start from (use `--` before values such as `--not`)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    revisions: Vec<String>,
}

impl Cli {
    fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }

    fn apply(&self, params: &mut SourceParams) {
        let options = &mut params.options;
        options.show_graph |= self.graph;
        options.show_all |= self.all;
        options.show_reverse |= self.reverse;
        if let Some(order) = self.order {
            options.commit_ordering = order;
        }
        if !self.revisions.is_empty() {
            options.starting_commits = self.revisions.clone();
        }
        params.cwd = self.cwd.clone();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(cli.log_level().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let source = GitLogSource::new(&config.source);
    let mut params = source.params();
    cli.apply(&mut params);

    let mut dispatcher = ActionDispatcher::default();
    if config.behavior.log_commands {
        dispatcher = dispatcher.with_audit_logger(AuditLogger::new()?);
    }

    let host = Arc::new(TerminalHost::new(cli.register.clone()));

    loop {
        let records = source
            .gather(host.clone(), &params, cli.path.as_deref())
            .await
            .collect()
            .await;
        print_items(&records);

        if !command_loop(host.as_ref(), &dispatcher, &records, config.kind.preview_no_pager).await? {
            return Ok(());
        }
    }
}

/// Handle commands until one asks for a refresh (`true`) or input ends (`false`)
async fn command_loop(
    host: &TerminalHost,
    dispatcher: &ActionDispatcher,
    records: &[CommitRecord],
    no_pager: bool,
) -> AppResult<bool> {
    loop {
        host.prompt("> ")?;
        let Some(line) = host.read_line().await? else {
            return Ok(false);
        };

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                host.report(MessageLevel::Error, &message).await;
                continue;
            }
        };

        match command {
            TerminalCommand::Empty => {}
            TerminalCommand::Quit => return Ok(false),
            TerminalCommand::List => print_items(records),
            TerminalCommand::Actions => {
                println!("{}", dispatcher.names().collect::<Vec<_>>().join(" "));
            }
            TerminalCommand::Preview(n) => match records.get(n - 1) {
                Some(record) => show_preview(host, preview(record, no_pager)).await,
                None => {
                    host.report(MessageLevel::Error, &format!("no item {}", n))
                        .await
                }
            },
            TerminalCommand::Action { name, items, params } => {
                let Some(items) = items
                    .iter()
                    .map(|n| records.get(n - 1).cloned())
                    .collect::<Option<Vec<_>>>()
                else {
                    host.report(MessageLevel::Error, "item number out of range")
                        .await;
                    continue;
                };

                let request = ActionRequest {
                    action_name: name,
                    items,
                    params,
                };
                if dispatcher.dispatch(host, &request).await == ActionFlags::None {
                    return Ok(true);
                }
            }
        }
    }
}

fn print_items(records: &[CommitRecord]) {
    let width = records.len().to_string().len();
    for (i, record) in records.iter().enumerate() {
        let number = format!("{:>width$}", i + 1, width = width);
        match record {
            CommitRecord::Commit(_) => println!("{} {}", number.dark_grey(), record.display()),
            CommitRecord::Graph { .. } => println!("{} {}", number.dark_grey(), record.display().dim()),
        }
    }
}

async fn show_preview(host: &TerminalHost, previewer: Previewer) {
    match previewer {
        Previewer::Terminal { cmds } => {
            let Some((program, args)) = cmds.split_first() else {
                return;
            };
            match tokio::process::Command::new(program).args(args).status().await {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    host.report(MessageLevel::Error, &format!("preview exited with {}", status))
                        .await
                }
                Err(e) => {
                    host.report(MessageLevel::Error, &format!("preview failed: {}", e))
                        .await
                }
            }
        }
        Previewer::Text { contents } => {
            for line in contents {
                host.report(MessageLevel::Info, &line).await;
            }
        }
    }
}
