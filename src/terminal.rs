//! A line-oriented terminal host for browsing the log outside an editor

use crate::actions::ActionParams;
use crate::host::{Host, HostError, MessageLevel, Placement};
use async_trait::async_trait;
use crossterm::style::Stylize;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// One command typed at the prompt
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalCommand {
    Empty,
    Quit,
    List,
    Actions,
    /// 1-based item number
    Preview(usize),
    Action {
        name: String,
        /// 1-based item numbers, in the order typed
        items: Vec<usize>,
        params: ActionParams,
    },
}

/// Parse `<action> <n>... [key=value]...` and the built-in commands
pub fn parse_command(line: &str) -> Result<TerminalCommand, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(TerminalCommand::Empty);
    };

    match head {
        "q" | "quit" => return Ok(TerminalCommand::Quit),
        "l" | "list" => return Ok(TerminalCommand::List),
        "actions" => return Ok(TerminalCommand::Actions),
        "preview" | "p" => {
            let index = words
                .next()
                .ok_or_else(|| "usage: preview <n>".to_string())
                .and_then(parse_index)?;
            return Ok(TerminalCommand::Preview(index));
        }
        _ => {}
    }

    let mut items = Vec::new();
    let mut params = ActionParams::new();
    for word in words {
        match word.split_once('=') {
            Some((key, value)) => {
                let value = serde_json::from_str(value)
                    .unwrap_or_else(|_| Value::String(value.to_string()));
                params.insert(key.to_string(), value);
            }
            None => items.push(parse_index(word)?),
        }
    }

    Ok(TerminalCommand::Action {
        name: head.to_string(),
        items,
        params,
    })
}

fn parse_index(word: &str) -> Result<usize, String> {
    match word.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("invalid item number: {}", word)),
    }
}

/// Host backed by stdin/stdout with in-memory registers
pub struct TerminalHost {
    registers: Mutex<HashMap<String, String>>,
    yank_register: String,
    stdin: tokio::sync::Mutex<Lines<BufReader<Stdin>>>,
}

impl TerminalHost {
    pub fn new(yank_register: String) -> Self {
        Self {
            registers: Mutex::new(HashMap::new()),
            yank_register,
            stdin: tokio::sync::Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// Read one line from stdin; `None` at end of input
    pub async fn read_line(&self) -> io::Result<Option<String>> {
        self.stdin.lock().await.next_line().await
    }

    /// Print a prompt without a trailing newline
    pub fn prompt(&self, text: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", text)?;
        stdout.flush()
    }

    fn register(&self, name: &str) -> Result<String, HostError> {
        let registers = self
            .registers
            .lock()
            .map_err(|_| HostError::Register(name.to_string()))?;
        Ok(registers.get(name).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl Host for TerminalHost {
    async fn report(&self, level: MessageLevel, message: &str) {
        match level {
            MessageLevel::Info => println!("{}", message),
            MessageLevel::Error => eprintln!("{}", message.red()),
        }
    }

    async fn input(&self, prompt: &str) -> Result<Option<String>, HostError> {
        self.prompt(prompt)?;
        Ok(self.read_line().await?)
    }

    async fn current_dir(&self) -> Result<PathBuf, HostError> {
        Ok(std::env::current_dir()?)
    }

    async fn get_register(&self, name: &str) -> Result<String, HostError> {
        self.register(name)
    }

    async fn set_register(&self, name: &str, value: &str) -> Result<(), HostError> {
        self.registers
            .lock()
            .map_err(|_| HostError::Register(name.to_string()))?
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn yank_register(&self) -> Result<String, HostError> {
        Ok(self.yank_register.clone())
    }

    async fn put(&self, register: &str, placement: Placement) -> Result<(), HostError> {
        let contents = self.register(register)?;
        let side = match placement {
            Placement::Before => "before cursor",
            Placement::After => "after cursor",
        };
        println!("{} {}", format!("put {}:", side).dim(), contents);
        Ok(())
    }
}
