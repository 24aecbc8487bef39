#![allow(dead_code)]

use async_trait::async_trait;
use gitlog_picker::host::{Host, HostError, MessageLevel, Placement};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use tempfile::TempDir;

/// Helper to create a test git repository
pub fn create_test_repo() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let repo_path = temp_dir.path().to_path_buf();

    git(&repo_path, &["init"]);
    git(&repo_path, &["config", "user.name", "Test User"]);
    git(&repo_path, &["config", "user.email", "test@example.com"]);
    git(&repo_path, &["config", "commit.gpgsign", "false"]);

    (temp_dir, repo_path)
}

/// Helper to create a commit
pub fn create_commit(repo_path: &Path, file: &str, content: &str, message: &str) {
    fs::write(repo_path.join(file), content).expect("Failed to write file");
    git(repo_path, &["add", file]);
    git(repo_path, &["commit", "-m", message]);
}

/// Run git and return trimmed stdout, panicking on failure
pub fn git(repo_path: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Host that records everything shown to the user
#[derive(Default)]
pub struct RecordingHost {
    pub messages: Mutex<Vec<(MessageLevel, String)>>,
    pub registers: Mutex<HashMap<String, String>>,
    pub answer: Option<String>,
    pub cwd: PathBuf,
}

impl RecordingHost {
    pub fn in_dir(cwd: &Path) -> Self {
        Self {
            cwd: cwd.to_path_buf(),
            ..Default::default()
        }
    }

    pub fn errors(&self) -> Vec<String> {
        self.by_level(MessageLevel::Error)
    }

    pub fn infos(&self) -> Vec<String> {
        self.by_level(MessageLevel::Info)
    }

    fn by_level(&self, level: MessageLevel) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

#[async_trait]
impl Host for RecordingHost {
    async fn report(&self, level: MessageLevel, message: &str) {
        self.messages.lock().unwrap().push((level, message.to_string()));
    }

    async fn input(&self, _prompt: &str) -> Result<Option<String>, HostError> {
        Ok(self.answer.clone())
    }

    async fn current_dir(&self) -> Result<PathBuf, HostError> {
        Ok(self.cwd.clone())
    }

    async fn get_register(&self, name: &str) -> Result<String, HostError> {
        Ok(self
            .registers
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_register(&self, name: &str, value: &str) -> Result<(), HostError> {
        self.registers
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn yank_register(&self) -> Result<String, HostError> {
        Ok("\"".to_string())
    }

    async fn put(&self, _register: &str, _placement: Placement) -> Result<(), HostError> {
        Ok(())
    }
}
