use crate::error::{GitError, GitResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Placeholders for `git log --pretty`, in field order
///
/// The first slot is left empty; `--graph` writes its prefix there.
const LOG_FIELDS: [&str; 7] = [
    "",    // Graph
    "%H",  // Hash
    "%aN", // Author
    "%ai", // AuthorDate
    "%cN", // Committer
    "%ci", // CommitDate
    "%s",  // Subject
];

/// Build the `--pretty` format with fields separated by NUL
pub fn pretty_format() -> String {
    LOG_FIELDS.join("%x00")
}

/// Parse a single line of `git log --pretty=<pretty_format()>` output
pub fn parse_log_line(cwd: &Path, line: &str) -> GitResult<CommitRecord> {
    let fields: Vec<&str> = line.split('\0').collect();

    match fields.as_slice() {
        [graph] => Ok(CommitRecord::Graph {
            graph: graph.to_string(),
        }),
        [graph, hash, author, author_date, committer, commit_date, subject] if !hash.is_empty() => {
            Ok(CommitRecord::Commit(Commit {
                cwd: cwd.to_path_buf(),
                graph: graph.to_string(),
                hash: hash.to_string(),
                author: author.to_string(),
                author_date: author_date.to_string(),
                committer: committer.to_string(),
                commit_date: commit_date.to_string(),
                subject: subject.to_string(),
            }))
        }
        _ => Err(GitError::MalformedLine {
            fields: fields.len(),
            line: line.to_string(),
        }),
    }
}

/// Parse a complete log output, stopping at the first malformed line
pub fn parse_log(cwd: &Path, output: &str) -> GitResult<Vec<CommitRecord>> {
    output
        .lines()
        .map(|line| parse_log_line(cwd, line))
        .collect()
}

/// A commit from git log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// Repository the commit was read from
    pub cwd: PathBuf,
    pub graph: String,
    pub hash: String,
    pub author: String,
    pub author_date: String,
    pub committer: String,
    pub commit_date: String,
    pub subject: String,
}

impl Commit {
    /// First six characters of the hash, as shown in the list
    pub fn short_hash(&self) -> &str {
        truncate(&self.hash, 6)
    }
}

/// One line of git log output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CommitRecord {
    Commit(Commit),
    /// A `--graph` connector line with no commit on it
    Graph { graph: String },
}

impl CommitRecord {
    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            CommitRecord::Commit(commit) => Some(commit),
            CommitRecord::Graph { .. } => None,
        }
    }

    pub fn hash(&self) -> Option<&str> {
        self.as_commit().map(|c| c.hash.as_str())
    }

    pub fn graph(&self) -> &str {
        match self {
            CommitRecord::Commit(commit) => &commit.graph,
            CommitRecord::Graph { graph } => graph,
        }
    }

    /// Text the fuzzy matcher filters on
    pub fn word(&self) -> String {
        match self {
            CommitRecord::Commit(c) => format!(
                "{} {} by {}({})",
                c.short_hash(),
                c.subject,
                c.author,
                c.committer
            ),
            CommitRecord::Graph { .. } => String::new(),
        }
    }

    /// Text shown in the item list
    pub fn display(&self) -> String {
        match self {
            CommitRecord::Commit(c) => {
                let mut parts = Vec::with_capacity(3);
                if !c.graph.is_empty() {
                    parts.push(c.graph.as_str());
                }
                parts.push(c.short_hash());
                parts.push(c.subject.as_str());
                parts.join(" ")
            }
            CommitRecord::Graph { graph } => graph.clone(),
        }
    }
}

/// Leading `len` characters of `s`, or all of it when shorter
pub fn truncate(s: &str, len: usize) -> &str {
    match s.char_indices().nth(len) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}
