//! Streaming `git log` into commit records
//!
//! A fetch spawns one git process and one pump task. The pump reads stdout
//! line by line, parses every line as it arrives and forwards the records in
//! batches over a bounded channel. Batches are only a throughput knob:
//! [`LogStream::next`] hands records out one at a time in git's order.

use crate::error::{GitError, GitResult};
use crate::git::executor::{GitExecutor, read_line};
use crate::git::parser::{CommitRecord, parse_log_line, pretty_format};
use crate::host::{Host, MessageLevel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default number of records per batch
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Batches buffered ahead of the consumer
const CHANNEL_CAPACITY: usize = 4;

/// Prefix for messages about a fetch
const SOURCE_NAME: &str = "git_log";

/// Commit ordering passed to git log as `--<x>-order`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitOrdering {
    Date,
    AuthorDate,
    #[default]
    Topo,
}

impl CommitOrdering {
    pub fn flag(self) -> &'static str {
        match self {
            CommitOrdering::Date => "--date-order",
            CommitOrdering::AuthorDate => "--author-date-order",
            CommitOrdering::Topo => "--topo-order",
        }
    }
}

impl std::str::FromStr for CommitOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(CommitOrdering::Date),
            "author-date" => Ok(CommitOrdering::AuthorDate),
            "topo" => Ok(CommitOrdering::Topo),
            other => Err(format!(
                "unknown commit ordering '{}' (expected date, author-date or topo)",
                other
            )),
        }
    }
}

/// Filter options for a log fetch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogOptions {
    pub show_graph: bool,
    pub show_all: bool,
    pub show_reverse: bool,
    pub commit_ordering: CommitOrdering,
    /// Revisions passed through as positional arguments; empty means HEAD
    pub starting_commits: Vec<String>,
}

impl LogOptions {
    /// Full argument list for `git`
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "log".to_string(),
            format!("--pretty={}", pretty_format()),
            self.commit_ordering.flag().to_string(),
        ];
        if self.show_graph {
            args.push("--graph".to_string());
        }
        if self.show_all {
            args.push("--all".to_string());
        }
        if self.show_reverse {
            args.push("--reverse".to_string());
        }
        args.extend(self.starting_commits.iter().cloned());
        args
    }
}

/// Records from one fetch, in git output order
///
/// Dropping the stream before it is drained stops the fetch and kills git.
pub struct LogStream {
    rx: mpsc::Receiver<Vec<CommitRecord>>,
    pending: std::vec::IntoIter<CommitRecord>,
    pump: Option<JoinHandle<()>>,
}

impl LogStream {
    /// A stream that is already closed
    pub fn closed() -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self {
            rx,
            pending: Vec::new().into_iter(),
            pump: None,
        }
    }

    /// Next record, or `None` once git's output is exhausted
    pub async fn next(&mut self) -> Option<CommitRecord> {
        loop {
            if let Some(record) = self.pending.next() {
                return Some(record);
            }
            self.pending = self.rx.recv().await?.into_iter();
        }
    }

    /// Next batch of records, starting with anything left from `next`
    pub async fn next_batch(&mut self) -> Option<Vec<CommitRecord>> {
        let rest: Vec<CommitRecord> = self.pending.by_ref().collect();
        if !rest.is_empty() {
            return Some(rest);
        }
        self.rx.recv().await
    }

    /// Drain every record and wait for the fetch to finish reporting
    pub async fn collect(mut self) -> Vec<CommitRecord> {
        let mut records = Vec::new();
        while let Some(batch) = self.next_batch().await {
            records.extend(batch);
        }
        self.finish().await;
        records
    }

    /// Wait until the pump has reaped git and reported any errors
    pub async fn finish(mut self) {
        if let Some(pump) = self.pump.take() {
            let _ = pump.await;
        }
    }
}

/// Start `git log` in `cwd` and stream its records
pub fn fetch(
    host: Arc<dyn Host>,
    cwd: &Path,
    options: &LogOptions,
    chunk_size: usize,
) -> GitResult<LogStream> {
    let child = GitExecutor::new(cwd).spawn(&options.args())?;
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let pump = tokio::spawn(pump(host, child, cwd.to_path_buf(), tx, chunk_size.max(1)));

    Ok(LogStream {
        rx,
        pending: Vec::new().into_iter(),
        pump: Some(pump),
    })
}

/// Why reading stopped before EOF
#[derive(Debug)]
pub enum StreamEnd {
    /// The consumer went away
    Abandoned,
    Failed(GitError),
}

/// Parse every line of `reader` and send the records in batches
///
/// Records before a malformed line are still sent; nothing after it is.
/// Returns as soon as the receiver is dropped, even while waiting on git.
pub async fn stream_records<R: AsyncRead + Unpin>(
    reader: R,
    cwd: &Path,
    chunk_size: usize,
    tx: &mpsc::Sender<Vec<CommitRecord>>,
) -> Result<usize, StreamEnd> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut batch = Vec::with_capacity(chunk_size);
    let mut sent = 0;
    let mut failure = None;

    loop {
        let read = tokio::select! {
            read = read_line(&mut reader, &mut buf) => read,
            _ = tx.closed() => return Err(StreamEnd::Abandoned),
        };
        let line = match read {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                failure = Some(GitError::IoError(e));
                break;
            }
        };
        match parse_log_line(cwd, &line) {
            Ok(record) => batch.push(record),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
        if batch.len() >= chunk_size {
            sent += batch.len();
            let full = std::mem::replace(&mut batch, Vec::with_capacity(chunk_size));
            tx.send(full).await.map_err(|_| StreamEnd::Abandoned)?;
        }
    }

    if !batch.is_empty() {
        sent += batch.len();
        tx.send(batch).await.map_err(|_| StreamEnd::Abandoned)?;
    }
    match failure {
        Some(e) => Err(StreamEnd::Failed(e)),
        None => Ok(sent),
    }
}

async fn pump(
    host: Arc<dyn Host>,
    mut child: Child,
    cwd: PathBuf,
    tx: mpsc::Sender<Vec<CommitRecord>>,
    chunk_size: usize,
) {
    let stderr = child.stderr.take().map(|pipe| tokio::spawn(read_lines(pipe)));

    let outcome = match child.stdout.take() {
        Some(stdout) => stream_records(stdout, &cwd, chunk_size, &tx).await,
        None => Ok(0),
    };

    let killed = outcome.is_err();
    if killed {
        let _ = child.start_kill();
    }
    let status = child.wait().await;
    let stderr_lines = match stderr {
        Some(handle) => handle.await.unwrap_or_default(),
        None => Vec::new(),
    };

    // Close the stream before reporting anything
    drop(tx);

    match outcome {
        Ok(count) => {
            tracing::info!(cwd = %cwd.display(), records = count, "git log fetch finished");
        }
        Err(StreamEnd::Abandoned) => {
            tracing::debug!(cwd = %cwd.display(), "git log fetch abandoned, killed git");
        }
        Err(StreamEnd::Failed(e)) => {
            tracing::warn!(cwd = %cwd.display(), error = %e, "git log fetch failed");
            host.report(MessageLevel::Error, &format!("[{}] {}", SOURCE_NAME, e))
                .await;
        }
    }

    match status {
        Ok(status) if !status.success() && !killed => {
            tracing::warn!(cwd = %cwd.display(), code = ?status.code(), "git log exited with failure");
            for line in stderr_lines {
                host.report(MessageLevel::Error, &format!("[{}] {}", SOURCE_NAME, line))
                    .await;
            }
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "failed to wait for git log");
        }
    }
}

async fn read_lines<R: AsyncRead + Unpin>(pipe: R) -> Vec<String> {
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    let mut out = Vec::new();
    while let Ok(Some(line)) = read_line(&mut reader, &mut buf).await {
        out.push(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostError, Placement};
    use async_trait::async_trait;
    use std::process::Stdio;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::process::Command;

    const HASH_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const HASH_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn commit_line(graph: &str, hash: &str, subject: &str) -> String {
        [graph, hash, "A", "2024-01-01", "C", "2024-01-02", subject].join("\0")
    }

    fn sample_output(n: usize) -> String {
        let mut out = String::new();
        for i in 0..n {
            if i % 3 == 2 {
                out.push_str("|\\\n");
            } else {
                let hash = format!("{:040x}", i);
                out.push_str(&commit_line("* ", &hash, &format!("commit {}", i)));
                out.push('\n');
            }
        }
        out
    }

    async fn collect_all(
        input: &[u8],
        chunk_size: usize,
    ) -> (Result<usize, StreamEnd>, Vec<Vec<CommitRecord>>) {
        let (tx, mut rx) = mpsc::channel(1024);
        let result = stream_records(input, Path::new("/repo"), chunk_size, &tx).await;
        drop(tx);
        let mut batches = Vec::new();
        while let Some(batch) = rx.recv().await {
            batches.push(batch);
        }
        (result, batches)
    }

    #[test]
    fn test_default_args() {
        let args = LogOptions::default().args();
        assert_eq!(
            args,
            vec![
                "log".to_string(),
                "--pretty=%x00%H%x00%aN%x00%ai%x00%cN%x00%ci%x00%s".to_string(),
                "--topo-order".to_string(),
            ]
        );
    }

    #[test]
    fn test_full_args_order() {
        let options = LogOptions {
            show_graph: true,
            show_all: true,
            show_reverse: true,
            commit_ordering: CommitOrdering::Date,
            starting_commits: vec![
                "main".to_string(),
                "--not".to_string(),
                "origin/main".to_string(),
            ],
        };

        let args = options.args();
        assert_eq!(
            args,
            vec![
                "log".to_string(),
                format!("--pretty={}", pretty_format()),
                "--date-order".to_string(),
                "--graph".to_string(),
                "--all".to_string(),
                "--reverse".to_string(),
                "main".to_string(),
                "--not".to_string(),
                "origin/main".to_string(),
            ]
        );
    }

    #[test]
    fn test_ordering_flags() {
        assert_eq!(CommitOrdering::Date.flag(), "--date-order");
        assert_eq!(CommitOrdering::AuthorDate.flag(), "--author-date-order");
        assert_eq!(CommitOrdering::Topo.flag(), "--topo-order");
        assert_eq!("author-date".parse::<CommitOrdering>(), Ok(CommitOrdering::AuthorDate));
        assert!("random".parse::<CommitOrdering>().is_err());
    }

    #[test]
    fn test_options_from_camel_case_json() {
        let options: LogOptions = serde_json::from_value(serde_json::json!({
            "showGraph": true,
            "commitOrdering": "author-date",
            "startingCommits": ["v1.0"],
        }))
        .unwrap();

        assert!(options.show_graph);
        assert!(!options.show_all);
        assert_eq!(options.commit_ordering, CommitOrdering::AuthorDate);
        assert_eq!(options.starting_commits, vec!["v1.0".to_string()]);
    }

    #[tokio::test]
    async fn test_batches_do_not_change_order() {
        let output = sample_output(10);
        let expected = crate::git::parser::parse_log(Path::new("/repo"), &output).unwrap();

        for chunk_size in [1, 2, 3, 7, 1000] {
            let (result, batches) = collect_all(output.as_bytes(), chunk_size).await;
            assert_eq!(result.unwrap(), expected.len());
            assert!(batches.iter().all(|b| b.len() <= chunk_size));
            let flat: Vec<CommitRecord> = batches.into_iter().flatten().collect();
            assert_eq!(flat, expected, "chunk size {}", chunk_size);
        }
    }

    #[tokio::test]
    async fn test_crlf_and_missing_trailing_newline() {
        let output = format!("{}\r\n{}", commit_line("", HASH_A, "one"), commit_line("", HASH_B, "two"));
        let (result, batches) = collect_all(output.as_bytes(), 1000).await;

        assert_eq!(result.unwrap(), 2);
        let flat: Vec<CommitRecord> = batches.into_iter().flatten().collect();
        assert_eq!(flat[0].as_commit().unwrap().subject, "one");
        assert_eq!(flat[1].hash(), Some(HASH_B));
    }

    #[tokio::test]
    async fn test_malformed_line_stops_stream() {
        let output = format!(
            "{}\nnot\0a\0commit\n{}\n",
            commit_line("", HASH_A, "before"),
            commit_line("", HASH_B, "after")
        );
        let (result, batches) = collect_all(output.as_bytes(), 1000).await;

        assert!(matches!(
            result,
            Err(StreamEnd::Failed(GitError::MalformedLine { fields: 3, .. }))
        ));
        let flat: Vec<CommitRecord> = batches.into_iter().flatten().collect();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].hash(), Some(HASH_A));
    }

    #[tokio::test]
    async fn test_abandoned_consumer() {
        let output = sample_output(20);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let result = stream_records(output.as_bytes(), Path::new("/repo"), 2, &tx).await;
        assert!(matches!(result, Err(StreamEnd::Abandoned)));
    }

    #[tokio::test]
    async fn test_empty_output() {
        let (result, batches) = collect_all(b"", 10).await;
        assert_eq!(result.unwrap(), 0);
        assert!(batches.is_empty());
    }

    #[tokio::test]
    async fn test_closed_stream() {
        let mut stream = LogStream::closed();
        assert!(stream.next().await.is_none());
        assert!(stream.collect().await.is_empty());
    }

    #[tokio::test]
    async fn test_next_and_next_batch_interleave() {
        let output = sample_output(6);
        let (tx, rx) = mpsc::channel(16);
        stream_records(output.as_bytes(), Path::new("/repo"), 4, &tx)
            .await
            .unwrap();
        drop(tx);

        let mut stream = LogStream {
            rx,
            pending: Vec::new().into_iter(),
            pump: None,
        };
        let first = stream.next().await.unwrap();
        assert_eq!(first.as_commit().unwrap().subject, "commit 0");
        // Remainder of the first batch comes back before the second batch
        assert_eq!(stream.next_batch().await.unwrap().len(), 3);
        assert_eq!(stream.next_batch().await.unwrap().len(), 2);
        assert!(stream.next_batch().await.is_none());
    }

    /// Errors reported during a fetch, each with whether the stream was
    /// already closed when it arrived
    #[derive(Default)]
    struct ReportLog {
        sender: Mutex<Option<mpsc::WeakSender<Vec<CommitRecord>>>>,
        errors: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl Host for ReportLog {
        async fn report(&self, level: MessageLevel, message: &str) {
            if level != MessageLevel::Error {
                return;
            }
            let closed = self
                .sender
                .lock()
                .unwrap()
                .as_ref()
                .is_none_or(|weak| weak.upgrade().is_none());
            self.errors.lock().unwrap().push((message.to_string(), closed));
        }
        async fn input(&self, _prompt: &str) -> Result<Option<String>, HostError> {
            Ok(None)
        }
        async fn current_dir(&self) -> Result<PathBuf, HostError> {
            Ok(PathBuf::from("/"))
        }
        async fn get_register(&self, _name: &str) -> Result<String, HostError> {
            Ok(String::new())
        }
        async fn set_register(&self, _name: &str, _value: &str) -> Result<(), HostError> {
            Ok(())
        }
        async fn yank_register(&self) -> Result<String, HostError> {
            Ok("\"".to_string())
        }
        async fn put(&self, _register: &str, _placement: Placement) -> Result<(), HostError> {
            Ok(())
        }
    }

    /// Stand-in for git: a shell script with the same pipes
    fn sh(script: &str) -> Child {
        Command::new("sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .unwrap()
    }

    fn print_commit(hash: &str, subject: &str) -> String {
        format!("printf '\\000{}\\000A\\000d\\000C\\000d\\000{}\\n'", hash, subject)
    }

    async fn run_pump(script: &str) -> (Vec<CommitRecord>, Arc<ReportLog>) {
        let host = Arc::new(ReportLog::default());
        let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
        *host.sender.lock().unwrap() = Some(tx.downgrade());

        let handle = tokio::spawn(pump(host.clone(), sh(script), PathBuf::from("/repo"), tx, 1000));
        let mut records = Vec::new();
        while let Some(batch) = rx.recv().await {
            records.extend(batch);
        }
        handle.await.unwrap();
        (records, host)
    }

    #[tokio::test]
    async fn test_pump_reports_malformed_line_once() {
        let script = format!(
            "{}; printf 'x\\000y\\000z\\n'; {}; echo 'fatal: noise' >&2; exit 3",
            print_commit(HASH_A, "good"),
            print_commit(HASH_B, "after")
        );

        let (records, host) = run_pump(&script).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].as_commit().unwrap().subject, "good");
        // git was killed, so its stderr is not reported
        let errors = host.errors.lock().unwrap();
        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert!(
            errors[0]
                .0
                .starts_with("[git_log] malformed git log line (3 fields)"),
            "{}",
            errors[0].0
        );
        assert!(errors[0].1);
    }

    #[tokio::test]
    async fn test_pump_reports_stderr_after_close() {
        let script = format!(
            "{}; echo 'fatal: first' >&2; echo 'fatal: second' >&2; exit 3",
            print_commit(HASH_A, "one")
        );

        let (records, host) = run_pump(&script).await;

        assert_eq!(records.len(), 1);
        assert_eq!(
            host.errors.lock().unwrap().as_slice(),
            &[
                ("[git_log] fatal: first".to_string(), true),
                ("[git_log] fatal: second".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_pump_ignores_stderr_on_success() {
        let script = format!("{}; echo 'warning: noise' >&2", print_commit(HASH_A, "one"));

        let (records, host) = run_pump(&script).await;

        assert_eq!(records.len(), 1);
        assert!(host.errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pump_kills_git_when_consumer_leaves() {
        let script = format!("{}; exec sleep 30", print_commit(HASH_A, "one"));
        let host = Arc::new(ReportLog::default());
        let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);

        let handle = tokio::spawn(pump(host.clone(), sh(&script), PathBuf::from("/repo"), tx, 1));
        assert_eq!(rx.recv().await.unwrap().len(), 1);
        drop(rx);

        // The pump only returns after git has been reaped
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("git still running after the stream was dropped")
            .unwrap();
        assert!(host.errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stream_records_stops_while_waiting_for_output() {
        // Writer stays open, so reading alone would never finish
        let (_writer, reader) = tokio::io::duplex(64);
        let (tx, rx) = mpsc::channel(1);

        let stream = stream_records(reader, Path::new("/repo"), 10, &tx);
        drop(rx);
        let result = tokio::time::timeout(Duration::from_secs(5), stream).await;

        assert!(matches!(result, Ok(Err(StreamEnd::Abandoned))));
    }
}
