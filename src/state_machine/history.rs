//! Append-only narrative of a request.
//!
//! Every [`History::add`] also hands the timestamped fact to a [`FactSink`],
//! which writes it somewhere durable. Sink writes are fire-and-forget: a
//! failing sink is reported through `tracing` and never fails the append.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One timestamped entry of a [`History`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub time: DateTime<Utc>,
    pub fact: String,
}

/// Destination for history facts outside of the state value itself.
pub trait FactSink: Send + Sync + fmt::Debug {
    /// Record one fact. Must not block and must not fail the caller.
    fn record(&self, time: DateTime<Utc>, fact: &str);
}

/// Formats a fact as a log line: ISO-8601 timestamp, tab, fact, newline.
pub fn format_log_line(time: DateTime<Utc>, fact: &str) -> String {
    format!(
        "{}\t{}\n",
        time.to_rfc3339_opts(SecondsFormat::Millis, true),
        fact
    )
}

/// Immutable, append-only list of facts, oldest first.
///
/// Serializes as a plain JSON array of `{time, fact}`; the sink is runtime
/// wiring and is not part of the persisted shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    facts: Vec<Fact>,
    #[serde(skip)]
    sink: Option<Arc<dyn FactSink>>,
}

impl PartialEq for History {
    fn eq(&self, other: &Self) -> bool {
        self.facts == other.facts
    }
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_facts(facts: Vec<Fact>) -> Self {
        Self { facts, sink: None }
    }

    /// Attach the sink that every later `add` writes through.
    #[must_use]
    pub fn with_sink(&self, sink: Arc<dyn FactSink>) -> Self {
        Self {
            facts: self.facts.clone(),
            sink: Some(sink),
        }
    }

    /// Append `fact` stamped with the current time.
    #[must_use]
    pub fn add(&self, fact: impl Into<String>) -> Self {
        let entry = Fact {
            time: Utc::now(),
            fact: fact.into(),
        };
        if let Some(sink) = &self.sink {
            sink.record(entry.time, &entry.fact);
        }
        let mut facts = self.facts.clone();
        facts.push(entry);
        Self {
            facts,
            sink: self.sink.clone(),
        }
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn last(&self) -> Option<&Fact> {
        self.facts.last()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// Appends facts to a log file from a background task.
///
/// Lines are queued on an unbounded channel, so `record` never waits on the
/// disk. The writer task ends once every clone of the sink is dropped.
#[derive(Debug, Clone)]
pub struct FileSink {
    tx: mpsc::UnboundedSender<String>,
    path: PathBuf,
}

impl FileSink {
    /// Start the writer task. Must be called from within a tokio runtime.
    pub fn spawn(path: impl Into<PathBuf>) -> (Self, JoinHandle<()>) {
        let path = path.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let writer_path = path.clone();
        let handle = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                if let Err(e) = append_line(&writer_path, &line).await {
                    tracing::error!(
                        path = %writer_path.display(),
                        error = %e,
                        "failed to append to history log"
                    );
                }
            }
        });
        (Self { tx, path }, handle)
    }
}

impl FactSink for FileSink {
    fn record(&self, time: DateTime<Utc>, fact: &str) {
        if self.tx.send(format_log_line(time, fact)).is_err() {
            tracing::error!(path = %self.path.display(), "history log writer has stopped");
        }
    }
}

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}
