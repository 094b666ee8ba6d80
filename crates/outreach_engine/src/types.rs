use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use outreach_core::{JobId, JobState};

/// One unit of work discovered on a page. `key` is the identity used for
/// deduplication; `payload` carries whatever the strategy needs later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub key: String,
    pub payload: BTreeMap<String, String>,
}

impl WorkItem {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            payload: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }

    /// Payload value, or the empty string when absent.
    pub fn field(&self, name: &str) -> &str {
        self.payload.get(name).map(String::as_str).unwrap_or("")
    }
}

/// One accepted row, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Values in schema order; missing columns become empty cells.
    pub fn values_for<'a>(&'a self, schema: &'a [String]) -> impl Iterator<Item = &'a str> + 'a {
        schema.iter().map(move |name| self.get(name).unwrap_or(""))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemFailureKind {
    Extraction,
    Send,
}

impl fmt::Display for ItemFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemFailureKind::Extraction => write!(f, "extraction failure"),
            ItemFailureKind::Send => write!(f, "send failure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub kind: ItemFailureKind,
    pub message: String,
}

impl ItemFailure {
    pub fn new(kind: ItemFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Result of processing a single work item. None of these end the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Accept(Record),
    Reject(String),
    RecoverableFailure(ItemFailure),
}

/// Items found on one page, or the signal that pagination ran out early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageItems {
    Items(Vec<WorkItem>),
    Exhausted,
}

/// Totals learned during preparation. `pages_total == 0` means unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preparation {
    pub pages_total: u32,
    pub items_total: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn line(&self) -> String {
        format!(
            "{} {} {}",
            self.at.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressKind {
    StateChanged { from: JobState, to: JobState },
    Discovered { pages_total: u32, items_total: Option<u64> },
    PageStarted { page: u32 },
    PageFinished { page: u32 },
    ItemAccepted { key: String, items_processed: u64 },
    ItemSkipped { key: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub seq: u64,
    pub job_id: JobId,
    pub at: DateTime<Utc>,
    pub kind: ProgressKind,
}

/// What push subscribers receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Progress(ProgressEvent),
    Log { job_id: JobId, entry: LogEntry },
}
