use std::sync::{mpsc, Arc, PoisonError, RwLock};

use chrono::Utc;
use engine_logging::{engine_error, engine_info, engine_warn};
use outreach_core::JobId;

use crate::types::{EngineEvent, LogEntry, LogLevel, ProgressEvent, ProgressKind};

/// Push-style subscriber for engine events.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelProgressSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Default)]
struct Journal {
    next_seq: u64,
    events: Vec<ProgressEvent>,
    logs: Vec<LogEntry>,
}

impl Journal {
    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// Write side of a job's event stream. Clones share the same journal.
///
/// Entries are append-only and sequence numbers are shared between progress
/// events and log lines, so a reader can interleave them in order.
#[derive(Clone)]
pub struct Reporter {
    job_id: JobId,
    journal: Arc<RwLock<Journal>>,
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl Reporter {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            journal: Arc::new(RwLock::new(Journal::default())),
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn progress(&self, kind: ProgressKind) {
        let event = {
            let mut journal = self.journal.write().unwrap_or_else(PoisonError::into_inner);
            let event = ProgressEvent {
                seq: journal.take_seq(),
                job_id: self.job_id,
                at: Utc::now(),
                kind,
            };
            journal.events.push(event.clone());
            event
        };
        for sink in &self.sinks {
            sink.emit(EngineEvent::Progress(event.clone()));
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message.into());
    }

    fn log(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => engine_info!("job {}: {}", self.job_id, message),
            LogLevel::Warn => engine_warn!("job {}: {}", self.job_id, message),
            LogLevel::Error => engine_error!("job {}: {}", self.job_id, message),
        }
        let entry = {
            let mut journal = self.journal.write().unwrap_or_else(PoisonError::into_inner);
            let entry = LogEntry {
                seq: journal.take_seq(),
                at: Utc::now(),
                level,
                message,
            };
            journal.logs.push(entry.clone());
            entry
        };
        for sink in &self.sinks {
            sink.emit(EngineEvent::Log {
                job_id: self.job_id,
                entry: entry.clone(),
            });
        }
    }

    pub fn handle(&self) -> ReporterHandle {
        ReporterHandle {
            journal: Arc::clone(&self.journal),
        }
    }
}

/// Read side of a job's event stream. Readers never block the worker for
/// longer than a copy of the requested slice.
#[derive(Clone)]
pub struct ReporterHandle {
    journal: Arc<RwLock<Journal>>,
}

impl ReporterHandle {
    /// Progress events with `seq >= cursor`.
    pub fn events_since(&self, cursor: u64) -> Vec<ProgressEvent> {
        let journal = self.journal.read().unwrap_or_else(PoisonError::into_inner);
        let start = journal.events.partition_point(|event| event.seq < cursor);
        journal.events[start..].to_vec()
    }

    /// Log entries with `seq >= cursor`.
    pub fn logs_since(&self, cursor: u64) -> Vec<LogEntry> {
        let journal = self.journal.read().unwrap_or_else(PoisonError::into_inner);
        let start = journal.logs.partition_point(|entry| entry.seq < cursor);
        journal.logs[start..].to_vec()
    }

    /// The last `limit` log lines, oldest first.
    pub fn recent_lines(&self, limit: usize) -> Vec<String> {
        let journal = self.journal.read().unwrap_or_else(PoisonError::into_inner);
        let start = journal.logs.len().saturating_sub(limit);
        journal.logs[start..].iter().map(LogEntry::line).collect()
    }

    pub fn count_at(&self, level: LogLevel) -> usize {
        let journal = self.journal.read().unwrap_or_else(PoisonError::into_inner);
        journal.logs.iter().filter(|entry| entry.level == level).count()
    }
}
