use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::effect::Effect;
use crate::view_model::JobStatus;

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Collection,
    Messaging,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Collection => "collection",
            JobKind::Messaging => "messaging",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single job.
///
/// `Stopping` is transient: it is entered on a stop request and left once the
/// worker has finished its current unit and released the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Created,
    AwaitingSession,
    AwaitingCheckpoint,
    Running,
    Paused,
    Stopping,
    Completed,
    Failed,
    Stopped,
}

impl JobState {
    pub const ALL: [JobState; 9] = [
        JobState::Created,
        JobState::AwaitingSession,
        JobState::AwaitingCheckpoint,
        JobState::Running,
        JobState::Paused,
        JobState::Stopping,
        JobState::Completed,
        JobState::Failed,
        JobState::Stopped,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Stopped
        )
    }

    /// The complete edge set of the lifecycle graph.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Created, AwaitingSession)
                | (Created, Stopped)
                | (AwaitingSession, AwaitingCheckpoint)
                | (AwaitingSession, Stopping)
                | (AwaitingSession, Failed)
                | (AwaitingCheckpoint, Running)
                | (AwaitingCheckpoint, Stopping)
                | (AwaitingCheckpoint, Failed)
                | (Running, Paused)
                | (Running, Stopping)
                | (Running, Completed)
                | (Running, Failed)
                | (Paused, Running)
                | (Paused, Stopping)
                | (Paused, Completed)
                | (Paused, Failed)
                | (Stopping, Stopped)
                | (Stopping, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Created => "CREATED",
            JobState::AwaitingSession => "AWAITING_SESSION",
            JobState::AwaitingCheckpoint => "AWAITING_CHECKPOINT",
            JobState::Running => "RUNNING",
            JobState::Paused => "PAUSED",
            JobState::Stopping => "STOPPING",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
            JobState::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job-level failure taxonomy. Per-item failures never show up here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    SessionFailure,
    SinkFailure,
    CheckpointTimeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::SessionFailure => write!(f, "session failure"),
            FailureKind::SinkFailure => write!(f, "result sink failure"),
            FailureKind::CheckpointTimeout => write!(f, "checkpoint timeout"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    id: JobId,
    kind: JobKind,
    state: JobState,
    pages_total: u32,
    pages_done: u32,
    items_total: Option<u64>,
    items_processed: u64,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    result_location: PathBuf,
    failure_reason: Option<String>,
}

impl Job {
    pub fn new(
        id: JobId,
        kind: JobKind,
        created_at: DateTime<Utc>,
        result_location: PathBuf,
    ) -> Self {
        Self {
            id,
            kind,
            state: JobState::Created,
            pages_total: 0,
            pages_done: 0,
            items_total: None,
            items_processed: 0,
            created_at,
            completed_at: None,
            result_location,
            failure_reason: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn pages_total(&self) -> u32 {
        self.pages_total
    }

    pub fn pages_done(&self) -> u32 {
        self.pages_done
    }

    pub fn items_total(&self) -> Option<u64> {
        self.items_total
    }

    pub fn items_processed(&self) -> u64 {
        self.items_processed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn result_location(&self) -> &std::path::Path {
        &self.result_location
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn view(&self, recent_log_lines: Vec<String>) -> JobStatus {
        JobStatus {
            job_id: self.id,
            kind: self.kind,
            state: self.state,
            pages_done: self.pages_done,
            pages_total: self.pages_total,
            items_processed: self.items_processed,
            items_total: self.items_total,
            result_location: self.result_location.clone(),
            failure_reason: self.failure_reason.clone(),
            recent_log_lines,
        }
    }

    /// Moves to `next` if the edge exists. Illegal edges leave the job untouched.
    pub(crate) fn transition(&mut self, next: JobState, effects: &mut Vec<Effect>) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        let from = self.state;
        self.state = next;
        effects.push(Effect::StateChanged { from, to: next });
        true
    }

    pub(crate) fn finish(
        &mut self,
        next: JobState,
        at: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) -> bool {
        if !next.is_terminal() || !self.transition(next, effects) {
            return false;
        }
        self.completed_at = Some(at);
        true
    }

    pub(crate) fn fail(
        &mut self,
        kind: FailureKind,
        detail: &str,
        at: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) -> bool {
        if !self.finish(JobState::Failed, at, effects) {
            return false;
        }
        self.failure_reason = Some(format!("{kind}: {detail}"));
        true
    }

    pub(crate) fn set_discovery(&mut self, pages_total: u32, items_total: Option<u64>) {
        self.pages_total = pages_total.max(1).max(self.pages_done);
        if let Some(total) = items_total {
            self.items_total = Some(total.max(self.items_processed));
        }
    }

    pub(crate) fn mark_page_done(&mut self, page: u32) {
        self.pages_done = self.pages_done.max(page.min(self.pages_total));
    }

    pub(crate) fn mark_item_processed(&mut self) {
        self.items_processed += 1;
        if let Some(total) = self.items_total {
            if self.items_processed > total {
                self.items_total = Some(self.items_processed);
            }
        }
    }
}
