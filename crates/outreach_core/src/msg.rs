use chrono::{DateTime, Utc};

use crate::FailureKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Caller asked for the job to start.
    StartRequested,
    /// Caller confirmed the manual checkpoint.
    CheckpointConfirmed,
    /// Caller asked to pause between work units.
    PauseRequested,
    /// Caller asked to resume a paused job.
    ResumeRequested,
    /// Caller asked for a graceful stop.
    StopRequested { at: DateTime<Utc> },
    /// Worker holds a session and has performed the initial navigation.
    SessionAcquired,
    /// Strategy reported how much work there is.
    Discovered {
        pages_total: u32,
        items_total: Option<u64>,
    },
    /// Worker finished every item of a page.
    PageFinished { page: u32 },
    /// One item was accepted and written to the sink.
    ItemAccepted,
    /// Worker loop exited and the session has been released.
    Finished {
        outcome: LoopOutcome,
        at: DateTime<Utc>,
    },
}

/// How the worker loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// Every page was processed or the strategy reported no further items.
    Exhausted,
    /// The stop flag was observed (including while waiting at the checkpoint).
    Stopped,
    /// A fatal error aborted the loop.
    Failed { kind: FailureKind, reason: String },
}
