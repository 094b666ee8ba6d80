use std::fmt;

use crate::JobState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Spawn the worker that acquires the session.
    LaunchWorker,
    /// Let the worker past the manual checkpoint.
    ReleaseCheckpoint,
    SetPaused(bool),
    SignalStop,
    StateChanged { from: JobState, to: JobState },
    /// A caller command had no effect in the current state.
    Ignored { command: Command, state: JobState },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    ConfirmCheckpoint,
    Pause,
    Resume,
    Stop,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Start => write!(f, "start"),
            Command::ConfirmCheckpoint => write!(f, "confirm checkpoint"),
            Command::Pause => write!(f, "pause"),
            Command::Resume => write!(f, "resume"),
            Command::Stop => write!(f, "stop"),
        }
    }
}
