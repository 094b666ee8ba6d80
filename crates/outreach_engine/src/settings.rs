use std::path::PathBuf;
use std::time::Duration;

/// Knobs shared by every job a registry starts.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub output_dir: PathBuf,
    /// How often a blocked worker re-reads its control flags.
    pub control_poll: Duration,
    /// Attempts per discovery step before a non-fatal session error ends the job.
    pub discovery_attempts: u32,
    pub retry_backoff: Duration,
    /// `None` waits for checkpoint confirmation indefinitely.
    pub checkpoint_timeout: Option<Duration>,
    /// Number of log lines included in a status snapshot.
    pub log_tail: usize,
    pub write_summary: bool,
}

impl EngineSettings {
    pub fn default_with_output(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            control_poll: Duration::from_millis(100),
            discovery_attempts: 3,
            retry_backoff: Duration::from_secs(2),
            checkpoint_timeout: None,
            log_tail: 20,
            write_summary: true,
        }
    }
}
