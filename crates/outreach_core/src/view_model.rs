use std::path::PathBuf;

use crate::{JobId, JobKind, JobState};

/// Read-only snapshot handed to observers polling a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub job_id: JobId,
    pub kind: JobKind,
    pub state: JobState,
    pub pages_done: u32,
    pub pages_total: u32,
    pub items_processed: u64,
    pub items_total: Option<u64>,
    pub result_location: PathBuf,
    pub failure_reason: Option<String>,
    pub recent_log_lines: Vec<String>,
}

impl JobStatus {
    /// One-line summary, e.g. `RUNNING pages 2/5 items 17/120`.
    pub fn summary_line(&self) -> String {
        let items_total = self
            .items_total
            .map(|total| total.to_string())
            .unwrap_or_else(|| "?".to_string());
        let mut line = format!(
            "{} pages {}/{} items {}/{}",
            self.state, self.pages_done, self.pages_total, self.items_processed, items_total
        );
        if let Some(reason) = &self.failure_reason {
            line.push_str(" (");
            line.push_str(reason);
            line.push(')');
        }
        line
    }
}
