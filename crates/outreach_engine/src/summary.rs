use std::path::PathBuf;

use outreach_core::Job;
use serde_json::json;

use crate::persist::{parent_dir, AtomicFileWriter, PersistError};

/// Writes `<result stem>.job.json` next to the result file.
pub fn write_job_summary(job: &Job, warnings: usize) -> Result<PathBuf, PersistError> {
    let result = job.result_location();
    let stem = result
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}-{}", job.kind(), job.id()));

    let summary = json!({
        "job_id": job.id(),
        "kind": job.kind().as_str(),
        "state": job.state().as_str(),
        "created_at": job.created_at().to_rfc3339(),
        "completed_at": job.completed_at().map(|at| at.to_rfc3339()),
        "pages_done": job.pages_done(),
        "pages_total": job.pages_total(),
        "items_processed": job.items_processed(),
        "items_total": job.items_total(),
        "result_location": result.display().to_string(),
        "failure_reason": job.failure_reason(),
        "warnings": warnings,
    });

    AtomicFileWriter::new(parent_dir(result))
        .write(&format!("{stem}.job.json"), summary.to_string())
}
