//! Outreach core: pure job state machine, template selection and deduplication.
mod dedup;
mod effect;
mod msg;
mod state;
pub mod template;
mod update;
mod view_model;

pub use dedup::{normalize_phone, Deduplicator};
pub use effect::{Command, Effect};
pub use msg::{LoopOutcome, Msg};
pub use state::{FailureKind, Job, JobId, JobKind, JobState};
pub use template::{TemplateChoice, TemplateSelection, TemplateStore};
pub use update::update;
pub use view_model::JobStatus;
