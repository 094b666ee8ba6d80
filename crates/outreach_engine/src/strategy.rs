use std::time::Duration;

use async_trait::async_trait;
use outreach_core::JobKind;

use crate::session::{BrowserSession, SessionError};
use crate::types::{ItemOutcome, PageItems, Preparation, WorkItem};

/// The job-specific half of the worker loop.
///
/// The engine owns pagination, deduplication, control flags and result
/// writing; a strategy only knows how to find items and what to do with one.
/// Errors returned from these methods are session errors: fatal ones end the
/// job, the rest are retried (discovery) or logged and skipped (items).
#[async_trait]
pub trait WorkUnitStrategy: Send {
    fn kind(&self) -> JobKind;

    /// Where the browser goes before the manual checkpoint.
    fn entry_url(&self) -> &str;

    /// Column order of the result file.
    fn schema(&self) -> Vec<String>;

    async fn prepare(
        &mut self,
        session: &mut dyn BrowserSession,
    ) -> Result<Preparation, SessionError>;

    /// Pages are numbered from 1.
    async fn discover_items(
        &mut self,
        session: &mut dyn BrowserSession,
        page: u32,
    ) -> Result<PageItems, SessionError>;

    async fn process_item(
        &mut self,
        session: &mut dyn BrowserSession,
        item: &WorkItem,
    ) -> Result<ItemOutcome, SessionError>;

    /// Pause between processed items.
    fn pacing(&self) -> Option<Duration> {
        None
    }
}
