use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// WebDriver key code for Enter.
pub const SUBMIT_KEY: &str = "\u{e007}";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The browser is gone or could not be reached. Ends the job.
    #[error("browser session unavailable: {0}")]
    Unavailable(String),
    #[error("timed out after {waited:?} waiting for `{selector}`")]
    Timeout { selector: String, waited: Duration },
    #[error("no element matches `{0}`")]
    NotFound(String),
    #[error("browser command failed: {0}")]
    Command(String),
}

impl SessionError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Unavailable(_))
    }
}

/// A live browser the worker drives. Only the owning worker touches it.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Returns once an element matching `selector` is present.
    async fn wait_for_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), SessionError>;

    /// Trimmed text of the first match, `None` when nothing matches.
    async fn find_text(&mut self, selector: &str) -> Result<Option<String>, SessionError>;

    async fn click(&mut self, selector: &str) -> Result<(), SessionError>;

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<(), SessionError>;

    async fn page_source(&mut self) -> Result<String, SessionError>;

    async fn close(&mut self) -> Result<(), SessionError>;
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, SessionError>;
}

/// Owns the session for the lifetime of a worker and closes it exactly once.
pub struct SessionSlot {
    session: Option<Box<dyn BrowserSession>>,
}

impl SessionSlot {
    pub fn new(session: Box<dyn BrowserSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn get(&mut self) -> Result<&mut dyn BrowserSession, SessionError> {
        match self.session.as_mut() {
            Some(session) => Ok(session.as_mut()),
            None => Err(SessionError::Unavailable("session already released".into())),
        }
    }

    pub fn is_released(&self) -> bool {
        self.session.is_none()
    }

    /// Closes the session. Later calls are no-ops and return `Ok(false)`.
    pub async fn release(&mut self) -> Result<bool, SessionError> {
        match self.session.take() {
            Some(mut session) => session.close().await.map(|()| true),
            None => Ok(false),
        }
    }
}
