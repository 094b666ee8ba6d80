#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use outreach_core::{JobKind, JobState};
use outreach_engine::{
    BrowserSession, EngineSettings, ItemOutcome, JobController, PageItems, Preparation, Record,
    SessionError, SessionFactory, WorkItem, WorkUnitStrategy,
};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

pub fn fast_settings(output_dir: &Path) -> EngineSettings {
    EngineSettings {
        control_poll: Duration::from_millis(5),
        retry_backoff: Duration::from_millis(5),
        ..EngineSettings::default_with_output(output_dir)
    }
}

/// A canned page: its source plus the text of every selector that exists on it.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub source: String,
    pub texts: BTreeMap<String, String>,
}

impl FakePage {
    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            texts: BTreeMap::new(),
        }
    }

    pub fn text(mut self, selector: &str, text: &str) -> Self {
        self.texts.insert(selector.to_string(), text.to_string());
        self
    }
}

/// Shared record of everything fake sessions were asked to do.
#[derive(Debug, Default)]
pub struct BrowserLog {
    pub actions: Mutex<Vec<String>>,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

impl BrowserLog {
    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    fn push(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }
}

pub struct FakeSession {
    pages: BTreeMap<String, FakePage>,
    /// Served for any url without a canned page.
    fallback: Option<FakePage>,
    current: Option<FakePage>,
    log: Arc<BrowserLog>,
}

impl FakeSession {
    pub fn new(log: Arc<BrowserLog>) -> Self {
        Self {
            pages: BTreeMap::new(),
            fallback: None,
            current: None,
            log,
        }
    }

    pub fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    pub fn fallback(mut self, page: FakePage) -> Self {
        self.fallback = Some(page);
        self
    }

    fn has(&self, selector: &str) -> bool {
        self.current
            .as_ref()
            .is_some_and(|page| page.texts.contains_key(selector))
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.log.push(format!("goto {url}"));
        match self.pages.get(url).or(self.fallback.as_ref()) {
            Some(page) => {
                self.current = Some(page.clone());
                Ok(())
            }
            None => Err(SessionError::Command(format!("no route to {url}"))),
        }
    }

    async fn wait_for_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        if self.has(selector) {
            Ok(())
        } else {
            Err(SessionError::Timeout {
                selector: selector.to_string(),
                waited: timeout,
            })
        }
    }

    async fn find_text(&mut self, selector: &str) -> Result<Option<String>, SessionError> {
        Ok(self
            .current
            .as_ref()
            .and_then(|page| page.texts.get(selector).cloned()))
    }

    async fn click(&mut self, selector: &str) -> Result<(), SessionError> {
        if !self.has(selector) {
            return Err(SessionError::NotFound(selector.to_string()));
        }
        self.log.push(format!("click {selector}"));
        Ok(())
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<(), SessionError> {
        if !self.has(selector) {
            return Err(SessionError::NotFound(selector.to_string()));
        }
        self.log.push(format!("type {selector} {text:?}"));
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, SessionError> {
        Ok(self
            .current
            .as_ref()
            .map(|page| page.source.clone())
            .unwrap_or_default())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.log.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out sessions that accept every navigation.
pub struct FakeFactory {
    pub log: Arc<BrowserLog>,
    pub unavailable: bool,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self {
            log: Arc::new(BrowserLog::default()),
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, SessionError> {
        if self.unavailable {
            return Err(SessionError::Unavailable("webdriver refused connection".into()));
        }
        self.log.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(
            FakeSession::new(Arc::clone(&self.log)).fallback(FakePage::default()),
        ))
    }
}

/// Strategy driven by a fixed list of pages of item keys.
pub struct ScriptedStrategy {
    pub pages: Vec<Vec<String>>,
    pub items_total: Option<u64>,
    pub item_delay: Duration,
    pub pacing: Option<Duration>,
    pub fatal_on: Option<String>,
    pub reject: Vec<String>,
    /// Errors handed out by discovery calls before they start succeeding.
    pub discovery_errors: VecDeque<SessionError>,
}

impl ScriptedStrategy {
    pub fn new(pages: &[&[&str]]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|page| page.iter().map(|key| key.to_string()).collect())
                .collect(),
            items_total: None,
            item_delay: Duration::ZERO,
            pacing: None,
            fatal_on: None,
            reject: Vec::new(),
            discovery_errors: VecDeque::new(),
        }
    }

    pub fn item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = delay;
        self
    }

    pub fn pacing(mut self, delay: Duration) -> Self {
        self.pacing = Some(delay);
        self
    }
}

#[async_trait]
impl WorkUnitStrategy for ScriptedStrategy {
    fn kind(&self) -> JobKind {
        JobKind::Collection
    }

    fn entry_url(&self) -> &str {
        "https://fake.test/login"
    }

    fn schema(&self) -> Vec<String> {
        vec!["key".to_string(), "note".to_string()]
    }

    async fn prepare(
        &mut self,
        _session: &mut dyn BrowserSession,
    ) -> Result<Preparation, SessionError> {
        Ok(Preparation {
            pages_total: self.pages.len() as u32,
            items_total: self.items_total,
        })
    }

    async fn discover_items(
        &mut self,
        session: &mut dyn BrowserSession,
        page: u32,
    ) -> Result<PageItems, SessionError> {
        if let Some(err) = self.discovery_errors.pop_front() {
            return Err(err);
        }
        session
            .navigate(&format!("https://fake.test/list?page={page}"))
            .await?;
        Ok(match self.pages.get(page as usize - 1) {
            Some(keys) => PageItems::Items(keys.iter().map(WorkItem::new).collect()),
            None => PageItems::Exhausted,
        })
    }

    async fn process_item(
        &mut self,
        session: &mut dyn BrowserSession,
        item: &WorkItem,
    ) -> Result<ItemOutcome, SessionError> {
        if !self.item_delay.is_zero() {
            tokio::time::sleep(self.item_delay).await;
        }
        if self.fatal_on.as_deref() == Some(item.key.as_str()) {
            return Err(SessionError::Unavailable("browser window closed".into()));
        }
        session
            .navigate(&format!("https://fake.test/item/{}", item.key))
            .await?;
        if self.reject.contains(&item.key) {
            return Ok(ItemOutcome::Reject("no phone".to_string()));
        }
        Ok(ItemOutcome::Accept(
            Record::new()
                .with("key", item.key.clone())
                .with("note", format!("seen {}", item.key)),
        ))
    }

    fn pacing(&self) -> Option<Duration> {
        self.pacing
    }
}

pub fn wait_for_state(controller: &JobController, state: JobState, timeout: Duration) -> bool {
    wait_until(timeout, || controller.state() == state)
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Data rows of a result file, header excluded.
pub fn result_rows(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|row| row.unwrap().iter().map(str::to_string).collect())
        .collect()
}
