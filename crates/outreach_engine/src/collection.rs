use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use outreach_core::JobKind;
use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;
use tokio::time::sleep;
use url::Url;

use crate::session::{BrowserSession, SessionError};
use crate::strategy::WorkUnitStrategy;
use crate::types::{
    ItemFailure, ItemFailureKind, ItemOutcome, PageItems, Preparation, Record, WorkItem,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldTransform {
    #[default]
    Trim,
    /// Newlines collapse into single spaces.
    SingleLine,
    /// Keeps only the last whitespace-separated token, e.g. a trailing date.
    LastToken,
}

impl FieldTransform {
    pub fn apply(self, raw: &str) -> String {
        match self {
            FieldTransform::Trim => raw.trim().to_string(),
            FieldTransform::SingleLine => raw.split_whitespace().collect::<Vec<_>>().join(" "),
            FieldTransform::LastToken => raw.split_whitespace().last().unwrap_or("").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub selector: String,
    pub transform: FieldTransform,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: selector.into(),
            transform: FieldTransform::Trim,
        }
    }

    pub fn with_transform(mut self, transform: FieldTransform) -> Self {
        self.transform = transform;
        self
    }
}

/// Site description for a collection job.
#[derive(Debug, Clone)]
pub struct CollectionProfile {
    /// Opened before the checkpoint so the operator can log in.
    pub entry_url: String,
    pub listing_url: String,
    pub page_param: String,
    pub item_link_selector: String,
    pub page_link_selector: String,
    pub page_number_attribute: String,
    pub total_items_selector: Option<String>,
    /// Present on a detail page once it has rendered.
    pub detail_ready_selector: String,
    pub fields: Vec<FieldSpec>,
    pub identity_field: String,
    pub title_field: String,
    /// Searched in the page source when the identity selector comes up empty.
    pub identity_pattern: Option<String>,
    pub link_field: String,
    pub wait_timeout: Duration,
    pub settle_delay: Duration,
    pub output_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("invalid url `{url}`: {source}")]
    InvalidUrl { url: String, source: url::ParseError },
    #[error("invalid css selector `{0}`")]
    InvalidSelector(String),
    #[error("invalid identity pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("field `{0}` is not defined in the profile")]
    UnknownField(String),
}

pub struct CollectionStrategy {
    profile: CollectionProfile,
    listing: Url,
    item_links: Selector,
    page_links: Selector,
    identity_pattern: Option<Regex>,
    /// Listing page the browser currently shows, if any.
    positioned_on: Option<u32>,
}

impl CollectionStrategy {
    pub fn new(profile: CollectionProfile) -> Result<Self, ProfileError> {
        let listing = Url::parse(&profile.listing_url).map_err(|source| ProfileError::InvalidUrl {
            url: profile.listing_url.clone(),
            source,
        })?;
        let item_links = parse_selector(&profile.item_link_selector)?;
        let page_links = parse_selector(&profile.page_link_selector)?;
        for field in &profile.fields {
            parse_selector(&field.selector)?;
        }
        for required in [&profile.identity_field, &profile.title_field] {
            if !profile.fields.iter().any(|field| &field.name == required) {
                return Err(ProfileError::UnknownField(required.clone()));
            }
        }
        let identity_pattern = profile
            .identity_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()?;

        Ok(Self {
            profile,
            listing,
            item_links,
            page_links,
            identity_pattern,
            positioned_on: None,
        })
    }

    pub fn page_url(&self, page: u32) -> String {
        let mut url = self.listing.clone();
        url.query_pairs_mut()
            .append_pair(&self.profile.page_param, &page.to_string());
        url.into()
    }

    async fn open_listing(
        &mut self,
        session: &mut dyn BrowserSession,
        page: u32,
    ) -> Result<String, SessionError> {
        if self.positioned_on != Some(page) {
            session.navigate(&self.page_url(page)).await?;
        }
        // An empty listing page never shows an item link; the source decides.
        match session
            .wait_for_element(&self.profile.item_link_selector, self.profile.wait_timeout)
            .await
        {
            Ok(()) | Err(SessionError::Timeout { .. }) => {}
            Err(err) => return Err(err),
        }
        if !self.profile.settle_delay.is_zero() {
            sleep(self.profile.settle_delay).await;
        }
        let source = session.page_source().await?;
        self.positioned_on = Some(page);
        Ok(source)
    }

    fn identity_from_source(&self, source: &str) -> Option<String> {
        let found = self.identity_pattern.as_ref()?.find(source)?;
        Some(found.as_str().split_whitespace().collect())
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ProfileError> {
    Selector::parse(selector).map_err(|_| ProfileError::InvalidSelector(selector.to_string()))
}

/// Absolute, de-duplicated item links in document order.
pub fn extract_item_links(html: &str, selector: &Selector, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    document
        .select(selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_url(href, base))
        .map(String::from)
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Highest numeric value of `attribute` among matching elements, or 0.
pub fn extract_page_count(html: &str, selector: &Selector, attribute: &str) -> u32 {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .filter_map(|element| element.value().attr(attribute))
        .filter_map(|value| value.trim().parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

fn parse_count(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn resolve_url(reference: &str, base: &Url) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url);
    }
    base.join(trimmed).ok()
}

fn recoverable(err: SessionError, context: &str) -> Result<ItemOutcome, SessionError> {
    if err.is_fatal() {
        return Err(err);
    }
    Ok(ItemOutcome::RecoverableFailure(ItemFailure::new(
        ItemFailureKind::Extraction,
        format!("{context}: {err}"),
    )))
}

#[async_trait]
impl WorkUnitStrategy for CollectionStrategy {
    fn kind(&self) -> JobKind {
        JobKind::Collection
    }

    fn entry_url(&self) -> &str {
        &self.profile.entry_url
    }

    fn schema(&self) -> Vec<String> {
        let mut columns: Vec<String> = self
            .profile
            .fields
            .iter()
            .map(|field| field.name.clone())
            .collect();
        if !columns.contains(&self.profile.link_field) {
            columns.push(self.profile.link_field.clone());
        }
        columns
    }

    async fn prepare(
        &mut self,
        session: &mut dyn BrowserSession,
    ) -> Result<Preparation, SessionError> {
        let source = self.open_listing(session, 1).await?;
        let pages_total = extract_page_count(
            &source,
            &self.page_links,
            &self.profile.page_number_attribute,
        );
        let items_total = match self.profile.total_items_selector.clone() {
            Some(selector) => session
                .find_text(&selector)
                .await?
                .as_deref()
                .and_then(parse_count),
            None => None,
        };
        Ok(Preparation {
            pages_total,
            items_total,
        })
    }

    async fn discover_items(
        &mut self,
        session: &mut dyn BrowserSession,
        page: u32,
    ) -> Result<PageItems, SessionError> {
        let source = self.open_listing(session, page).await?;
        let links = extract_item_links(&source, &self.item_links, &self.listing);
        Ok(PageItems::Items(links.into_iter().map(WorkItem::new).collect()))
    }

    async fn process_item(
        &mut self,
        session: &mut dyn BrowserSession,
        item: &WorkItem,
    ) -> Result<ItemOutcome, SessionError> {
        self.positioned_on = None;
        if let Err(err) = session.navigate(&item.key).await {
            return recoverable(err, "cannot open detail page");
        }
        if let Err(err) = session
            .wait_for_element(&self.profile.detail_ready_selector, self.profile.wait_timeout)
            .await
        {
            return recoverable(err, "detail page did not render");
        }

        let mut record = Record::new();
        for field in &self.profile.fields {
            let raw = match session.find_text(&field.selector).await {
                Ok(text) => text.unwrap_or_default(),
                Err(err) if err.is_fatal() => return Err(err),
                Err(_) => String::new(),
            };
            record.insert(field.name.clone(), field.transform.apply(&raw));
        }

        let identity = &self.profile.identity_field;
        if record.get(identity).unwrap_or("").is_empty() && self.identity_pattern.is_some() {
            let source = match session.page_source().await {
                Ok(source) => source,
                Err(err) => return recoverable(err, "cannot read page source"),
            };
            if let Some(found) = self.identity_from_source(&source) {
                record.insert(identity.clone(), found);
            }
        }
        if record.get(identity).unwrap_or("").is_empty() {
            return Ok(ItemOutcome::Reject(format!("no {identity} found")));
        }
        if record.get(&self.profile.title_field).unwrap_or("").is_empty() {
            return Ok(ItemOutcome::Reject(format!(
                "no {} found",
                self.profile.title_field
            )));
        }

        record.insert(self.profile.link_field.clone(), item.key.clone());
        Ok(ItemOutcome::Accept(record))
    }
}
