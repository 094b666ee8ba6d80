use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use outreach_core::template::{choose, render};
use outreach_core::{normalize_phone, JobKind, TemplateSelection, TemplateStore};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::sleep;
use url::form_urlencoded;

use crate::contacts::{load_contacts, Contact, ContactColumns, ContactsError};
use crate::session::{BrowserSession, SessionError, SUBMIT_KEY};
use crate::strategy::WorkUnitStrategy;
use crate::types::{
    ItemFailure, ItemFailureKind, ItemOutcome, PageItems, Preparation, Record, WorkItem,
};

pub const PHONE_PLACEHOLDER: &str = "{phone}";
pub const TEXT_PLACEHOLDER: &str = "{text}";

const TITLE: &str = "title";
const CATEGORY: &str = "category";

#[derive(Debug, Clone)]
pub struct MessagingProfile {
    pub contacts_path: PathBuf,
    pub columns: ContactColumns,
    pub entry_url: String,
    /// Contains `{phone}` and `{text}`; the text is form-encoded.
    pub send_url_template: String,
    pub input_selector: String,
    pub send_timeout: Duration,
    pub settle_delay: Duration,
    pub delay_between_messages: Duration,
    /// When set, every message goes here instead of the contact's own number.
    pub test_recipient: Option<String>,
    pub templates: TemplateStore,
    pub selection: TemplateSelection,
    pub output_name: Option<String>,
}

impl MessagingProfile {
    pub fn new(contacts_path: impl Into<PathBuf>) -> Self {
        Self {
            contacts_path: contacts_path.into(),
            columns: ContactColumns::default(),
            entry_url: "https://web.whatsapp.com".to_string(),
            send_url_template: "https://web.whatsapp.com/send?phone={phone}&text={text}"
                .to_string(),
            input_selector: r#"div[contenteditable="true"][data-tab="10"]"#.to_string(),
            send_timeout: Duration::from_secs(20),
            settle_delay: Duration::from_secs(1),
            delay_between_messages: Duration::from_secs(5),
            test_recipient: None,
            templates: TemplateStore::builtin(),
            selection: TemplateSelection::new(),
            output_name: None,
        }
    }
}

pub struct MessagingStrategy {
    profile: MessagingProfile,
    contacts: Vec<Contact>,
    rng: StdRng,
}

impl MessagingStrategy {
    pub fn new(profile: MessagingProfile, contacts: Vec<Contact>) -> Self {
        Self {
            profile,
            contacts,
            rng: StdRng::from_entropy(),
        }
    }

    /// Loads the contacts named by the profile.
    pub fn from_profile(profile: MessagingProfile) -> Result<Self, ContactsError> {
        let contacts = load_contacts(&profile.contacts_path, &profile.columns)?;
        Ok(Self::new(profile, contacts))
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn send_url(&self, destination: &str, text: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(text.as_bytes()).collect();
        self.profile
            .send_url_template
            .replace(PHONE_PLACEHOLDER, destination)
            .replace(TEXT_PLACEHOLDER, &encoded)
    }

    async fn settle(&self) {
        if !self.profile.settle_delay.is_zero() {
            sleep(self.profile.settle_delay).await;
        }
    }
}

fn send_failure(err: SessionError, context: &str) -> Result<ItemOutcome, SessionError> {
    if err.is_fatal() {
        return Err(err);
    }
    Ok(ItemOutcome::RecoverableFailure(ItemFailure::new(
        ItemFailureKind::Send,
        format!("{context}: {err}"),
    )))
}

#[async_trait]
impl WorkUnitStrategy for MessagingStrategy {
    fn kind(&self) -> JobKind {
        JobKind::Messaging
    }

    fn entry_url(&self) -> &str {
        &self.profile.entry_url
    }

    fn schema(&self) -> Vec<String> {
        ["phone", TITLE, CATEGORY, "template", "destination", "sent_at"]
            .iter()
            .map(|column| column.to_string())
            .collect()
    }

    async fn prepare(
        &mut self,
        _session: &mut dyn BrowserSession,
    ) -> Result<Preparation, SessionError> {
        let distinct: HashSet<String> = self
            .contacts
            .iter()
            .map(|contact| normalize_phone(&contact.phone))
            .filter(|phone| !phone.is_empty())
            .collect();
        Ok(Preparation {
            pages_total: 1,
            items_total: Some(distinct.len() as u64),
        })
    }

    async fn discover_items(
        &mut self,
        _session: &mut dyn BrowserSession,
        page: u32,
    ) -> Result<PageItems, SessionError> {
        if page > 1 {
            return Ok(PageItems::Exhausted);
        }
        Ok(PageItems::Items(
            self.contacts
                .iter()
                .map(|contact| {
                    WorkItem::new(normalize_phone(&contact.phone))
                        .with_field(TITLE, contact.title.clone())
                        .with_field(CATEGORY, contact.category.clone())
                })
                .collect(),
        ))
    }

    async fn process_item(
        &mut self,
        session: &mut dyn BrowserSession,
        item: &WorkItem,
    ) -> Result<ItemOutcome, SessionError> {
        let title = item.field(TITLE);
        let category = item.field(CATEGORY);
        let (label, text) = {
            let choice = choose(
                &self.profile.templates,
                &self.profile.selection,
                category,
                &mut self.rng,
            );
            (choice.label().to_string(), render(choice.body(), title))
        };
        let destination = match self.profile.test_recipient.as_deref() {
            Some(recipient) => normalize_phone(recipient),
            None => item.key.clone(),
        };

        let url = self.send_url(&destination, &text);
        if let Err(err) = session.navigate(&url).await {
            return send_failure(err, "cannot open chat");
        }
        if let Err(err) = session
            .wait_for_element(&self.profile.input_selector, self.profile.send_timeout)
            .await
        {
            return send_failure(err, "message box did not appear");
        }
        if let Err(err) = session.click(&self.profile.input_selector).await {
            return send_failure(err, "cannot focus message box");
        }
        self.settle().await;
        if let Err(err) = session
            .type_text(&self.profile.input_selector, SUBMIT_KEY)
            .await
        {
            return send_failure(err, "cannot submit message");
        }
        self.settle().await;

        Ok(ItemOutcome::Accept(
            Record::new()
                .with("phone", item.key.clone())
                .with(TITLE, title)
                .with(CATEGORY, category)
                .with("template", label)
                .with("destination", destination)
                .with("sent_at", Utc::now().to_rfc3339()),
        ))
    }

    fn pacing(&self) -> Option<Duration> {
        Some(self.profile.delay_between_messages).filter(|delay| !delay.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_url_encodes_message_text() {
        let strategy = MessagingStrategy::new(MessagingProfile::new("contacts.csv"), Vec::new());
        assert_eq!(
            strategy.send_url("905551112233", "Hi \"Flat & garden\""),
            "https://web.whatsapp.com/send?phone=905551112233&text=Hi+%22Flat+%26+garden%22"
        );
    }
}
