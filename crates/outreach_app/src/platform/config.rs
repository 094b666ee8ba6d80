//! RON configuration for the outreach binary.
//!
//! Every field is optional; anything left out falls back to the engine's
//! defaults. A missing file is not an error.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use outreach_core::template::DEFAULT_BODY;
use outreach_core::{TemplateSelection, TemplateStore};
use outreach_engine::{
    CollectionProfile, EngineSettings, FieldSpec, FieldTransform, MessagingProfile,
    WebDriverSettings,
};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub log_to_terminal: Option<bool>,
    pub engine: EngineSection,
    pub webdriver: WebDriverSection,
    pub collection: Option<CollectionSection>,
    pub messaging: MessagingSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub control_poll_ms: Option<u64>,
    pub discovery_attempts: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub checkpoint_timeout_secs: Option<u64>,
    pub log_tail: Option<usize>,
    pub write_summary: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebDriverSection {
    pub endpoint: Option<String>,
    pub headless: Option<bool>,
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub enum TransformName {
    #[default]
    Trim,
    SingleLine,
    LastToken,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldSection {
    pub name: String,
    pub selector: String,
    #[serde(default)]
    pub transform: TransformName,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionSection {
    pub entry_url: String,
    pub listing_url: String,
    #[serde(default = "default_page_param")]
    pub page_param: String,
    pub item_link_selector: String,
    pub page_link_selector: String,
    #[serde(default = "default_page_attribute")]
    pub page_number_attribute: String,
    #[serde(default)]
    pub total_items_selector: Option<String>,
    pub detail_ready_selector: String,
    pub fields: Vec<FieldSection>,
    pub identity_field: String,
    pub title_field: String,
    #[serde(default)]
    pub identity_pattern: Option<String>,
    #[serde(default = "default_link_field")]
    pub link_field: String,
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    #[serde(default)]
    pub settle_delay_ms: u64,
    #[serde(default)]
    pub output_name: Option<String>,
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_page_attribute() -> String {
    "data-page".to_string()
}

fn default_link_field() -> String {
    "link".to_string()
}

fn default_wait_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateSection {
    pub category: String,
    pub key: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessagingSection {
    pub contacts_path: Option<PathBuf>,
    pub entry_url: Option<String>,
    pub send_url_template: Option<String>,
    pub input_selector: Option<String>,
    pub send_timeout_secs: Option<u64>,
    pub settle_delay_ms: Option<u64>,
    pub delay_between_messages_secs: Option<u64>,
    pub test_recipient: Option<String>,
    /// Replaces the built-in templates when non-empty.
    pub templates: Vec<TemplateSection>,
    pub default_template: Option<String>,
    /// Template keys per category, e.g. `{"SALE": ["template1"]}`.
    pub selected: BTreeMap<String, Vec<String>>,
    pub custom_template: Option<String>,
    pub use_custom_template: bool,
    pub output_name: Option<String>,
}

/// Reads `path`, or returns the defaults when it does not exist.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    parse_config(&content).with_context(|| format!("parsing config {}", path.display()))
}

pub fn parse_config(content: &str) -> anyhow::Result<AppConfig> {
    Ok(ron::from_str(content)?)
}

impl AppConfig {
    pub fn engine_settings(&self, output_override: Option<PathBuf>) -> EngineSettings {
        let output_dir = output_override
            .or_else(|| self.output_dir.clone())
            .unwrap_or_else(|| EngineSettings::default().output_dir);
        let mut settings = EngineSettings::default_with_output(output_dir);
        let engine = &self.engine;
        if let Some(ms) = engine.control_poll_ms {
            settings.control_poll = Duration::from_millis(ms.max(1));
        }
        if let Some(attempts) = engine.discovery_attempts {
            settings.discovery_attempts = attempts.max(1);
        }
        if let Some(ms) = engine.retry_backoff_ms {
            settings.retry_backoff = Duration::from_millis(ms);
        }
        if let Some(secs) = engine.checkpoint_timeout_secs {
            settings.checkpoint_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(lines) = engine.log_tail {
            settings.log_tail = lines;
        }
        if let Some(write) = engine.write_summary {
            settings.write_summary = write;
        }
        settings
    }

    pub fn webdriver_settings(&self, endpoint: Option<String>, headless: bool) -> WebDriverSettings {
        let defaults = WebDriverSettings::default();
        WebDriverSettings {
            endpoint: endpoint
                .or_else(|| self.webdriver.endpoint.clone())
                .unwrap_or(defaults.endpoint),
            headless: headless || self.webdriver.headless.unwrap_or(defaults.headless),
            extra_args: self.webdriver.extra_args.clone(),
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("logs"))
    }

    pub fn collection_profile(
        &self,
        listing_url: Option<String>,
        output_name: Option<String>,
    ) -> anyhow::Result<CollectionProfile> {
        let section = self
            .collection
            .as_ref()
            .ok_or_else(|| anyhow!("the config has no `collection` section"))?;
        Ok(CollectionProfile {
            entry_url: section.entry_url.clone(),
            listing_url: listing_url.unwrap_or_else(|| section.listing_url.clone()),
            page_param: section.page_param.clone(),
            item_link_selector: section.item_link_selector.clone(),
            page_link_selector: section.page_link_selector.clone(),
            page_number_attribute: section.page_number_attribute.clone(),
            total_items_selector: section.total_items_selector.clone(),
            detail_ready_selector: section.detail_ready_selector.clone(),
            fields: section
                .fields
                .iter()
                .map(|field| {
                    FieldSpec::new(field.name.clone(), field.selector.clone())
                        .with_transform(field.transform.into())
                })
                .collect(),
            identity_field: section.identity_field.clone(),
            title_field: section.title_field.clone(),
            identity_pattern: section.identity_pattern.clone(),
            link_field: section.link_field.clone(),
            wait_timeout: Duration::from_secs(section.wait_timeout_secs),
            settle_delay: Duration::from_millis(section.settle_delay_ms),
            output_name: output_name.or_else(|| section.output_name.clone()),
        })
    }

    pub fn messaging_profile(
        &self,
        contacts: Option<PathBuf>,
        test_recipient: Option<String>,
        output_name: Option<String>,
    ) -> anyhow::Result<MessagingProfile> {
        let section = &self.messaging;
        let contacts_path = contacts
            .or_else(|| section.contacts_path.clone())
            .ok_or_else(|| anyhow!("no contacts file given (use --contacts or `contacts_path`)"))?;

        let mut profile = MessagingProfile::new(contacts_path);
        if let Some(url) = &section.entry_url {
            profile.entry_url = url.clone();
        }
        if let Some(template) = &section.send_url_template {
            profile.send_url_template = template.clone();
        }
        if let Some(selector) = &section.input_selector {
            profile.input_selector = selector.clone();
        }
        if let Some(secs) = section.send_timeout_secs {
            profile.send_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = section.settle_delay_ms {
            profile.settle_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = section.delay_between_messages_secs {
            profile.delay_between_messages = Duration::from_secs(secs);
        }
        profile.test_recipient = test_recipient
            .or_else(|| section.test_recipient.clone())
            .filter(|recipient| !recipient.trim().is_empty());

        if !section.templates.is_empty() || section.default_template.is_some() {
            let default_body = section
                .default_template
                .clone()
                .unwrap_or_else(|| DEFAULT_BODY.to_string());
            let mut store = TemplateStore::new(default_body);
            if section.templates.is_empty() {
                for template in TemplateStore::builtin().templates() {
                    store.insert(&template.category, template.key, template.body);
                }
            }
            for template in &section.templates {
                store.insert(&template.category, template.key.clone(), template.body.clone());
            }
            profile.templates = store;
        }

        let mut selection = TemplateSelection::new();
        for (category, keys) in &section.selected {
            selection = selection.with_keys(category, keys.iter().cloned());
        }
        if let Some(body) = &section.custom_template {
            selection = selection.with_custom(body.clone(), section.use_custom_template);
        }
        profile.selection = selection;
        profile.output_name = output_name.or_else(|| section.output_name.clone());
        Ok(profile)
    }
}

impl From<TransformName> for FieldTransform {
    fn from(name: TransformName) -> Self {
        match name {
            TransformName::Trim => FieldTransform::Trim,
            TransformName::SingleLine => FieldTransform::SingleLine,
            TransformName::LastToken => FieldTransform::LastToken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_config_uses_engine_defaults() {
        let config = parse_config("()").unwrap();
        let settings = config.engine_settings(None);
        assert_eq!(settings.output_dir, PathBuf::from("output"));
        assert_eq!(settings.control_poll, Duration::from_millis(100));
        assert_eq!(settings.checkpoint_timeout, None);

        let webdriver = config.webdriver_settings(None, false);
        assert_eq!(webdriver.endpoint, "http://localhost:4444");
        assert!(!webdriver.headless);
        assert!(config.collection_profile(None, None).is_err());
    }

    #[test]
    fn messaging_section_overrides_profile_defaults() {
        let config = parse_config(
            r#"(
                output_dir: Some("out"),
                engine: (checkpoint_timeout_secs: Some(600), discovery_attempts: Some(0)),
                messaging: (
                    contacts_path: Some("contacts.csv"),
                    delay_between_messages_secs: Some(2),
                    templates: [(category: "sale", key: "a", body: "Hi {title}")],
                    selected: {"SALE": ["a"]},
                    custom_template: Some("Custom {title}"),
                ),
            )"#,
        )
        .unwrap();

        let settings = config.engine_settings(Some(PathBuf::from("cli-out")));
        assert_eq!(settings.output_dir, PathBuf::from("cli-out"));
        assert_eq!(settings.checkpoint_timeout, Some(Duration::from_secs(600)));
        assert_eq!(settings.discovery_attempts, 1);

        let profile = config
            .messaging_profile(None, Some("5550001122".to_string()), None)
            .unwrap();
        assert_eq!(profile.contacts_path, PathBuf::from("contacts.csv"));
        assert_eq!(profile.delay_between_messages, Duration::from_secs(2));
        assert_eq!(profile.test_recipient.as_deref(), Some("5550001122"));
        assert_eq!(profile.templates.get("SALE", "a"), Some("Hi {title}"));
        assert_eq!(profile.selection.keys_for("sale"), ["a".to_string()]);
        assert!(!profile.selection.custom().unwrap().in_use);
    }

    #[test]
    fn collection_section_maps_fields() {
        let config = parse_config(
            r#"(
                collection: Some((
                    entry_url: "https://agency.test/login",
                    listing_url: "https://agency.test/list?x=1",
                    item_link_selector: "a.detail",
                    page_link_selector: "a.page-link[data-page]",
                    detail_ready_selector: "p.description",
                    fields: [
                        (name: "title", selector: "p.description"),
                        (name: "date", selector: ".date", transform: LastToken),
                    ],
                    identity_field: "title",
                    title_field: "title",
                )),
            )"#,
        )
        .unwrap();

        let profile = config
            .collection_profile(Some("https://agency.test/other".to_string()), None)
            .unwrap();
        assert_eq!(profile.listing_url, "https://agency.test/other");
        assert_eq!(profile.page_param, "page");
        assert_eq!(profile.fields[1].transform, FieldTransform::LastToken);
        assert_eq!(profile.wait_timeout, Duration::from_secs(10));
    }
}
