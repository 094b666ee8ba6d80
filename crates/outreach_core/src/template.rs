//! Message templates grouped by category, and the per-item selection rule.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

/// The only placeholder the renderer understands.
pub const TITLE_PLACEHOLDER: &str = "{title}";

pub const DEFAULT_BODY: &str = "Hello, I would like to get in touch about your listing \"{title}\".";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub category: String,
    pub key: String,
    pub body: String,
}

/// Read-only catalogue of templates for the lifetime of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateStore {
    categories: BTreeMap<String, BTreeMap<String, String>>,
    default_body: String,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new(DEFAULT_BODY)
    }
}

impl TemplateStore {
    pub fn new(default_body: impl Into<String>) -> Self {
        Self {
            categories: BTreeMap::new(),
            default_body: default_body.into(),
        }
    }

    /// Built-in catalogue used when the configuration brings none of its own.
    pub fn builtin() -> Self {
        let mut store = Self::default();
        store.insert(
            "SALE",
            "template1",
            "Hello, your listing \"{title}\" could fit buyers in our portfolio. \
             I can help speed up the sale if you like.",
        );
        store.insert(
            "SALE",
            "template2",
            "Hello, I looked at your listing \"{title}\". We have buyers interested \
             in similar properties. Shall we talk?",
        );
        store.insert(
            "SALE",
            "template3",
            "Hello, \"{title}\" caught my attention. How can I help with your sale?",
        );
        store.insert(
            "RENT",
            "template1",
            "Hello, your rental listing \"{title}\" caught my attention. \
             Would you like help finding a tenant quickly?",
        );
        store.insert(
            "RENT",
            "template2",
            "Hello, I saw \"{title}\". We have clients looking for a place like yours.",
        );
        store.insert(
            "RENT",
            "template3",
            "Hello, we have potential tenants for \"{title}\". Shall we talk?",
        );
        store
    }

    pub fn insert(
        &mut self,
        category: &str,
        key: impl Into<String>,
        body: impl Into<String>,
    ) {
        self.categories
            .entry(normalize_category(category))
            .or_default()
            .insert(key.into(), body.into());
    }

    pub fn get(&self, category: &str, key: &str) -> Option<&str> {
        self.categories
            .get(&normalize_category(category))
            .and_then(|templates| templates.get(key))
            .map(String::as_str)
    }

    pub fn default_body(&self) -> &str {
        &self.default_body
    }

    pub fn templates(&self) -> impl Iterator<Item = Template> + '_ {
        self.categories.iter().flat_map(|(category, templates)| {
            templates.iter().map(move |(key, body)| Template {
                category: category.clone(),
                key: key.clone(),
                body: body.clone(),
            })
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomTemplate {
    pub body: String,
    pub in_use: bool,
}

/// What the caller picked for a job: a custom override and/or template keys per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateSelection {
    custom: Option<CustomTemplate>,
    selected: BTreeMap<String, Vec<String>>,
}

impl TemplateSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_custom(mut self, body: impl Into<String>, in_use: bool) -> Self {
        self.custom = Some(CustomTemplate {
            body: body.into(),
            in_use,
        });
        self
    }

    pub fn with_keys<I, S>(mut self, category: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected
            .entry(normalize_category(category))
            .or_default()
            .extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn custom(&self) -> Option<&CustomTemplate> {
        self.custom.as_ref()
    }

    pub fn keys_for(&self, category: &str) -> &[String] {
        self.selected
            .get(&normalize_category(category))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateChoice<'a> {
    Custom(&'a str),
    Selected { key: &'a str, body: &'a str },
    Default(&'a str),
}

impl<'a> TemplateChoice<'a> {
    pub fn body(&self) -> &'a str {
        match *self {
            TemplateChoice::Custom(body) | TemplateChoice::Default(body) => body,
            TemplateChoice::Selected { body, .. } => body,
        }
    }

    /// Short label recorded next to each sent message.
    pub fn label(&self) -> &'a str {
        match *self {
            TemplateChoice::Custom(_) => "custom",
            TemplateChoice::Selected { key, .. } => key,
            TemplateChoice::Default(_) => "default",
        }
    }
}

/// Picks the template for one item.
///
/// An in-use custom override wins outright. Otherwise one of the category's
/// selected keys is drawn uniformly; keys missing from the store are skipped.
/// With nothing usable the store's default body is returned.
pub fn choose<'a, R>(
    store: &'a TemplateStore,
    selection: &'a TemplateSelection,
    category: &str,
    rng: &mut R,
) -> TemplateChoice<'a>
where
    R: Rng + ?Sized,
{
    if let Some(custom) = selection.custom().filter(|custom| custom.in_use) {
        return TemplateChoice::Custom(&custom.body);
    }

    let candidates: Vec<(&'a str, &'a str)> = selection
        .keys_for(category)
        .iter()
        .filter_map(|key| store.get(category, key).map(|body| (key.as_str(), body)))
        .collect();

    match candidates.choose(rng) {
        Some(&(key, body)) => TemplateChoice::Selected { key, body },
        None => TemplateChoice::Default(store.default_body()),
    }
}

/// Substitutes the title placeholder. Anything else in braces stays as written.
pub fn render(body: &str, title: &str) -> String {
    body.replace(TITLE_PLACEHOLDER, title)
}

pub fn normalize_category(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::{normalize_category, render};

    #[test]
    fn unknown_placeholders_survive_rendering() {
        assert_eq!(
            render("Hi {name}, about {title}", "Flat 3"),
            "Hi {name}, about Flat 3"
        );
    }

    #[test]
    fn categories_are_case_and_space_insensitive() {
        assert_eq!(normalize_category("  sale "), "SALE");
    }
}
