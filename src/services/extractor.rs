// src/services/extractor.rs

//! Label-driven field extraction from the notice detail page.
//!
//! Detail pages are laid out as `th`/`td` tables whose header wording varies
//! between notice variants, so every field is looked up through a list of
//! synonym labels (see [`FieldRule`]).

use std::collections::HashMap;

use crate::driver::PageDriver;
use crate::models::{FieldRule, SiteSelectors};
use crate::utils::clean_value;

/// Canonical field key to raw text. An empty value means "looked up, nothing found".
pub type RawFields = HashMap<String, String>;

/// Everything read for one notice before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub fields: RawFields,
    pub attachment_names: Vec<String>,
}

impl RawRecord {
    /// Field text, `""` when the key is absent.
    pub fn get(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }
}

/// Reads detail page fields through a [`PageDriver`].
///
/// Lookup failures never propagate: a label the driver cannot resolve is
/// treated as missing.
pub struct FieldExtractor<'a> {
    rules: &'a [FieldRule],
    selectors: &'a SiteSelectors,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(rules: &'a [FieldRule], selectors: &'a SiteSelectors) -> Self {
        Self { rules, selectors }
    }

    /// Read the detail page and merge it over the list row fields.
    pub async fn extract_all<D>(&self, driver: &D, list_fields: RawFields) -> RawRecord
    where
        D: PageDriver + ?Sized,
    {
        let mut fields = list_fields;
        merge_fields(&mut fields, self.extract_fields(driver).await);

        let title = self.extract_title(driver).await;
        if !title.is_empty() {
            fields.insert("title".to_string(), title);
        }

        RawRecord {
            fields,
            attachment_names: self.extract_attachment_names(driver).await,
        }
    }

    /// Apply every rule. Each key is present in the result.
    pub async fn extract_fields<D>(&self, driver: &D) -> RawFields
    where
        D: PageDriver + ?Sized,
    {
        let mut fields = RawFields::with_capacity(self.rules.len());
        for rule in self.rules {
            let value = self.lookup(driver, rule).await;
            fields.insert(rule.key.clone(), value);
        }
        fields
    }

    /// First label whose value cell is on the page wins.
    async fn lookup<D>(&self, driver: &D, rule: &FieldRule) -> String
    where
        D: PageDriver + ?Sized,
    {
        for label in &rule.labels {
            let locator = self.selectors.field_value(label);
            match driver.is_visible(&locator).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    log::debug!("Label '{}' lookup failed: {}", label, e);
                    continue;
                }
            }
            match driver.text(&locator).await {
                Ok(text) => return clean_value(&text, rule.max_len),
                Err(e) => log::debug!("Label '{}' value unreadable: {}", label, e),
            }
        }
        String::new()
    }

    /// Detail header text with the page boilerplate removed.
    pub async fn extract_title<D>(&self, driver: &D) -> String
    where
        D: PageDriver + ?Sized,
    {
        let header = self.selectors.detail_header();
        if !driver.is_visible(&header).await.unwrap_or(false) {
            return String::new();
        }
        match driver.text(&header).await {
            Ok(text) => text
                .replace(&self.selectors.title_boilerplate, "")
                .trim()
                .to_string(),
            Err(e) => {
                log::debug!("Detail header unreadable: {}", e);
                String::new()
            }
        }
    }

    /// Names of the files linked from the attachment row, in page order.
    pub async fn extract_attachment_names<D>(&self, driver: &D) -> Vec<String>
    where
        D: PageDriver + ?Sized,
    {
        match driver.texts(&self.selectors.attachment_links()).await {
            Ok(names) => names
                .iter()
                .map(|name| name.trim())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) => {
                log::debug!("Attachment lookup failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// Merge freshly read fields into `base`.
///
/// Non-empty values overwrite. Empty values are only recorded for keys `base`
/// does not have yet, so a known value is never blanked.
pub fn merge_fields(base: &mut RawFields, fresh: RawFields) {
    for (key, value) in fresh {
        if !value.is_empty() {
            base.insert(key, value);
        } else {
            base.entry(key).or_default();
        }
    }
}
