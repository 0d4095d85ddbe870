//! Site profile: URLs, tab keywords, DOM selectors and the header/key map.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::fields::CanonicalField;
use crate::ConfigError;

const DEFAULT_PROFILE_YAML: &str = include_str!("../../../config/site.yaml");

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSynonyms {
    /// Exact (trimmed) table header texts.
    #[serde(default)]
    pub headers: Vec<String>,
    /// JSON object keys, compared lowercased.
    #[serde(default)]
    pub json_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSelectors {
    /// Tag selectors scanned for tab controls, in scan order.
    pub tab_candidates: Vec<String>,
    pub div_rows: String,
    pub list_rows: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedStore {
    pub store_id: String,
    pub name: Option<String>,
    pub prefecture: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    pub base_url: String,
    /// Path template containing `{store_id}`.
    pub store_path: String,
    /// Path template containing `{prefecture}`.
    pub category_path: String,
    pub tab_keywords: Vec<String>,
    pub selectors: SiteSelectors,
    pub fields: BTreeMap<CanonicalField, FieldSynonyms>,
    #[serde(default)]
    pub seed_stores: Vec<SeedStore>,
}

impl SiteProfile {
    /// Content URL for one store.
    #[must_use]
    pub fn store_url(&self, store_id: &str) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.store_path.replace("{store_id}", store_id)
        )
    }

    /// Listing URL for one prefecture's store index.
    #[must_use]
    pub fn category_url(&self, prefecture: &str) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.category_path.replace("{prefecture}", prefecture)
        )
    }
}

/// Load and validate a site profile from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_site_profile(path: &Path) -> Result<SiteProfile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SiteProfileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_site_profile(&content)
}

/// Load the profile at `path`, falling back to the built-in profile when the
/// file does not exist. Other I/O and parse errors are still returned.
///
/// # Errors
///
/// Returns `ConfigError` if an existing file cannot be read or is invalid.
pub fn load_site_profile_or_default(path: &Path) -> Result<SiteProfile, ConfigError> {
    if path.exists() {
        load_site_profile(path)
    } else {
        default_site_profile()
    }
}

/// The profile compiled into the binary.
///
/// # Errors
///
/// Returns `ConfigError` only if the embedded YAML is broken.
pub fn default_site_profile() -> Result<SiteProfile, ConfigError> {
    parse_site_profile(DEFAULT_PROFILE_YAML)
}

fn parse_site_profile(content: &str) -> Result<SiteProfile, ConfigError> {
    let profile: SiteProfile =
        serde_yaml::from_str(content).map_err(ConfigError::SiteProfileParse)?;
    validate_site_profile(&profile)?;
    Ok(profile)
}

fn validate_site_profile(profile: &SiteProfile) -> Result<(), ConfigError> {
    if !profile.base_url.starts_with("http://") && !profile.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "base_url must be http(s); got '{}'",
            profile.base_url
        )));
    }

    if !profile.store_path.contains("{store_id}") {
        return Err(ConfigError::Validation(
            "store_path must contain {store_id}".to_string(),
        ));
    }

    if profile.tab_keywords.iter().any(|k| k.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "tab_keywords must not contain blank entries".to_string(),
        ));
    }

    // A header may only point at one field, otherwise mapping is ambiguous.
    let mut seen_headers = HashSet::new();
    for (field, synonyms) in &profile.fields {
        for header in &synonyms.headers {
            if !seen_headers.insert(header.trim()) {
                return Err(ConfigError::Validation(format!(
                    "header '{header}' is mapped more than once (last: {field})"
                )));
            }
        }
    }

    let mut seen_stores = HashSet::new();
    for seed in &profile.seed_stores {
        if seed.store_id.is_empty() || !seed.store_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Validation(format!(
                "seed store id '{}' must be numeric",
                seed.store_id
            )));
        }
        if !seen_stores.insert(seed.store_id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate seed store id: '{}'",
                seed.store_id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "site_test.rs"]
mod tests;
