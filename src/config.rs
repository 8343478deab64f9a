//! Configuration management for the BDRC book preprocessor

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

/// Constant item properties
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ItemConfig {
    /// Regex whose first capture group is the BDRC book id
    pub id_pattern: String,
    pub mediatype: String,
    pub contributor: String,
    pub sponsor: String,
    pub min_images: usize,
}

/// Paths of per-item source files, relative to the book directory.
/// `{id}` is replaced by the book id.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourcesConfig {
    pub legacy_template: String,
    pub catalog_template: String,
    pub supplementary_template: String,
}

/// Items tagged into a partner collection by book id or publisher
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AffiliationConfig {
    pub collection: String,
    pub identifier_prefixes: Vec<String>,
    /// Matched case-insensitively anywhere in the publisher
    pub publisher_keywords: Vec<String>,
}

/// BookReader default mode for landscape scans
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LayoutConfig {
    /// Zero-based index of the image judged (the first two are cover sheets)
    pub representative_image: usize,
    pub landscape_ratio: f64,
    pub landscape_mode: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub item: ItemConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub affiliation: AffiliationConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Layer on the environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add environment variables (with prefix BDRC_, e.g. BDRC_LAYOUT__LANDSCAPE_RATIO)
            .add_source(
                Environment::with_prefix("BDRC")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("affiliation.identifier_prefixes")
                    .with_list_parse_key("affiliation.publisher_keywords")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for ItemConfig {
    fn default() -> Self {
        Self {
            id_pattern: r"^bdrc-(.+)".to_string(),
            mediatype: "texts".to_string(),
            contributor: "Buddhist Digital Resource Center".to_string(),
            sponsor: "Buddhist Digital Resource Center".to_string(),
            min_images: 3,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            legacy_template: "meta/{id}.xml".to_string(),
            catalog_template: "meta/marc-{id}.xml".to_string(),
            supplementary_template: "{id}.json".to_string(),
        }
    }
}

impl Default for AffiliationConfig {
    fn default() -> Self {
        Self {
            collection: "bdrc-fplmanuscripts".to_string(),
            identifier_prefixes: vec!["W1FPL".to_string(), "W1EAP".to_string()],
            publisher_keywords: vec![
                "fragile palm leaves".to_string(),
                "endangered archives programme".to_string(),
            ],
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            representative_image: 2,
            landscape_ratio: 1.25,
            landscape_mode: "mode/1up".to_string(),
        }
    }
}
