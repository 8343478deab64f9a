//! Access restriction rule tables
//!
//! One table per source schema. The two vocabularies are disjoint and every
//! code the upstream systems emit must be listed: an unknown code stops the
//! item instead of falling back to a default classification.

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::{
    error::{AppError, AppResult},
    models::Schema,
};

/// Collection every BDRC item belongs to
pub const BASE_COLLECTION: &str = "buddhist-digital-resource-center";
pub const RESTRICTED_COLLECTION: &str = "buddhist-digital-resource-center-restricted";
pub const LENDING_COLLECTION: &str = "inlibrary";
pub const STREAM_ONLY_COLLECTION: &str = "stream_only";
pub const GEO_RESTRICTED_COLLECTION: &str = "geo_restricted";

/// Legacy code for works that may not be shown in China
pub const RESTRICTED_IN_CHINA: &str = "restrictedInChina";
pub const CHINA_COUNTRY_CODE: &str = "CN";

/// Catalog access note for works restricted to a few sample pages
pub const SAMPLE_PAGES_ONLY: &str = "Access restricted to a few sample pages.";

/// Legacy codes whose items stay visible in search
pub const LEGACY_INDEXED: &[&str] = &["openAccess", "fairUse"];

/// Catalog access notes whose items stay visible in search
pub const CATALOG_INDEXED: &[&str] = &["Open Access."];

/// Restriction code to additional collections, for one schema
#[derive(Debug, Clone)]
pub struct RuleTable {
    schema: Schema,
    rules: IndexMap<&'static str, Vec<&'static str>>,
}

impl RuleTable {
    pub fn new(schema: Schema, rules: &[(&'static str, &[&'static str])]) -> Self {
        Self {
            schema,
            rules: rules.iter().map(|(code, tags)| (*code, tags.to_vec())).collect(),
        }
    }

    /// Collections added for `code` on top of the base collection
    pub fn lookup(&self, code: &str) -> AppResult<&[&'static str]> {
        self.rules
            .get(code)
            .map(Vec::as_slice)
            .ok_or_else(|| AppError::UnrecognizedClassificationCode {
                schema: self.schema,
                code: code.to_string(),
            })
    }

    /// Base collection followed by the additions for `code`
    pub fn collections(&self, code: &str) -> AppResult<Vec<String>> {
        let additions = self.lookup(code)?;
        Ok(std::iter::once(BASE_COLLECTION)
            .chain(additions.iter().copied())
            .map(String::from)
            .collect())
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().copied()
    }
}

/// tbrc.org `archiveInfo/@access` values
pub static LEGACY_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(
        Schema::Legacy,
        &[
            ("openAccess", &[STREAM_ONLY_COLLECTION]),
            ("fairUse", &[RESTRICTED_COLLECTION, LENDING_COLLECTION]),
            ("fairUseNolib", &[RESTRICTED_COLLECTION]),
            ("restrictedSealed", &[RESTRICTED_COLLECTION]),
            ("temporarilyRestricted", &[RESTRICTED_COLLECTION]),
            ("restrictedByQuality", &[RESTRICTED_COLLECTION]),
            ("restrictedByTbrc", &[RESTRICTED_COLLECTION]),
            (RESTRICTED_IN_CHINA, &[GEO_RESTRICTED_COLLECTION]),
            ("restrictedInChinaLib", &[GEO_RESTRICTED_COLLECTION]),
        ],
    )
});

/// BUDA MARCXML 506$a access notes
pub static CATALOG_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(
        Schema::Catalog,
        &[
            ("Access restricted.", &[RESTRICTED_COLLECTION]),
            ("Access restricted in some countries.", &[GEO_RESTRICTED_COLLECTION]),
            ("Open Access.", &[STREAM_ONLY_COLLECTION]),
            (SAMPLE_PAGES_ONLY, &[RESTRICTED_COLLECTION]),
            (
                "Access restricted to a few sample pages, access restricted in some countries.",
                &[GEO_RESTRICTED_COLLECTION],
            ),
        ],
    )
});
