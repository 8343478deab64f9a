//! Access restriction signal models

use serde::{Deserialize, Serialize};

/// Source schema supplying the access restriction of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schema {
    /// tbrc.org work records, `archiveInfo/@access`
    Legacy,
    /// BUDA MARCXML records, 506$a access note
    Catalog,
}

impl Schema {
    /// Metadata field carrying this schema's restriction code
    pub fn field(&self) -> &'static str {
        match self {
            Schema::Legacy => "access_restriction",
            Schema::Catalog => "marc_506a",
        }
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Schema::Legacy => "tbrc.org",
            Schema::Catalog => "BUDA MARC 506$a",
        };
        write!(f, "{}", label)
    }
}

/// The authoritative restriction code of an item and where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionSignal {
    pub schema: Schema,
    pub code: String,
}

impl RestrictionSignal {
    pub fn new(schema: Schema, code: impl Into<String>) -> Self {
        Self {
            schema,
            code: code.into(),
        }
    }
}
