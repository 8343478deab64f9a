//! Source metadata files and supplementary records in the book directory

use std::path::PathBuf;

use serde::Deserialize;

use super::{SourceFiles, SupplementaryRecords};
use crate::{
    error::{AppError, AppResult},
    models::BookItem,
};

/// Source files stored under the book directory
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSourceFiles;

impl SourceFiles for FsSourceFiles {
    fn locate(&self, item: &BookItem, template: &str) -> Option<PathBuf> {
        let path = item.resolve(template);
        if path.is_file() {
            Some(path)
        } else {
            tracing::debug!("No source file {}", path.display());
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupplementaryRecord {
    #[serde(rename = "digitalLendingPossible")]
    digital_lending_possible: Option<bool>,
}

/// `<book_id>.json` records exported alongside the scans
#[derive(Debug, Clone)]
pub struct JsonSupplementaryRecords {
    template: String,
}

impl JsonSupplementaryRecords {
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }
}

impl SupplementaryRecords for JsonSupplementaryRecords {
    fn lending_possible(&self, item: &BookItem) -> AppResult<Option<bool>> {
        let path = item.resolve(&self.template);
        if !path.is_file() {
            tracing::debug!("No supplementary record {}", path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        let record: SupplementaryRecord = serde_json::from_str(&content)
            .map_err(|e| AppError::Supplementary(format!("{}: {}", path.display(), e)))?;
        Ok(record.digital_lending_possible)
    }
}
