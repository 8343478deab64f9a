//! Scanned book items

use std::path::PathBuf;

use regex::Regex;
use serde::Serialize;

use crate::error::{AppError, AppResult};

/// One item being preprocessed: identifier, BDRC book id and location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookItem {
    /// Archive identifier, e.g. `bdrc-W1KG1234`
    pub identifier: String,
    /// BDRC work id extracted from the identifier, e.g. `W1KG1234`
    pub book_id: String,
    pub book_dir: PathBuf,
    /// Number of page images in the item
    pub num_images: usize,
}

impl BookItem {
    /// Build an item, extracting the book id with the first capture group of
    /// `id_pattern`
    pub fn new(
        identifier: &str,
        book_dir: impl Into<PathBuf>,
        num_images: usize,
        id_pattern: &Regex,
    ) -> AppResult<Self> {
        let book_id = id_pattern
            .captures(identifier)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::InvalidIdentifier(identifier.to_string()))?;

        Ok(Self {
            identifier: identifier.to_string(),
            book_id,
            book_dir: book_dir.into(),
            num_images,
        })
    }

    /// Resolve a `{id}` path template relative to the book directory
    pub fn resolve(&self, template: &str) -> PathBuf {
        self.book_dir.join(template.replace("{id}", &self.book_id))
    }
}
