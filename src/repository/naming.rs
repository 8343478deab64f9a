//! Naming of packaged page images

use std::path::PathBuf;

use serde::Serialize;

use super::Naming;
use crate::models::BookItem;

/// An image inside the item's image archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageLocation {
    pub archive: PathBuf,
    /// Path of the image inside the archive
    pub member: String,
}

/// `<identifier>_jp2.zip` holding `<identifier>_jp2/<identifier>_NNNN.jp2`
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveNaming;

impl ArchiveNaming {
    pub fn zip_name(&self, item: &BookItem) -> String {
        format!("{}_jp2.zip", item.identifier)
    }

    pub fn archive_dir_name(&self, item: &BookItem) -> String {
        format!("{}_jp2", item.identifier)
    }

    pub fn image_name(&self, item: &BookItem, index: usize) -> String {
        format!("{}_{:04}.jp2", item.identifier, index)
    }
}

impl Naming for ArchiveNaming {
    fn image_location(&self, item: &BookItem, index: usize) -> ImageLocation {
        ImageLocation {
            archive: item.book_dir.join(self.zip_name(item)),
            member: format!("{}/{}", self.archive_dir_name(item), self.image_name(item, index)),
        }
    }
}
