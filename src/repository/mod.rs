//! Repository layer: the item's files and the collaborators that read and
//! write them
//!
//! Services only see the traits below, so a host pipeline can inject its own
//! implementations.

pub mod images;
pub mod meta_xml;
pub mod naming;
pub mod sources;

use std::path::PathBuf;

use crate::{
    config::SourcesConfig,
    error::AppResult,
    models::{BookItem, Changeset},
};

pub use images::{count_images, ZipImageInspector};
pub use meta_xml::MetaXmlWriter;
pub use naming::{ArchiveNaming, ImageLocation};
pub use sources::{FsSourceFiles, JsonSupplementaryRecords};

/// Locates an item's source metadata files
#[cfg_attr(test, mockall::automock)]
pub trait SourceFiles {
    /// Path of the file described by `template` (`{id}` = book id), `None`
    /// when the item has no such file
    fn locate(&self, item: &BookItem, template: &str) -> Option<PathBuf>;
}

/// Per-item supplementary record
#[cfg_attr(test, mockall::automock)]
pub trait SupplementaryRecords {
    /// `digitalLendingPossible` flag, `None` when the record or the key is absent
    fn lending_possible(&self, item: &BookItem) -> AppResult<Option<bool>>;
}

/// Resolves image indexes to their place in the packaged image set
#[cfg_attr(test, mockall::automock)]
pub trait Naming {
    fn image_location(&self, item: &BookItem, index: usize) -> ImageLocation;
}

/// Reads pixel dimensions of a packaged image
#[cfg_attr(test, mockall::automock)]
pub trait ImageInspector {
    /// `(width, height)` in pixels
    fn image_size(&self, location: &ImageLocation) -> AppResult<(u32, u32)>;
}

/// Persists metadata changes to the item's record in a single write
#[cfg_attr(test, mockall::automock)]
pub trait ChangesetWriter {
    fn write(&self, item: &BookItem, changes: &Changeset) -> AppResult<()>;
}

/// Collaborators used to process one item
pub struct Repository {
    pub sources: Box<dyn SourceFiles>,
    pub supplementary: Box<dyn SupplementaryRecords>,
    pub naming: Box<dyn Naming>,
    pub images: Box<dyn ImageInspector>,
    pub writer: Box<dyn ChangesetWriter>,
}

impl Repository {
    /// Collaborators working on the book directory itself
    pub fn filesystem(config: &SourcesConfig) -> Self {
        Self {
            sources: Box::new(FsSourceFiles),
            supplementary: Box::new(JsonSupplementaryRecords::new(&config.supplementary_template)),
            naming: Box::new(ArchiveNaming),
            images: Box::new(ZipImageInspector),
            writer: Box::new(MetaXmlWriter),
        }
    }
}
