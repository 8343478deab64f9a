//! Data models for the book preprocessor

pub mod book;
pub mod changeset;
pub mod classification;
pub mod scandata;

// Re-export commonly used types
pub use book::BookItem;
pub use changeset::{fields, Changeset};
pub use classification::{RestrictionSignal, Schema};
pub use scandata::{PageData, PageRecord, PageType};
