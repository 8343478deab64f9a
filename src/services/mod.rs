//! Processing stages for one scanned book

pub mod classifier;
pub mod preprocessor;
pub mod scandata;
pub mod selector;

pub use classifier::AccessClassifier;
pub use preprocessor::{catalog_queries, legacy_queries, BookPreprocessor, ProcessedItem};
pub use scandata::init_page_data;
pub use selector::select_restriction_signal;
