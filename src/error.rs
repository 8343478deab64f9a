//! Error types for the BDRC book preprocessor

use thiserror::Error;

use crate::models::Schema;

/// Main application error type.
///
/// Every variant is fatal for the item being processed: the pipeline stops
/// and no changeset is written.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unable to read and parse XML metadata file \"{source_name}\": {message}")]
    MetadataParse { source_name: String, message: String },

    #[error("Metadata query \"{query}\" cannot be evaluated: {message}")]
    UnsupportedQuery { query: String, message: String },

    #[error("Cannot find an access restriction in either the tbrc.org or the BUDA metadata")]
    MissingClassificationSignal,

    #[error("Unexpected {schema} access restriction value \"{code}\"")]
    UnrecognizedClassificationCode { schema: Schema, code: String },

    #[error("Invalid item identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Item has {found} images, at least {required} are required")]
    TooFewImages { found: usize, required: usize },

    #[error("Image inspection failed: {0}")]
    ImageInspection(String),

    #[error("Unable to write metadata changes: {0}")]
    ChangesetWrite(String),

    #[error("Supplementary record error: {0}")]
    Supplementary(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
