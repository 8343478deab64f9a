//! BDRC book preprocessor
//!
//! Extracts metadata from the tbrc.org and BUDA MARCXML records of a scanned
//! book, decides its collections and visibility, and prepares its initial
//! page data before upload.

pub mod config;
pub mod error;
pub mod metadata;
pub mod models;
pub mod repository;
pub mod rules;
pub mod services;
pub mod xpath;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
