//! BDRC book preprocessor
//!
//! Classifies each scanned book directory given on the command line and
//! writes its meta.xml and initial scandata.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bdrc_preprocessor::{
    config::AppConfig,
    repository::{count_images, ArchiveNaming, Repository},
    services::BookPreprocessor,
};

fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("bdrc_preprocessor={}", config.logging.level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting BDRC preprocessor v{}", env!("CARGO_PKG_VERSION"));

    let book_dirs: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if book_dirs.is_empty() {
        anyhow::bail!("usage: bdrc-preprocessor <book dir>...");
    }

    let preprocessor = BookPreprocessor::new(&config, Repository::filesystem(&config.sources))?;

    let mut failed = 0usize;
    for book_dir in &book_dirs {
        if let Err(e) = process_dir(&preprocessor, book_dir) {
            tracing::error!("{}: {:#}", book_dir.display(), e);
            failed += 1;
        }
    }

    tracing::info!("Processed {} item(s), {} failed", book_dirs.len(), failed);
    if failed > 0 {
        anyhow::bail!("{} of {} item(s) failed", failed, book_dirs.len());
    }
    Ok(())
}

/// The directory name is the item identifier
fn process_dir(preprocessor: &BookPreprocessor, book_dir: &Path) -> anyhow::Result<()> {
    let identifier = book_dir
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("no item identifier in {}", book_dir.display()))?;

    let mut item = preprocessor.item(identifier, book_dir, 0)?;
    item.num_images = count_images(&book_dir.join(ArchiveNaming.zip_name(&item)))?;

    let processed = preprocessor.process(&item)?;

    let scandata = book_dir.join(format!("{}_scandata.xml", identifier));
    std::fs::write(&scandata, processed.page_data.to_scandata_xml())
        .with_context(|| format!("writing {}", scandata.display()))?;

    tracing::info!(
        "{}: done, changes {}",
        identifier,
        serde_json::to_string(&processed.changeset)?
    );
    Ok(())
}
