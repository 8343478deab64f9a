//! End-to-end runs of the preprocessor over book directories on disk

use bdrc_preprocessor::{
    config::AppConfig,
    repository::{count_images, MetaXmlWriter, Repository},
    services::BookPreprocessor,
    AppError,
};

use crate::fixtures::{marc_xml, work_xml, BookDir};

fn preprocessor() -> BookPreprocessor {
    let config = AppConfig::default();
    BookPreprocessor::new(&config, Repository::filesystem(&config.sources)).unwrap()
}

fn run(book: &BookDir) -> Result<bdrc_preprocessor::services::ProcessedItem, AppError> {
    let preprocessor = preprocessor();
    let archive = book.path.join(format!("{}_jp2.zip", book.identifier));
    let num_images = count_images(&archive)?;
    let item = preprocessor.item(&book.identifier, &book.path, num_images)?;
    preprocessor.process(&item)
}

/// Values of `field` in the written meta.xml
fn written(book: &BookDir, field: &str) -> Vec<String> {
    MetaXmlWriter::read_elements(&book.meta_xml())
        .unwrap()
        .into_iter()
        .filter(|(name, _)| name == field)
        .map(|(_, value)| value)
        .collect()
}

#[test]
fn test_open_access_legacy_item() {
    let book = BookDir::new("bdrc-W22084")
        .with_work(&work_xml("openAccess", "ccby"))
        .with_images(5, 1000, 1400);

    let processed = run(&book).unwrap();
    assert_eq!(processed.page_data.pages.len(), 5);

    assert_eq!(written(&book, "mediatype"), ["texts"]);
    assert_eq!(written(&book, "access_restriction"), ["openAccess"]);
    assert_eq!(
        written(&book, "collection"),
        ["buddhist-digital-resource-center", "stream_only"]
    );
    assert_eq!(written(&book, "rights"), ["Public Domain"]);
    assert!(written(&book, "noindex").is_empty());
    assert!(written(&book, "bookreader-defaults").is_empty());
}

#[test]
fn test_legacy_record_wins_over_catalog() {
    let book = BookDir::new("bdrc-W1KG13")
        .with_work(&work_xml("fairUseNolib", "copyright"))
        .with_marc(&marc_xml("Open Access.", "Shechen"))
        .with_images(3, 1000, 1400);

    run(&book).unwrap();
    assert_eq!(
        written(&book, "collection"),
        ["buddhist-digital-resource-center", "buddhist-digital-resource-center-restricted"]
    );
    assert_eq!(written(&book, "noindex"), ["true"]);
    assert_eq!(written(&book, "marc_506a"), ["Open Access."]);
}

#[test]
fn test_restricted_in_china() {
    let book = BookDir::new("bdrc-W1FPL100")
        .with_work(&work_xml("restrictedInChina", "copyright"))
        .with_images(4, 3000, 1000);

    let processed = run(&book).unwrap();
    assert_eq!(processed.changeset.value("geo_restricted"), Some("CN"));
    assert_eq!(
        written(&book, "collection"),
        [
            "buddhist-digital-resource-center",
            "geo_restricted",
            "buddhist-digital-resource-center-restricted",
            "bdrc-fplmanuscripts",
        ]
    );
    assert_eq!(written(&book, "noindex"), ["true"]);
    assert_eq!(written(&book, "bookreader-defaults"), ["mode/1up"]);
}

#[test]
fn test_sample_pages_lending() {
    let lendable = BookDir::new("bdrc-W3CN1")
        .with_marc(&marc_xml("Access restricted to a few sample pages.", "Mirik"))
        .with_images(3, 1000, 1400);
    run(&lendable).unwrap();
    assert_eq!(
        written(&lendable, "collection"),
        [
            "buddhist-digital-resource-center",
            "buddhist-digital-resource-center-restricted",
            "inlibrary",
        ]
    );
    assert_eq!(written(&lendable, "noindex"), ["false"]);

    let not_lendable = BookDir::new("bdrc-W3CN2")
        .with_marc(&marc_xml("Access restricted to a few sample pages.", "Mirik"))
        .with_record(r#"{"digitalLendingPossible": false, "rid": "W3CN2"}"#)
        .with_images(3, 1000, 1400);
    run(&not_lendable).unwrap();
    assert!(!written(&not_lendable, "collection").contains(&"inlibrary".to_string()));
    assert_eq!(written(&not_lendable, "noindex"), ["true"]);
}

#[test]
fn test_publisher_affiliation() {
    let book = BookDir::new("bdrc-W8LS1")
        .with_marc(&marc_xml("Open Access.", "Endangered Archives Programme, British Library"))
        .with_images(3, 1000, 1400);

    run(&book).unwrap();
    assert_eq!(
        written(&book, "collection"),
        ["buddhist-digital-resource-center", "stream_only", "bdrc-fplmanuscripts"]
    );
    assert_eq!(written(&book, "title"), ["rgyud sde kun btus"]);
}

#[test]
fn test_existing_meta_xml_is_updated() {
    let book = BookDir::new("bdrc-W22084")
        .with_work(&work_xml("openAccess", "noncommercial"))
        .with_images(3, 1000, 1400);
    std::fs::write(
        book.meta_xml(),
        "<metadata><scanner>bdrc</scanner><collection>stale</collection><noindex>true</noindex></metadata>",
    )
    .unwrap();

    run(&book).unwrap();
    assert_eq!(written(&book, "scanner"), ["bdrc"]);
    assert_eq!(
        written(&book, "collection"),
        ["buddhist-digital-resource-center", "stream_only"]
    );
    // noindex is not part of an open access changeset, so the old value stays
    assert_eq!(written(&book, "noindex"), ["true"]);
}

#[test]
fn test_failures_leave_no_record() {
    let unknown = BookDir::new("bdrc-W9")
        .with_work(&work_xml("restrictedByMoon", "copyright"))
        .with_images(3, 1000, 1400);
    assert!(matches!(
        run(&unknown),
        Err(AppError::UnrecognizedClassificationCode { .. })
    ));
    assert!(!unknown.meta_xml().exists());

    let unsigned = BookDir::new("bdrc-W10").with_images(3, 1000, 1400);
    assert!(matches!(run(&unsigned), Err(AppError::MissingClassificationSignal)));
    assert!(!unsigned.meta_xml().exists());

    let short = BookDir::new("bdrc-W11")
        .with_work(&work_xml("openAccess", "ccby"))
        .with_images(2, 1000, 1400);
    assert!(matches!(run(&short), Err(AppError::TooFewImages { found: 2, .. })));
    assert!(!short.meta_xml().exists());

    let bad_record = BookDir::new("bdrc-W12")
        .with_marc(&marc_xml("Access restricted to a few sample pages.", "Mirik"))
        .with_record("{not json")
        .with_images(3, 1000, 1400);
    assert!(matches!(run(&bad_record), Err(AppError::Supplementary(_))));
    assert!(!bad_record.meta_xml().exists());
}

#[test]
fn test_missing_representative_image() {
    let book = BookDir::new("bdrc-W13").with_work(&work_xml("openAccess", "ccby"));
    let preprocessor = preprocessor();
    // no image archive in the book directory
    let item = preprocessor.item(&book.identifier, &book.path, 3).unwrap();
    assert!(matches!(
        preprocessor.process(&item),
        Err(AppError::ImageInspection(_))
    ));
    assert!(!book.meta_xml().exists());
}
