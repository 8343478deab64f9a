//! Access classification: collections, visibility and rights of an item

use crate::{
    config::{AffiliationConfig, LayoutConfig},
    error::AppResult,
    metadata::MetadataMap,
    models::{fields, BookItem, Changeset, RestrictionSignal, Schema},
    repository::{ImageInspector, Naming, SupplementaryRecords},
    rules::{
        RuleTable, CATALOG_INDEXED, CATALOG_RULES, CHINA_COUNTRY_CODE, LEGACY_INDEXED, LEGACY_RULES,
        LENDING_COLLECTION, RESTRICTED_COLLECTION, RESTRICTED_IN_CHINA, SAMPLE_PAGES_ONLY,
    },
};

/// Licence values as found in `archiveInfo/@license`
const RIGHTS_COPYRIGHT: &str = "copyright";
const RIGHTS_CCBY: &str = "ccby";
const PUBLIC_DOMAIN: &str = "Public Domain";

/// Derives the meta.xml changes that control who can see an item
#[derive(Debug, Clone)]
pub struct AccessClassifier {
    legacy: RuleTable,
    catalog: RuleTable,
    affiliation: AffiliationConfig,
    layout: LayoutConfig,
}

impl AccessClassifier {
    pub fn new(affiliation: AffiliationConfig, layout: LayoutConfig) -> Self {
        Self {
            legacy: LEGACY_RULES.clone(),
            catalog: CATALOG_RULES.clone(),
            affiliation,
            layout,
        }
    }

    /// Classify one item.
    ///
    /// Unknown restriction codes fail the whole item; nothing is returned to
    /// write in that case.
    pub fn classify(
        &self,
        metadata: &MetadataMap,
        signal: &RestrictionSignal,
        item: &BookItem,
        supplementary: &dyn SupplementaryRecords,
        naming: &dyn Naming,
        images: &dyn ImageInspector,
    ) -> AppResult<Changeset> {
        let mut changes = Changeset::new();

        match signal.schema {
            Schema::Legacy => self.classify_legacy(metadata, &signal.code, &mut changes)?,
            Schema::Catalog => self.classify_catalog(&signal.code, item, supplementary, &mut changes)?,
        }

        // override <rights> (archiveInfo/@license) if it was "ccby"
        if metadata.first(fields::RIGHTS) == Some(RIGHTS_CCBY) {
            changes.set(fields::RIGHTS, PUBLIC_DOMAIN);
        }

        self.tag_affiliation(metadata, item, &mut changes);
        self.apply_layout(item, naming, images, &mut changes)?;

        tracing::debug!("Changes for {}: {:?}", item.identifier, changes);
        Ok(changes)
    }

    fn classify_legacy(&self, metadata: &MetadataMap, code: &str, changes: &mut Changeset) -> AppResult<()> {
        changes.set_all(fields::COLLECTION, self.legacy.collections(code)?);

        if code == RESTRICTED_IN_CHINA {
            changes.set(fields::GEO_RESTRICTED, CHINA_COUNTRY_CODE);
            if metadata.first(fields::RIGHTS) == Some(RIGHTS_COPYRIGHT) {
                changes.push_unique(fields::COLLECTION, RESTRICTED_COLLECTION);
            }
        }

        if !LEGACY_INDEXED.contains(&code) {
            changes.set(fields::NOINDEX, "true");
        }
        Ok(())
    }

    fn classify_catalog(
        &self,
        code: &str,
        item: &BookItem,
        supplementary: &dyn SupplementaryRecords,
        changes: &mut Changeset,
    ) -> AppResult<()> {
        changes.set_all(fields::COLLECTION, self.catalog.collections(code)?);

        if !CATALOG_INDEXED.contains(&code) {
            changes.set(fields::NOINDEX, "true");
        }

        // copyrighted books go to lending unless the record says otherwise
        if code == SAMPLE_PAGES_ONLY {
            let lending_possible = supplementary.lending_possible(item)?.unwrap_or(true);
            tracing::info!("{}: digital lending possible: {}", item.identifier, lending_possible);
            if lending_possible {
                changes.push_unique(fields::COLLECTION, LENDING_COLLECTION);
                changes.set(fields::NOINDEX, "false");
            }
        }
        Ok(())
    }

    fn tag_affiliation(&self, metadata: &MetadataMap, item: &BookItem, changes: &mut Changeset) {
        let by_identifier = self
            .affiliation
            .identifier_prefixes
            .iter()
            .filter(|prefix| !prefix.is_empty())
            .any(|prefix| item.book_id.starts_with(prefix.as_str()));

        let by_publisher = metadata.values("publisher").iter().any(|publisher| {
            let publisher = publisher.to_lowercase();
            self.affiliation
                .publisher_keywords
                .iter()
                .filter(|keyword| !keyword.is_empty())
                .any(|keyword| publisher.contains(&keyword.to_lowercase()))
        });

        if by_identifier || by_publisher {
            tracing::debug!("{} belongs to {}", item.identifier, self.affiliation.collection);
            changes.push_unique(fields::COLLECTION, &self.affiliation.collection);
        }
    }

    /// BookReader defaults to 1-up mode when the scans are wide landscape
    fn apply_layout(
        &self,
        item: &BookItem,
        naming: &dyn Naming,
        images: &dyn ImageInspector,
        changes: &mut Changeset,
    ) -> AppResult<()> {
        let location = naming.image_location(item, self.layout.representative_image);
        let (width, height) = images.image_size(&location)?;
        if f64::from(width) > self.layout.landscape_ratio * f64::from(height) {
            changes.set(fields::BOOKREADER_DEFAULTS, &self.layout.landscape_mode);
        }
        Ok(())
    }
}

impl Default for AccessClassifier {
    fn default() -> Self {
        Self::new(AffiliationConfig::default(), LayoutConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::AppError,
        repository::{ImageLocation, MockImageInspector, MockNaming, MockSupplementaryRecords},
        rules::{BASE_COLLECTION, GEO_RESTRICTED_COLLECTION, STREAM_ONLY_COLLECTION},
    };
    use regex::Regex;
    use std::path::PathBuf;

    fn item(identifier: &str) -> BookItem {
        BookItem::new(identifier, "/books", 10, &Regex::new(r"^bdrc-(.+)").unwrap()).unwrap()
    }

    fn naming() -> MockNaming {
        let mut naming = MockNaming::new();
        naming.expect_image_location().returning(|item, index| ImageLocation {
            archive: PathBuf::from(format!("/books/{}_jp2.zip", item.identifier)),
            member: format!("{:04}.jp2", index),
        });
        naming
    }

    fn images(width: u32, height: u32) -> MockImageInspector {
        let mut images = MockImageInspector::new();
        images.expect_image_size().returning(move |_| Ok((width, height)));
        images
    }

    fn no_supplementary() -> MockSupplementaryRecords {
        let mut records = MockSupplementaryRecords::new();
        records.expect_lending_possible().never();
        records
    }

    fn legacy(code: &str, rights: &str) -> (MetadataMap, RestrictionSignal) {
        let mut meta = MetadataMap::new();
        meta.append("access_restriction", code);
        meta.append("rights", rights);
        (meta, RestrictionSignal::new(Schema::Legacy, code))
    }

    fn catalog(note: &str) -> (MetadataMap, RestrictionSignal) {
        let mut meta = MetadataMap::new();
        meta.append("marc_506a", note);
        (meta, RestrictionSignal::new(Schema::Catalog, note))
    }

    fn classify(
        meta: &MetadataMap,
        signal: &RestrictionSignal,
        supplementary: &MockSupplementaryRecords,
    ) -> AppResult<Changeset> {
        AccessClassifier::default().classify(meta, signal, &item("bdrc-W22084"), supplementary, &naming(), &images(1000, 1400))
    }

    fn collection(changes: &Changeset) -> Vec<&str> {
        changes
            .get(fields::COLLECTION)
            .unwrap_or_default()
            .iter()
            .map(String::as_str)
            .collect()
    }

    #[test]
    fn test_open_access_legacy() {
        let (meta, signal) = legacy("openAccess", "noncommercial");
        let changes = classify(&meta, &signal, &no_supplementary()).unwrap();
        assert_eq!(collection(&changes), [BASE_COLLECTION, STREAM_ONLY_COLLECTION]);
        assert!(!changes.contains(fields::NOINDEX));
        assert!(!changes.contains(fields::RIGHTS));
        assert!(!changes.contains(fields::GEO_RESTRICTED));
    }

    #[test]
    fn test_legacy_collections_follow_rule_table() {
        for code in LEGACY_RULES.codes() {
            let (meta, signal) = legacy(code, "noncommercial");
            let changes = classify(&meta, &signal, &no_supplementary()).unwrap();
            let expected: Vec<String> = LEGACY_RULES.collections(code).unwrap();
            assert_eq!(changes.get(fields::COLLECTION).unwrap(), expected.as_slice(), "{}", code);
        }
    }

    #[test]
    fn test_legacy_noindex() {
        for code in ["openAccess", "fairUse"] {
            let (meta, signal) = legacy(code, "copyright");
            assert!(!classify(&meta, &signal, &no_supplementary()).unwrap().contains(fields::NOINDEX));
        }
        for code in ["fairUseNolib", "restrictedSealed", "temporarilyRestricted", "restrictedInChina"] {
            let (meta, signal) = legacy(code, "copyright");
            let changes = classify(&meta, &signal, &no_supplementary()).unwrap();
            assert_eq!(changes.value(fields::NOINDEX), Some("true"), "{}", code);
        }
    }

    #[test]
    fn test_restricted_in_china() {
        let (meta, signal) = legacy("restrictedInChina", "copyright");
        let changes = classify(&meta, &signal, &no_supplementary()).unwrap();
        assert_eq!(changes.value(fields::GEO_RESTRICTED), Some("CN"));
        assert_eq!(
            collection(&changes),
            [BASE_COLLECTION, GEO_RESTRICTED_COLLECTION, RESTRICTED_COLLECTION]
        );

        let (meta, signal) = legacy("restrictedInChina", "noncommercial");
        let changes = classify(&meta, &signal, &no_supplementary()).unwrap();
        assert_eq!(changes.value(fields::GEO_RESTRICTED), Some("CN"));
        assert!(!collection(&changes).contains(&RESTRICTED_COLLECTION));
    }

    #[test]
    fn test_ccby_becomes_public_domain_in_both_tracks() {
        let (meta, signal) = legacy("openAccess", "ccby");
        let changes = classify(&meta, &signal, &no_supplementary()).unwrap();
        assert_eq!(changes.value(fields::RIGHTS), Some("Public Domain"));

        let (mut meta, signal) = catalog("Open Access.");
        meta.append("rights", "ccby");
        let changes = classify(&meta, &signal, &no_supplementary()).unwrap();
        assert_eq!(changes.value(fields::RIGHTS), Some("Public Domain"));
    }

    #[test]
    fn test_open_access_catalog() {
        let (meta, signal) = catalog("Open Access.");
        let changes = classify(&meta, &signal, &no_supplementary()).unwrap();
        assert_eq!(collection(&changes), [BASE_COLLECTION, STREAM_ONLY_COLLECTION]);
        assert!(!changes.contains(fields::NOINDEX));
    }

    #[test]
    fn test_catalog_restricted_is_noindex() {
        let (meta, signal) = catalog("Access restricted in some countries.");
        let changes = classify(&meta, &signal, &no_supplementary()).unwrap();
        assert_eq!(collection(&changes), [BASE_COLLECTION, GEO_RESTRICTED_COLLECTION]);
        assert_eq!(changes.value(fields::NOINDEX), Some("true"));
    }

    #[test]
    fn test_sample_pages_without_record_go_to_lending() {
        let (meta, signal) = catalog(SAMPLE_PAGES_ONLY);
        let mut records = MockSupplementaryRecords::new();
        records.expect_lending_possible().times(1).returning(|_| Ok(None));

        let changes = classify(&meta, &signal, &records).unwrap();
        assert_eq!(
            collection(&changes),
            [BASE_COLLECTION, RESTRICTED_COLLECTION, LENDING_COLLECTION]
        );
        assert_eq!(changes.value(fields::NOINDEX), Some("false"));
    }

    #[test]
    fn test_sample_pages_not_lendable() {
        let (meta, signal) = catalog(SAMPLE_PAGES_ONLY);
        let mut records = MockSupplementaryRecords::new();
        records.expect_lending_possible().returning(|_| Ok(Some(false)));

        let changes = classify(&meta, &signal, &records).unwrap();
        assert_eq!(collection(&changes), [BASE_COLLECTION, RESTRICTED_COLLECTION]);
        assert_eq!(changes.value(fields::NOINDEX), Some("true"));
    }

    #[test]
    fn test_unrecognized_codes_fail() {
        let (meta, signal) = legacy("restrictedByMoon", "copyright");
        let err = classify(&meta, &signal, &no_supplementary()).unwrap_err();
        assert!(matches!(
            err,
            AppError::UnrecognizedClassificationCode { schema: Schema::Legacy, ref code } if code == "restrictedByMoon"
        ));

        let (meta, signal) = catalog("Open access");
        let err = classify(&meta, &signal, &no_supplementary()).unwrap_err();
        assert!(matches!(
            err,
            AppError::UnrecognizedClassificationCode { schema: Schema::Catalog, .. }
        ));
    }

    #[test]
    fn test_affiliation_by_identifier_prefix() {
        let classifier = AccessClassifier::default();
        let (meta, signal) = legacy("openAccess", "noncommercial");
        for identifier in ["bdrc-W1FPL2251", "bdrc-W1EAP0001"] {
            let changes = classifier
                .classify(&meta, &signal, &item(identifier), &no_supplementary(), &naming(), &images(10, 10))
                .unwrap();
            assert_eq!(collection(&changes).last(), Some(&"bdrc-fplmanuscripts"), "{}", identifier);
        }

        let changes = classifier
            .classify(&meta, &signal, &item("bdrc-W22FPL1"), &no_supplementary(), &naming(), &images(10, 10))
            .unwrap();
        assert!(!collection(&changes).contains(&"bdrc-fplmanuscripts"));
    }

    #[test]
    fn test_affiliation_by_publisher() {
        let (mut meta, signal) = catalog("Open Access.");
        meta.append("publisher", "The FRAGILE Palm Leaves Foundation");
        let changes = classify(&meta, &signal, &no_supplementary()).unwrap();
        assert_eq!(
            collection(&changes),
            [BASE_COLLECTION, STREAM_ONLY_COLLECTION, "bdrc-fplmanuscripts"]
        );
    }

    #[test]
    fn test_landscape_threshold() {
        let classifier = AccessClassifier::default();
        let (meta, signal) = legacy("openAccess", "noncommercial");
        let run = |width, height| {
            classifier
                .classify(&meta, &signal, &item("bdrc-W1"), &no_supplementary(), &naming(), &images(width, height))
                .unwrap()
        };

        assert_eq!(run(1260, 1000).value(fields::BOOKREADER_DEFAULTS), Some("mode/1up"));
        assert!(!run(1250, 1000).contains(fields::BOOKREADER_DEFAULTS));
        assert!(!run(800, 1000).contains(fields::BOOKREADER_DEFAULTS));
    }

    #[test]
    fn test_layout_uses_third_image() {
        let mut naming = MockNaming::new();
        naming
            .expect_image_location()
            .withf(|_, index| *index == 2)
            .times(1)
            .returning(|_, _| ImageLocation {
                archive: PathBuf::from("/books/bdrc-W1_jp2.zip"),
                member: "bdrc-W1_jp2/bdrc-W1_0002.jp2".to_string(),
            });
        let mut images = MockImageInspector::new();
        images
            .expect_image_size()
            .withf(|location| location.member.ends_with("_0002.jp2"))
            .returning(|_| Ok((3000, 1000)));

        let (meta, signal) = legacy("openAccess", "noncommercial");
        let changes = AccessClassifier::default()
            .classify(&meta, &signal, &item("bdrc-W1"), &no_supplementary(), &naming, &images)
            .unwrap();
        assert!(changes.contains(fields::BOOKREADER_DEFAULTS));
    }

    #[test]
    fn test_image_failure_is_fatal() {
        let mut images = MockImageInspector::new();
        images
            .expect_image_size()
            .returning(|_| Err(AppError::ImageInspection("no such member".to_string())));

        let (meta, signal) = legacy("openAccess", "noncommercial");
        let result = AccessClassifier::default().classify(
            &meta,
            &signal,
            &item("bdrc-W1"),
            &no_supplementary(),
            &naming(),
            &images,
        );
        assert!(matches!(result, Err(AppError::ImageInspection(_))));
    }
}
