//! Per-item pipeline: metadata extraction, classification and page data

use regex::Regex;
use serde::Serialize;

use super::{classifier::AccessClassifier, scandata::init_page_data, selector::select_restriction_signal};
use crate::{
    config::{AppConfig, ItemConfig, SourcesConfig},
    error::{AppError, AppResult},
    metadata::{map_metadata_from_xml, MetadataMap, NamespaceDecl, QueryTable, Target, XmlSource},
    models::{BookItem, Changeset, PageData},
    repository::Repository,
};

pub const WORK_NAMESPACE: &str = "http://www.tbrc.org/models/work#";
pub const MARC_NAMESPACE: &str = "http://www.loc.gov/MARC21/slim";

/// Queries against the tbrc.org work record
pub fn legacy_queries() -> QueryTable {
    QueryTable::new()
        .namespace(Some(NamespaceDecl::new("work", WORK_NAMESPACE)))
        .query("//work:archiveInfo/@access", Target::field("access_restriction"))
        .query("//work:archiveInfo/@license", Target::field("rights"))
}

/// Queries against the BUDA MARCXML record
pub fn catalog_queries() -> QueryTable {
    QueryTable::new()
        .namespace(Some(NamespaceDecl::new("marc", MARC_NAMESPACE)))
        .query(
            "//marc:datafield[@tag='506']/marc:subfield[@code='a']",
            Target::field("marc_506a"),
        )
        .query(
            "//marc:datafield[@tag='260']/marc:subfield[@code='b'] | //marc:datafield[@tag='264']/marc:subfield[@code='b']",
            Target::field("publisher"),
        )
        .query(
            "//marc:datafield[@tag='245']/marc:subfield[@code='a']",
            Target::field("title"),
        )
}

/// Outcome of a processed item
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedItem {
    pub metadata: MetadataMap,
    /// Classification changes alone, before merging with the metadata
    pub changeset: Changeset,
    pub page_data: PageData,
}

pub struct BookPreprocessor {
    item_config: ItemConfig,
    sources_config: SourcesConfig,
    id_pattern: Regex,
    classifier: AccessClassifier,
    repository: Repository,
}

impl BookPreprocessor {
    pub fn new(config: &AppConfig, repository: Repository) -> AppResult<Self> {
        let id_pattern = Regex::new(&config.item.id_pattern).map_err(|e| {
            AppError::Config(::config::ConfigError::Message(format!(
                "invalid item.id_pattern {:?}: {}",
                config.item.id_pattern, e
            )))
        })?;

        Ok(Self {
            item_config: config.item.clone(),
            sources_config: config.sources.clone(),
            id_pattern,
            classifier: AccessClassifier::new(config.affiliation.clone(), config.layout.clone()),
            repository,
        })
    }

    /// Build the item for `identifier` stored in `book_dir`
    pub fn item(
        &self,
        identifier: &str,
        book_dir: impl Into<std::path::PathBuf>,
        num_images: usize,
    ) -> AppResult<BookItem> {
        BookItem::new(identifier, book_dir, num_images, &self.id_pattern)
    }

    /// Fixed item properties followed by whatever the source records provide
    pub fn extract_metadata(&self, item: &BookItem) -> AppResult<MetadataMap> {
        let mut metadata = MetadataMap::new();
        metadata.append("mediatype", self.item_config.mediatype.as_str());
        metadata.append("contributor", self.item_config.contributor.as_str());
        metadata.append("sponsor", self.item_config.sponsor.as_str());

        let sources = [
            (&self.sources_config.legacy_template, legacy_queries()),
            (&self.sources_config.catalog_template, catalog_queries()),
        ];
        for (template, table) in sources {
            match self.repository.sources.locate(item, template) {
                Some(path) => map_metadata_from_xml(&mut metadata, &XmlSource::from(path), &table, true)?,
                None => tracing::debug!("{}: no {} record", item.identifier, template),
            }
        }

        Ok(metadata)
    }

    /// Run the whole pipeline for one item and persist the result.
    ///
    /// Nothing is written when any stage fails.
    pub fn process(&self, item: &BookItem) -> AppResult<ProcessedItem> {
        tracing::info!("Processing {} ({} images)", item.identifier, item.num_images);

        if item.num_images < self.item_config.min_images {
            return Err(AppError::TooFewImages {
                found: item.num_images,
                required: self.item_config.min_images,
            });
        }

        let metadata = self.extract_metadata(item)?;
        let signal = select_restriction_signal(&metadata)?;
        tracing::info!("{}: {} code {:?}", item.identifier, signal.schema, signal.code);

        let changeset = self.classifier.classify(
            &metadata,
            &signal,
            item,
            self.repository.supplementary.as_ref(),
            self.repository.naming.as_ref(),
            self.repository.images.as_ref(),
        )?;
        let page_data = init_page_data(item.num_images);

        let mut record = Changeset::from(&metadata);
        record.overlay(&changeset);
        self.repository.writer.write(item, &record)?;

        Ok(ProcessedItem {
            metadata,
            changeset,
            page_data,
        })
    }
}
