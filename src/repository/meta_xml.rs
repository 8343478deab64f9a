//! The item's `<identifier>_meta.xml` record

use std::path::{Path, PathBuf};

use roxmltree::Document;

use super::ChangesetWriter;
use crate::{
    error::{AppError, AppResult},
    models::{BookItem, Changeset},
};

/// Applies changesets to `<identifier>_meta.xml` in the book directory.
///
/// Each changed field replaces every existing element of the same name;
/// other elements keep their order. The new file is written next to the old
/// one and renamed over it.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaXmlWriter;

impl MetaXmlWriter {
    pub fn path(item: &BookItem) -> PathBuf {
        item.book_dir.join(format!("{}_meta.xml", item.identifier))
    }

    /// `(element, text)` pairs of an existing meta.xml
    pub fn read_elements(path: &Path) -> AppResult<Vec<(String, String)>> {
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(path)?;
        let doc = Document::parse(&content)
            .map_err(|e| AppError::ChangesetWrite(format!("{}: {}", path.display(), e)))?;

        Ok(doc
            .root_element()
            .children()
            .filter(|n| n.is_element())
            .map(|n| {
                let text: String = n.descendants().filter(|d| d.is_text()).filter_map(|d| d.text()).collect();
                (n.tag_name().name().to_string(), text)
            })
            .collect())
    }

    pub fn render(elements: &[(String, String)]) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<metadata>\n");
        for (name, value) in elements {
            xml.push_str(&format!("  <{}>{}</{}>\n", name, escape(value), name));
        }
        xml.push_str("</metadata>\n");
        xml
    }
}

impl ChangesetWriter for MetaXmlWriter {
    fn write(&self, item: &BookItem, changes: &Changeset) -> AppResult<()> {
        let path = Self::path(item);
        let mut elements: Vec<(String, String)> = Self::read_elements(&path)?
            .into_iter()
            .filter(|(name, _)| !changes.contains(name))
            .collect();

        for (field, values) in changes.iter() {
            elements.extend(values.iter().map(|v| (field.to_string(), v.clone())));
        }

        let tmp = path.with_extension("xml.tmp");
        std::fs::write(&tmp, Self::render(&elements))
            .map_err(|e| AppError::ChangesetWrite(format!("{}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| AppError::ChangesetWrite(format!("{}: {}", path.display(), e)))?;

        tracing::info!("Wrote {} field(s) to {}", changes.iter().count(), path.display());
        Ok(())
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
