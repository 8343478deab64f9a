//! XPath driven metadata extraction

use std::borrow::Cow;

use indexmap::IndexSet;
use roxmltree::{Document, ParsingOptions};

use super::{MetadataMap, QueryTable, XmlSource};
use crate::{
    error::{AppError, AppResult},
    xpath::{self, Namespaces, XPathError},
};

/// Read an XML document, run every query of `table` against it and append
/// the results to `meta`.
///
/// Namespace bindings accumulate in table order, so a prefix declared by an
/// earlier group stays usable in later ones. A malformed query, an unbound
/// prefix or a type error is logged and contributes nothing. A query using an
/// XPath construct the engine does not implement aborts with
/// [`AppError::UnsupportedQuery`], and an unreadable or malformed document
/// aborts with [`AppError::MetadataParse`].
///
/// With `trim` set, non-breaking spaces become plain spaces and whitespace
/// runs collapse to a single space.
pub fn map_metadata_from_xml(
    meta: &mut MetadataMap,
    source: &XmlSource,
    table: &QueryTable,
    trim: bool,
) -> AppResult<()> {
    let parse_error = |message: String| AppError::MetadataParse {
        source_name: source.name(),
        message,
    };

    let text: Cow<'_, str> = match source {
        XmlSource::Path(path) => Cow::Owned(std::fs::read_to_string(path).map_err(|e| parse_error(e.to_string()))?),
        XmlSource::Text { xml, .. } => Cow::Borrowed(xml.as_str()),
    };

    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(&text, options).map_err(|e| parse_error(e.to_string()))?;

    let mut namespaces = Namespaces::new();
    for group in &table.groups {
        if let Some(decl) = &group.namespace {
            namespaces.bind(decl.prefix.as_str(), decl.uri.as_str());
        }

        for (query, target) in &group.queries {
            let matches = match xpath::query(&doc, query, &namespaces) {
                Ok(matches) => matches,
                Err(e @ XPathError::Unsupported { .. }) => {
                    return Err(AppError::UnsupportedQuery {
                        query: query.to_string(),
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!("XPath query {} on {} failed: {}", query, source.name(), e);
                    continue;
                }
            };

            // the same value may be selected through several nodes
            let unique: IndexSet<String> = matches.into_iter().collect();
            tracing::debug!("{} -> {} unique match(es) for {}", query, unique.len(), target.field_name());

            for raw in unique {
                if raw.is_empty() {
                    continue;
                }
                let value = if trim { normalize_whitespace(&raw) } else { raw };
                if value.trim().is_empty() {
                    continue;
                }
                meta.append(target.field_name(), target.render(&value));
            }
        }
    }

    Ok(())
}

/// Replace non-breaking spaces, collapse whitespace runs and strip the ends
pub fn normalize_whitespace(value: &str) -> String {
    value
        .replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
