//! Choice of the authoritative access restriction signal

use crate::{
    error::{AppError, AppResult},
    metadata::MetadataMap,
    models::{RestrictionSignal, Schema},
};

/// Pick the restriction code that classifies the item.
///
/// The tbrc.org `access_restriction` always wins over the BUDA 506$a access
/// note; an item with neither cannot be published safely.
pub fn select_restriction_signal(metadata: &MetadataMap) -> AppResult<RestrictionSignal> {
    [Schema::Legacy, Schema::Catalog]
        .into_iter()
        .find_map(|schema| {
            metadata
                .first_non_blank(schema.field())
                .map(|code| RestrictionSignal::new(schema, code))
        })
        .ok_or(AppError::MissingClassificationSignal)
}
