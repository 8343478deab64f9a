//! Flat metadata extracted from source XML records
//!
//! A [`MetadataMap`] is built up by repeated [`map_metadata_from_xml`] calls
//! driven by a declarative [`QueryTable`].

pub mod mapper;

use indexmap::IndexMap;
use serde::Serialize;
use std::path::PathBuf;

pub use mapper::map_metadata_from_xml;

/// Multi-valued metadata, keyed by meta.xml element name.
///
/// Field order and value order follow insertion order. Values are never
/// blank and never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MetadataMap(IndexMap<String, Vec<String>>);

impl MetadataMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value to `field`. Blank values are ignored.
    pub fn append(&mut self, field: &str, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            return;
        }
        self.0.entry(field.to_string()).or_default().push(value);
    }

    /// All values of `field`, empty when absent
    pub fn values(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value of `field`
    pub fn first(&self, field: &str) -> Option<&str> {
        self.values(field).first().map(String::as_str)
    }

    /// First value of `field` that is not blank
    pub fn first_non_blank(&self, field: &str) -> Option<&str> {
        self.values(field)
            .iter()
            .map(String::as_str)
            .find(|v| !v.trim().is_empty())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Where the extracted value goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Append the matched value verbatim
    Field(String),
    /// Substitute the matched value for `{value}` in `template`. A template
    /// without the placeholder records a constant whenever the query matches.
    Template { field: String, template: String },
}

impl Target {
    pub const PLACEHOLDER: &'static str = "{value}";

    pub fn field(name: impl Into<String>) -> Self {
        Target::Field(name.into())
    }

    pub fn template(field: impl Into<String>, template: impl Into<String>) -> Self {
        Target::Template {
            field: field.into(),
            template: template.into(),
        }
    }

    pub fn field_name(&self) -> &str {
        match self {
            Target::Field(field) | Target::Template { field, .. } => field,
        }
    }

    /// Produce the value stored for one match
    pub fn render(&self, matched: &str) -> String {
        match self {
            Target::Field(_) => matched.to_string(),
            Target::Template { template, .. } => template.replace(Self::PLACEHOLDER, matched),
        }
    }
}

/// Namespace binding for a group of queries, `prefix=uri`.
///
/// The prefix only has to match the one used in the queries, not the one
/// used in the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: String,
    pub uri: String,
}

impl NamespaceDecl {
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            uri: uri.into(),
        }
    }

    /// Parse `prefix=uri`. An empty string means no binding.
    pub fn parse(decl: &str) -> Option<Self> {
        let (prefix, uri) = decl.split_once('=')?;
        let (prefix, uri) = (prefix.trim(), uri.trim());
        if prefix.is_empty() || uri.is_empty() {
            return None;
        }
        Some(Self::new(prefix, uri))
    }
}

/// Queries run under one (optional) namespace binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryGroup {
    pub namespace: Option<NamespaceDecl>,
    pub queries: Vec<(String, Target)>,
}

/// Ordered namespace groups of XPath queries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTable {
    pub groups: Vec<QueryGroup>,
}

impl QueryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a query group bound to `namespace` (`None` for unqualified queries)
    pub fn namespace(mut self, namespace: Option<NamespaceDecl>) -> Self {
        self.groups.push(QueryGroup {
            namespace,
            queries: Vec::new(),
        });
        self
    }

    /// Add a query to the most recently started group
    pub fn query(mut self, xpath: impl Into<String>, target: Target) -> Self {
        if self.groups.is_empty() {
            self = self.namespace(None);
        }
        if let Some(group) = self.groups.last_mut() {
            group.queries.push((xpath.into(), target));
        }
        self
    }
}

/// An XML document to read metadata from
#[derive(Debug, Clone)]
pub enum XmlSource {
    Path(PathBuf),
    Text { name: String, xml: String },
}

impl XmlSource {
    pub fn name(&self) -> String {
        match self {
            XmlSource::Path(path) => path.display().to_string(),
            XmlSource::Text { name, .. } => name.clone(),
        }
    }
}

impl From<PathBuf> for XmlSource {
    fn from(path: PathBuf) -> Self {
        XmlSource::Path(path)
    }
}
