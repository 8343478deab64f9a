//! Initial scandata page model

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageType {
    Title,
}

impl std::fmt::Display for PageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageType::Title => write!(f, "Title"),
        }
    }
}

/// A `<page>` of `<pageData>`, identified by its leaf number
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRecord {
    pub leaf_num: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_type: Option<PageType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageData {
    pub pages: Vec<PageRecord>,
}

impl PageData {
    /// Render as a minimal scandata.xml document
    pub fn to_scandata_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<book>\n  <pageData>\n");
        for page in &self.pages {
            match page.page_type {
                Some(page_type) => xml.push_str(&format!(
                    "    <page leafNum=\"{}\">\n      <pageType>{}</pageType>\n    </page>\n",
                    page.leaf_num, page_type
                )),
                None => xml.push_str(&format!("    <page leafNum=\"{}\"/>\n", page.leaf_num)),
            }
        }
        xml.push_str("  </pageData>\n</book>\n");
        xml
    }
}
