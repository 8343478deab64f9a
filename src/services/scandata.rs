//! Initial scandata for a new item

use crate::models::{PageData, PageRecord, PageType};

/// The third image is the title page; the first two are cover sheets
pub const TITLE_PAGE_INDEX: usize = 2;

/// One page per image, in leaf order
pub fn init_page_data(num_images: usize) -> PageData {
    let pages = (0..num_images)
        .map(|leaf_num| PageRecord {
            leaf_num,
            page_type: (leaf_num == TITLE_PAGE_INDEX).then_some(PageType::Title),
        })
        .collect();
    PageData { pages }
}
