//! Page-number pagination.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 500;

/// `?pageNum=&pageSize=` as sent by the admin UI. Page numbers start at 1.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub page_num: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageParams {
    pub fn limit(&self) -> i64 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page_num.unwrap_or(1).max(1) - 1) * self.limit()
    }
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub list: Vec<T>,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page() {
        let p = PageParams::default();
        assert_eq!(p.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let p = PageParams {
            page_num: Some(0),
            page_size: Some(100_000),
        };
        assert_eq!(p.limit(), MAX_PAGE_SIZE);
        assert_eq!(p.offset(), 0);

        let p = PageParams {
            page_num: Some(3),
            page_size: Some(20),
        };
        assert_eq!(p.offset(), 40);
    }
}
