//! Pagination types shared by every list endpoint

use serde::{Deserialize, Serialize};

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    /// Create new pagination parameters
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// One page of results, serialized as
/// `{ data, total, page, per_page, last_page }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub last_page: u32,
}

impl<T> PagedResult<T> {
    /// Create a new paginated result
    pub fn new(data: Vec<T>, total: i64, params: &ListParams) -> Self {
        let per_page = params.per_page.max(1) as i64;
        let last_page = ((total.max(0) + per_page - 1) / per_page).max(1) as u32;
        Self {
            data,
            total,
            page: params.page,
            per_page: params.per_page,
            last_page,
        }
    }

    /// Convert every item, keeping the page metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            last_page: self.last_page,
        }
    }

    /// Check if there is a next page
    pub fn has_next(&self) -> bool {
        self.page < self.last_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_list_params_clamps() {
        let params = ListParams::new(0, 1000);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
        assert_eq!(params.offset(), 0);

        let params = ListParams::new(3, 15);
        assert_eq!(params.offset(), 30);
        assert_eq!(params.limit(), 15);
    }

    #[test]
    fn test_last_page_of_empty_result_is_one() {
        let page: PagedResult<i32> = PagedResult::new(vec![], 0, &ListParams::new(1, 10));
        assert_eq!(page.last_page, 1);
        assert!(!page.has_next());
    }

    #[test]
    fn test_serialized_shape() {
        let page = PagedResult::new(vec![1, 2], 12, &ListParams::new(1, 10));
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["data"], serde_json::json!([1, 2]));
        assert_eq!(json["total"], 12);
        assert_eq!(json["last_page"], 2);
        assert_eq!(json["per_page"], 10);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_last_page_covers_total(total in 0i64..10_000, per_page in 1u32..100) {
            let page: PagedResult<()> = PagedResult::new(vec![], total, &ListParams::new(1, per_page));
            let capacity = page.last_page as i64 * per_page as i64;
            prop_assert!(capacity >= total);
            prop_assert!(capacity - total < per_page as i64 || total == 0);
        }
    }
}
