use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Sanitized pagination input. `new` clamps out-of-range values, so every
/// constructed instance satisfies `page >= 1` and `1 <= page_size <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u64,
    pub page_size: u64,
}

impl PageParams {
    pub fn new(page: Option<u64>, page_size: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Zero-based page index for the paginator.
    pub fn index(&self) -> u64 {
        self.page - 1
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the metadata needed to walk the full set.
/// `total_count` is the filtered-but-unpaged row count.
#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub page: u64,
    pub page_size: u64,
    pub total_count: u64,
    pub total_pages: u64,
}

impl<T: Serialize> Page<T> {
    pub fn new(items: Vec<T>, params: PageParams, total_count: u64) -> Self {
        Self {
            items,
            page: params.page,
            page_size: params.page_size,
            total_count,
            total_pages: total_count.div_ceil(params.page_size),
        }
    }

    /// Convert the items while keeping the page metadata intact.
    pub fn map<U: Serialize>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_count: self.total_count,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_defaults() {
        let params = PageParams::new(None, None);
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_page_params_clamps_zero_page() {
        let params = PageParams::new(Some(0), Some(10));
        assert_eq!(params.page, 1);
    }

    #[test]
    fn test_page_params_clamps_zero_page_size() {
        let params = PageParams::new(Some(1), Some(0));
        assert_eq!(params.page_size, 1);
    }

    #[test]
    fn test_page_params_clamps_oversized_page_size() {
        let params = PageParams::new(Some(1), Some(1000));
        assert_eq!(params.page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_page_params_passes_valid_values_through() {
        let params = PageParams::new(Some(3), Some(50));
        assert_eq!(params.page, 3);
        assert_eq!(params.page_size, 50);
        assert_eq!(params.index(), 2);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page = Page::new(vec![1, 2], PageParams::new(Some(1), Some(2)), 7);
        assert_eq!(page.total_pages, 4);
    }

    #[test]
    fn test_total_pages_exact_division() {
        let page = Page::new(vec![1, 2], PageParams::new(Some(1), Some(2)), 6);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_empty_result_has_zero_pages() {
        let page: Page<i32> = Page::new(vec![], PageParams::default(), 0);
        assert_eq!(page.total_count, 0);
        assert_eq!(page.total_pages, 0);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_map_preserves_metadata() {
        let page = Page::new(vec![1, 2, 3], PageParams::new(Some(2), Some(3)), 10);
        let mapped = page.map(|n| n.to_string());
        assert_eq!(mapped.items, vec!["1", "2", "3"]);
        assert_eq!(mapped.page, 2);
        assert_eq!(mapped.page_size, 3);
        assert_eq!(mapped.total_count, 10);
        assert_eq!(mapped.total_pages, 4);
    }

    #[test]
    fn test_page_serialization() {
        let page = Page::new(vec!["a", "b"], PageParams::new(Some(1), Some(2)), 5);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["page"], 1);
        assert_eq!(json["page_size"], 2);
        assert_eq!(json["total_count"], 5);
        assert_eq!(json["total_pages"], 3);
        assert_eq!(json["items"].as_array().unwrap().len(), 2);
    }
}
