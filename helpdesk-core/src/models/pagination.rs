//! Page-number pagination for list endpoints

use serde::{Deserialize, Serialize};

/// Hard ceiling on page size
const MAX_PER_PAGE: u32 = 100;

const DEFAULT_PER_PAGE: u32 = 20;

/// A requested page, already clamped to sane bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-indexed
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    /// Page is clamped to >= 1, page size to 1..=100.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }

    /// Wrap one page of rows together with the overall row count.
    pub fn wrap<T>(&self, items: Vec<T>, total: i64) -> Paginated<T> {
        Paginated {
            items,
            total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, DEFAULT_PER_PAGE)
    }
}

/// Paginated response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    /// Row count across all pages
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Paginated<T> {
    /// Convert each item, keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }

    pub fn total_pages(&self) -> i64 {
        let per_page = self.per_page.max(1) as i64;
        ((self.total + per_page - 1) / per_page).max(1)
    }

    pub fn has_next(&self) -> bool {
        (self.page as i64) < self.total_pages()
    }
}

/// `?page=&per_page=` query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl From<PaginationParams> for Pagination {
    fn from(params: PaginationParams) -> Self {
        Self::new(
            params.page.unwrap_or(1),
            params.per_page.unwrap_or(DEFAULT_PER_PAGE),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_follows_page() {
        assert_eq!(Pagination::new(1, 10).offset(), 0);
        assert_eq!(Pagination::new(3, 25).offset(), 50);
    }

    #[test]
    fn clamps_bounds() {
        let p = Pagination::new(0, 0);
        assert_eq!((p.page, p.per_page), (1, 1));
        assert_eq!(Pagination::new(1, 500).per_page, 100);
    }

    #[test]
    fn defaults_from_empty_params() {
        let p = Pagination::from(PaginationParams::default());
        assert_eq!(p, Pagination::new(1, 20));
    }

    #[test]
    fn page_math() {
        let empty: Paginated<()> = Pagination::new(1, 10).wrap(vec![], 0);
        assert_eq!(empty.total_pages(), 1);
        assert!(!empty.has_next());

        let page: Paginated<u8> = Pagination::new(2, 10).wrap(vec![1, 2], 25);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());

        let doubled = page.map(|n| n * 2);
        assert_eq!(doubled.items, vec![2, 4]);
        assert_eq!(doubled.total, 25);
    }
}
