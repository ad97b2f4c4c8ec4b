/// Pagination engine
///
/// Computes a bounded result window and page-count metadata from a filter,
/// sort order and optional 1-based page number / page size. When either
/// parameter is absent pagination is disabled and the full filtered, sorted
/// result set is returned with no page metadata.
use mongodb::bson::Document;
use mongodb::options::FindOptions;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::Record;

use super::Repo;

/// The skip/limit window and page count for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub skip: u64,
    pub limit: i64,
    pub total_pages: u64,
}

impl PageWindow {
    /// Compute the window for a 1-based page. Zero or negative page/size
    /// values are rejected rather than clamped.
    pub fn compute(total: u64, page: i64, page_size: i64) -> Result<Self> {
        if page < 1 || page_size < 1 {
            return Err(AppError::Validation(
                "page and pageSize must be positive integers".to_string(),
            ));
        }
        let size = page_size as u64;
        let total_pages = (total + size - 1) / size;
        Ok(Self {
            skip: (page as u64 - 1) * size,
            limit: page_size,
            total_pages,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PagedData<T> {
    pub data: Vec<T>,
    pub has_pagination: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_documents: Option<u64>,
}

impl<T: Record> Repo<T> {
    /// Filtered, sorted find with optional pagination. The total matching
    /// count is computed first; the window then skips `(page-1)*pageSize`
    /// documents and takes `pageSize`.
    pub async fn find_paginated(
        &self,
        filter: Document,
        sort: Document,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> Result<PagedData<T>> {
        match (page, page_size) {
            (Some(page), Some(page_size)) => {
                let total = self.count(filter.clone()).await?;
                let window = PageWindow::compute(total, page, page_size)?;
                let options = FindOptions::builder()
                    .sort(sort)
                    .skip(window.skip)
                    .limit(window.limit)
                    .build();
                let data = self.filter_by(filter, options).await?;
                Ok(PagedData {
                    data,
                    has_pagination: true,
                    page: Some(page),
                    page_size: Some(page_size),
                    total_pages: Some(window.total_pages),
                    total_documents: Some(total),
                })
            }
            _ => {
                let options = FindOptions::builder().sort(sort).build();
                let data = self.filter_by(filter, options).await?;
                Ok(PagedData {
                    data,
                    has_pagination: false,
                    page: None,
                    page_size: None,
                    total_pages: None,
                    total_documents: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_first_page() {
        let w = PageWindow::compute(25, 1, 10).unwrap();
        assert_eq!(w.skip, 0);
        assert_eq!(w.limit, 10);
        assert_eq!(w.total_pages, 3);
    }

    #[test]
    fn test_window_last_partial_page() {
        let w = PageWindow::compute(25, 3, 10).unwrap();
        assert_eq!(w.skip, 20);
        assert_eq!(w.total_pages, 3);
    }

    #[test]
    fn test_window_exact_division() {
        let w = PageWindow::compute(20, 2, 10).unwrap();
        assert_eq!(w.skip, 10);
        assert_eq!(w.total_pages, 2);
    }

    #[test]
    fn test_window_empty_collection() {
        let w = PageWindow::compute(0, 1, 10).unwrap();
        assert_eq!(w.total_pages, 0);
        assert_eq!(w.skip, 0);
    }

    #[test]
    fn test_window_rejects_non_positive_values() {
        assert!(PageWindow::compute(25, 0, 10).is_err());
        assert!(PageWindow::compute(25, 1, 0).is_err());
        assert!(PageWindow::compute(25, -1, 10).is_err());
        assert!(PageWindow::compute(25, 1, -5).is_err());
    }
}
