/// HTTP handlers for blog-api
pub mod categories;
pub mod images;
pub mod pages;
pub mod posts;
pub mod subscribers;

use mongodb::bson::{doc, Document};
use serde::Deserialize;

use crate::error::{AppError, Result};

/// Query parameters shared by every list endpoint.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<String>,
    pub page: Option<i64>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<i64>,
}

impl ListQuery {
    /// Sort on creation time; newest first unless asked otherwise.
    pub fn sort(&self) -> Result<Document> {
        match self.sort_order.as_deref() {
            Some("asc") => Ok(doc! { "created_at": 1 }),
            Some("desc") | None => Ok(doc! { "created_at": -1 }),
            Some(other) => Err(AppError::Validation(format!(
                "sortOrder must be 'asc' or 'desc', got '{}'",
                other
            ))),
        }
    }

    /// Case-insensitive substring filter on one field, or an empty filter
    /// when no search term was given.
    pub fn search_filter(&self, field: &str) -> Document {
        match self.search.as_deref().filter(|s| !s.is_empty()) {
            Some(term) => doc! { field: { "$regex": regex::escape(term), "$options": "i" } },
            None => doc! {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(sort_order: Option<&str>, search: Option<&str>) -> ListQuery {
        ListQuery {
            search: search.map(String::from),
            sort_order: sort_order.map(String::from),
            page: None,
            page_size: None,
        }
    }

    #[test]
    fn test_sort_defaults_to_newest_first() {
        assert_eq!(query(None, None).sort().unwrap(), doc! { "created_at": -1 });
        assert_eq!(
            query(Some("asc"), None).sort().unwrap(),
            doc! { "created_at": 1 }
        );
    }

    #[test]
    fn test_sort_rejects_unknown_order() {
        assert!(query(Some("sideways"), None).sort().is_err());
    }

    #[test]
    fn test_search_filter_escapes_regex_metacharacters() {
        let filter = query(None, Some("c++ (notes)")).search_filter("title");
        let inner = filter.get_document("title").unwrap();
        let pattern = inner.get_str("$regex").unwrap();
        assert!(pattern.contains(r"c\+\+"));
        assert!(pattern.contains(r"\(notes\)"));
    }

    #[test]
    fn test_empty_search_means_match_all() {
        assert_eq!(query(None, None).search_filter("title"), doc! {});
        assert_eq!(query(None, Some("")).search_filter("title"), doc! {});
    }
}
