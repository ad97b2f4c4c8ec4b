/// Page handlers - static pages keyed by slug
///
/// Pages are addressed by slug in the URL, not by identity; lookups go
/// through `find_one` on the slug field.
use actix_web::{web, HttpResponse};
use chrono::Utc;
use mongodb::bson::doc;
use mongodb::Database;
use serde::Deserialize;
use std::collections::HashMap;

use crate::db::Repo;
use crate::error::{AppError, Result};
use crate::handlers::ListQuery;
use crate::models::{is_html_free, Page, RecordMeta, SeoData};
use crate::services::uniqueness::ensure_unique;

#[derive(Debug, Deserialize)]
pub struct PageRequest {
    pub slug: String,
    #[serde(default)]
    pub page_fields: HashMap<String, String>,
    pub meta: SeoData,
    pub image: Option<String>,
}

impl PageRequest {
    fn validate(&self) -> Result<()> {
        if self.slug.trim().is_empty() {
            return Err(AppError::Validation("slug is required".to_string()));
        }
        if !is_html_free(&self.slug) {
            return Err(AppError::Validation(
                "slug cannot contain HTML tags".to_string(),
            ));
        }
        if self.meta.meta_description.len() > 160 {
            return Err(AppError::Validation(
                "meta description must be 160 characters or less".to_string(),
            ));
        }
        Ok(())
    }

    fn into_page(self, header: RecordMeta) -> Page {
        Page {
            header,
            slug: self.slug,
            page_fields: self.page_fields,
            meta: self.meta,
            image: self.image,
            updated_at: Utc::now(),
        }
    }
}

pub async fn list_pages(
    db: web::Data<Database>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse> {
    let pages = Repo::<Page>::new(db.get_ref());
    let page = pages
        .find_paginated(
            query.search_filter("slug"),
            query.sort()?,
            query.page,
            query.page_size,
        )
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_page(db: web::Data<Database>, slug: web::Path<String>) -> Result<HttpResponse> {
    let pages = Repo::<Page>::new(db.get_ref());
    let page = pages
        .find_one(doc! { "slug": slug.as_str() })
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn create_page(
    db: web::Data<Database>,
    req: web::Json<PageRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    req.validate()?;

    let pages = Repo::<Page>::new(db.get_ref());
    ensure_unique(&pages, "slug", &req.slug, None, "this page already exists").await?;

    let page = pages.insert_one(req.into_page(RecordMeta::new())).await?;
    Ok(HttpResponse::Created().json(page))
}

pub async fn update_page(
    db: web::Data<Database>,
    slug: web::Path<String>,
    req: web::Json<PageRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    req.validate()?;

    let pages = Repo::<Page>::new(db.get_ref());
    let existing = pages
        .find_one(doc! { "slug": slug.as_str() })
        .await?
        .ok_or(AppError::NotFound)?;
    let existing_id = existing
        .header
        .id
        .ok_or_else(|| AppError::Internal("page has no identity".to_string()))?;

    ensure_unique(
        &pages,
        "slug",
        &req.slug,
        Some(existing_id),
        "this page already exists",
    )
    .await?;

    let page = req.into_page(existing.header);
    pages.replace_by_id(existing_id, &page).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn delete_page(db: web::Data<Database>, slug: web::Path<String>) -> Result<HttpResponse> {
    let pages = Repo::<Page>::new(db.get_ref());
    let page = pages
        .find_one(doc! { "slug": slug.as_str() })
        .await?
        .ok_or(AppError::NotFound)?;
    let page_id = page
        .header
        .id
        .ok_or_else(|| AppError::Internal("page has no identity".to_string()))?;

    pages.delete_by_id(page_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OpenGraph;

    fn request(slug: &str) -> PageRequest {
        PageRequest {
            slug: slug.to_string(),
            page_fields: HashMap::new(),
            meta: SeoData {
                meta_description: "about".to_string(),
                meta_keywords: "blog".to_string(),
                open_graph: OpenGraph {
                    title: "About".to_string(),
                    description: "about".to_string(),
                    image_url: None,
                    url: None,
                    og_type: None,
                },
            },
            image: None,
        }
    }

    #[test]
    fn test_validate_requires_slug() {
        assert!(request("about").validate().is_ok());
        assert!(request("  ").validate().is_err());
        assert!(request("<x>").validate().is_err());
    }

    #[test]
    fn test_into_page_carries_fields() {
        let mut req = request("about");
        req.page_fields.insert("headline".to_string(), "Hi".to_string());
        let page = req.into_page(RecordMeta::new());
        assert_eq!(page.slug, "about");
        assert_eq!(page.page_fields.get("headline").map(String::as_str), Some("Hi"));
    }
}
