/// Post handlers - HTTP endpoints for post operations
///
/// Post writes orchestrate the uniqueness guard, the category reconciler
/// and the post-image linker. The independent validations of one write run
/// concurrently and are all awaited before the write decision; a failure in
/// any branch blocks the write without cancelling the others.
use actix_web::{web, HttpResponse};
use chrono::Utc;
use mongodb::Database;

use crate::db::Repo;
use crate::error::{AppError, Result};
use crate::handlers::ListQuery;
use crate::models::{is_html_free, OpenGraph, Post, RecordMeta, SeoData};
use crate::services::uniqueness::{check_unique, UniquenessOutcome};
use crate::services::{CategoryReconciler, ImageLinker};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SeoRequest {
    pub meta_description: String,
    pub meta_keywords: String,
}

#[derive(Debug, Deserialize)]
pub struct PostRequest {
    pub title: String,
    pub slug: String,
    pub short_description: String,
    pub body: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub meta: SeoRequest,
    #[serde(default)]
    pub is_published: bool,
}

impl PostRequest {
    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() || self.slug.trim().is_empty() {
            return Err(AppError::Validation(
                "title and slug are required".to_string(),
            ));
        }
        if !is_html_free(&self.title) {
            return Err(AppError::Validation(
                "title cannot contain HTML tags".to_string(),
            ));
        }
        if self.short_description.trim().is_empty() || self.short_description.len() > 120 {
            return Err(AppError::Validation(
                "short_description is required and must be 120 characters or less".to_string(),
            ));
        }
        if self.body.trim().is_empty() {
            return Err(AppError::Validation("body is required".to_string()));
        }
        if self.meta.meta_description.len() > 160 {
            return Err(AppError::Validation(
                "meta description must be 160 characters or less".to_string(),
            ));
        }
        if !is_html_free(&self.meta.meta_description) || !is_html_free(&self.meta.meta_keywords) {
            return Err(AppError::Validation(
                "meta fields cannot contain HTML tags".to_string(),
            ));
        }
        Ok(())
    }

    fn image_url(&self) -> Result<&str> {
        self.image_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                AppError::Validation(
                    "the post must contain a feature image; please upload one".to_string(),
                )
            })
    }

    /// Build the stored document. The body is sanitized and the Open Graph
    /// title/description mirror the post title and meta description.
    fn into_post(self, header: RecordMeta) -> Post {
        let og = OpenGraph {
            title: self.title.clone(),
            description: self.meta.meta_description.clone(),
            image_url: None,
            url: None,
            og_type: None,
        };
        Post {
            header,
            title: self.title,
            slug: self.slug,
            short_description: self.short_description,
            body: ammonia::clean(&self.body),
            image_url: None,
            responsive_imgs: None,
            blurred_image_url: None,
            image_alt_text: None,
            categories: Vec::new(),
            meta: SeoData {
                meta_description: self.meta.meta_description,
                meta_keywords: self.meta.meta_keywords,
                open_graph: og,
            },
            is_published: self.is_published,
            updated_at: Utc::now(),
        }
    }
}

/// List posts, searching title first and falling back to body.
pub async fn list_posts(
    db: web::Data<Database>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse> {
    let posts = Repo::<Post>::new(db.get_ref());
    let sort = query.sort()?;

    let by_title = posts
        .find_paginated(
            query.search_filter("title"),
            sort.clone(),
            query.page,
            query.page_size,
        )
        .await?;

    if query.search.is_some() && by_title.data.is_empty() {
        let by_body = posts
            .find_paginated(query.search_filter("body"), sort, query.page, query.page_size)
            .await?;
        return Ok(HttpResponse::Ok().json(by_body));
    }

    Ok(HttpResponse::Ok().json(by_title))
}

pub async fn get_post(db: web::Data<Database>, id: web::Path<String>) -> Result<HttpResponse> {
    let posts = Repo::<Post>::new(db.get_ref());
    let post = posts.find_by_id(&id).await?.ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn create_post(
    db: web::Data<Database>,
    req: web::Json<PostRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    req.validate()?;
    let image_url = req.image_url()?.to_string();

    let posts = Repo::<Post>::new(db.get_ref());
    let linker = ImageLinker::new(db.get_ref());
    let reconciler = CategoryReconciler::new(db.get_ref());

    // Structured concurrent validation: every branch completes and is
    // inspected before the write decision.
    let (title_check, slug_check, image, categories) = tokio::join!(
        check_unique(&posts, "title", &req.title, None),
        check_unique(&posts, "slug", &req.slug, None),
        linker.resolve(&image_url),
        reconciler.resolve(&req.categories),
    );

    if title_check?.is_conflict() {
        return Err(AppError::Conflict(
            "a post with this title already exists; please choose a unique title".to_string(),
        ));
    }
    if slug_check?.is_conflict() {
        return Err(AppError::Conflict(
            "a post with this slug already exists".to_string(),
        ));
    }
    let image = image?;
    let categories = categories?;

    let mut post = req.into_post(RecordMeta::new());
    post.categories = categories;
    ImageLinker::apply(&mut post, &image);

    let post = posts.insert_one(post).await?;

    if let Some(post_id) = post.header.id {
        if let Err(err) = linker.bind(&image, post_id).await {
            tracing::warn!(post_id = %post_id, "image back-reference update failed: {}", err);
        }
    }

    Ok(HttpResponse::Created().json(post))
}

pub async fn update_post(
    db: web::Data<Database>,
    id: web::Path<String>,
    req: web::Json<PostRequest>,
) -> Result<HttpResponse> {
    let posts = Repo::<Post>::new(db.get_ref());
    let existing = posts.find_by_id(&id).await?.ok_or(AppError::NotFound)?;
    let existing_id = existing
        .header
        .id
        .ok_or_else(|| AppError::Internal("post has no identity".to_string()))?;

    let req = req.into_inner();
    req.validate()?;
    let image_url = req.image_url()?.to_string();

    let linker = ImageLinker::new(db.get_ref());
    let reconciler = CategoryReconciler::new(db.get_ref());

    let (title_check, slug_check, categories) = tokio::join!(
        check_unique(&posts, "title", &req.title, Some(existing_id)),
        check_unique(&posts, "slug", &req.slug, Some(existing_id)),
        reconciler.resolve(&req.categories),
    );

    if matches!(title_check?, UniquenessOutcome::Conflict) {
        return Err(AppError::Conflict(
            "a post with this title already exists; please choose a unique title".to_string(),
        ));
    }
    if matches!(slug_check?, UniquenessOutcome::Conflict) {
        return Err(AppError::Conflict(
            "a post with this slug already exists".to_string(),
        ));
    }
    let categories = categories?;

    let mut post = req.into_post(existing.header.clone());
    post.categories = categories;

    if existing.image_url.as_deref() == Some(image_url.as_str()) {
        // unchanged reference: carry the previously copied derived fields
        post.image_url = existing.image_url;
        post.responsive_imgs = existing.responsive_imgs;
        post.blurred_image_url = existing.blurred_image_url;
        post.image_alt_text = existing.image_alt_text;
        post.meta.open_graph.image_url = existing.meta.open_graph.image_url;
    } else {
        // new reference: resolve-and-copy against it; the old image's
        // back-reference is not cleared here (eventual consistency)
        let image = linker.resolve(&image_url).await?;
        ImageLinker::apply(&mut post, &image);
        if let Err(err) = linker.bind(&image, existing_id).await {
            tracing::warn!(post_id = %existing_id, "image back-reference update failed: {}", err);
        }
    }

    posts.replace_by_id(existing_id, &post).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn delete_post(db: web::Data<Database>, id: web::Path<String>) -> Result<HttpResponse> {
    let posts = Repo::<Post>::new(db.get_ref());
    let post = posts.find_by_id(&id).await?.ok_or(AppError::NotFound)?;
    let post_id = post
        .header
        .id
        .ok_or_else(|| AppError::Internal("post has no identity".to_string()))?;

    posts.delete_by_id(post_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PostRequest {
        PostRequest {
            title: "A post".to_string(),
            slug: "a-post".to_string(),
            short_description: "short".to_string(),
            body: "<p>hello</p><script>alert(1)</script>".to_string(),
            image_url: Some("https://res.cloudinary.com/demo/image/upload/blog/x".to_string()),
            categories: Vec::new(),
            meta: SeoRequest {
                meta_description: "desc".to_string(),
                meta_keywords: "kw".to_string(),
            },
            is_published: false,
        }
    }

    #[test]
    fn test_validate_rejects_html_title() {
        let mut req = request();
        req.title = "<b>bold</b>".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_long_short_description() {
        let mut req = request();
        req.short_description = "x".repeat(121);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_missing_image_reference_is_rejected() {
        let mut req = request();
        req.image_url = None;
        assert!(req.image_url().is_err());
    }

    #[test]
    fn test_into_post_sanitizes_body_and_mirrors_open_graph() {
        let post = request().into_post(RecordMeta::new());
        assert!(post.body.contains("<p>hello</p>"));
        assert!(!post.body.contains("<script>"));
        assert_eq!(post.meta.open_graph.title, "A post");
        assert_eq!(post.meta.open_graph.description, "desc");
    }
}
