/// Category handlers - HTTP endpoints for category operations
///
/// Renames and deletes cascade to the denormalized name copies on posts via
/// the category reconciler.
use actix_web::{web, HttpResponse};
use mongodb::Database;
use serde::Deserialize;

use crate::db::Repo;
use crate::error::{AppError, Result};
use crate::handlers::ListQuery;
use crate::models::{is_html_free, Category};
use crate::services::uniqueness::ensure_unique;
use crate::services::CategoryReconciler;

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

impl CategoryRequest {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }
        if !is_html_free(&self.name) {
            return Err(AppError::Validation(
                "name cannot contain HTML tags".to_string(),
            ));
        }
        Ok(())
    }
}

pub async fn list_categories(
    db: web::Data<Database>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse> {
    let categories = Repo::<Category>::new(db.get_ref());
    let page = categories
        .find_paginated(
            query.search_filter("name"),
            query.sort()?,
            query.page,
            query.page_size,
        )
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_category(
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let categories = Repo::<Category>::new(db.get_ref());
    let category = categories.find_by_id(&id).await?.ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().json(category))
}

pub async fn create_category(
    db: web::Data<Database>,
    req: web::Json<CategoryRequest>,
) -> Result<HttpResponse> {
    req.validate()?;

    let categories = Repo::<Category>::new(db.get_ref());
    ensure_unique(
        &categories,
        "name",
        &req.name,
        None,
        "this category already exists",
    )
    .await?;

    let category = categories.insert_one(Category::new(req.name.clone())).await?;
    Ok(HttpResponse::Created().json(category))
}

pub async fn update_category(
    db: web::Data<Database>,
    id: web::Path<String>,
    req: web::Json<CategoryRequest>,
) -> Result<HttpResponse> {
    req.validate()?;

    let categories = Repo::<Category>::new(db.get_ref());
    let category = categories.find_by_id(&id).await?.ok_or(AppError::NotFound)?;

    ensure_unique(
        &categories,
        "name",
        &req.name,
        category.header.id,
        "this category already exists",
    )
    .await?;

    let reconciler = CategoryReconciler::new(db.get_ref());
    reconciler.rename(category, req.name.clone()).await?;

    Ok(HttpResponse::NoContent().finish())
}

pub async fn delete_category(
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let categories = Repo::<Category>::new(db.get_ref());
    let category = categories.find_by_id(&id).await?.ok_or(AppError::NotFound)?;

    let reconciler = CategoryReconciler::new(db.get_ref());
    reconciler.delete(&category).await?;

    Ok(HttpResponse::NoContent().finish())
}
