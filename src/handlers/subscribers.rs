/// Subscriber handlers - HTTP endpoints for newsletter subscribers
use actix_web::{web, HttpResponse};
use chrono::Utc;
use mongodb::Database;
use serde::Deserialize;
use validator::ValidateEmail;

use crate::db::Repo;
use crate::error::{AppError, Result};
use crate::handlers::ListQuery;
use crate::models::{is_html_free, RecordMeta, Subscriber};
use crate::services::uniqueness::ensure_unique;

#[derive(Debug, Deserialize)]
pub struct SubscriberRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl SubscriberRequest {
    fn validate(&self) -> Result<()> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(AppError::Validation(
                "first_name and last_name are required".to_string(),
            ));
        }
        if !is_html_free(&self.first_name) || !is_html_free(&self.last_name) {
            return Err(AppError::Validation(
                "names cannot contain HTML tags".to_string(),
            ));
        }
        if !self.email.validate_email() {
            return Err(AppError::Validation(
                "provided email address is not valid".to_string(),
            ));
        }
        Ok(())
    }

    fn into_subscriber(self, header: RecordMeta) -> Subscriber {
        Subscriber {
            header,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            updated_at: Utc::now(),
        }
    }
}

pub async fn list_subscribers(
    db: web::Data<Database>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse> {
    let subscribers = Repo::<Subscriber>::new(db.get_ref());
    let page = subscribers
        .find_paginated(
            query.search_filter("email"),
            query.sort()?,
            query.page,
            query.page_size,
        )
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_subscriber(
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let subscribers = Repo::<Subscriber>::new(db.get_ref());
    let subscriber = subscribers.find_by_id(&id).await?.ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().json(subscriber))
}

pub async fn create_subscriber(
    db: web::Data<Database>,
    req: web::Json<SubscriberRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    req.validate()?;

    let subscribers = Repo::<Subscriber>::new(db.get_ref());
    ensure_unique(
        &subscribers,
        "email",
        &req.email,
        None,
        "a subscriber with this email address already exists",
    )
    .await?;

    let subscriber = subscribers
        .insert_one(req.into_subscriber(RecordMeta::new()))
        .await?;
    Ok(HttpResponse::Created().json(subscriber))
}

pub async fn update_subscriber(
    db: web::Data<Database>,
    id: web::Path<String>,
    req: web::Json<SubscriberRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    req.validate()?;

    let subscribers = Repo::<Subscriber>::new(db.get_ref());
    let existing = subscribers.find_by_id(&id).await?.ok_or(AppError::NotFound)?;
    let existing_id = existing
        .header
        .id
        .ok_or_else(|| AppError::Internal("subscriber has no identity".to_string()))?;

    ensure_unique(
        &subscribers,
        "email",
        &req.email,
        Some(existing_id),
        "a subscriber with this email address already exists",
    )
    .await?;

    let subscriber = req.into_subscriber(existing.header);
    subscribers.replace_by_id(existing_id, &subscriber).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn delete_subscriber(
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let subscribers = Repo::<Subscriber>::new(db.get_ref());
    let subscriber = subscribers.find_by_id(&id).await?.ok_or(AppError::NotFound)?;
    let subscriber_id = subscriber
        .header
        .id
        .ok_or_else(|| AppError::Internal("subscriber has no identity".to_string()))?;

    subscribers.delete_by_id(subscriber_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str) -> SubscriberRequest {
        SubscriberRequest {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_email() {
        assert!(request("ada@example.com").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_email() {
        assert!(request("not-an-email").validate().is_err());
        assert!(request("@example.com").validate().is_err());
        assert!(request("").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_html_names() {
        let mut req = request("ada@example.com");
        req.first_name = "<i>Ada</i>".to_string();
        assert!(req.validate().is_err());
    }
}
