/// Image handlers - upload, lookup and deletion
///
/// Upload runs the full derivation pipeline synchronously (on the blocking
/// pool) before anything is persisted: a derivation failure aborts the
/// request with no image document and no host asset. The reverse ordering
/// on delete goes through the post-image linker so no post keeps a
/// dangling reference.
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use chrono::Utc;
use mongodb::Database;
use serde::Deserialize;
use std::sync::Arc;

use crate::db::Repo;
use crate::error::{AppError, Result};
use crate::handlers::ListQuery;
use crate::models::{ImageAsset, RecordMeta};
use crate::services::pipeline::{DEFAULT_MAX_WIDTH, DEFAULT_QUALITY, DEFAULT_WIDTHS};
use crate::services::uniqueness::ensure_unique;
use crate::services::{CloudinaryClient, DerivationOptions, DerivationPipeline, ImageLinker};

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
    pub folder: Option<String>,
    /// Comma-separated responsive widths, e.g. "512,1024".
    pub widths: Option<String>,
    #[serde(rename = "maxWidth")]
    pub max_width: Option<u32>,
    pub quality: Option<u8>,
}

fn parse_widths(raw: &str) -> Result<Vec<u32>> {
    raw.split(',')
        .map(|part| {
            part.trim().parse::<u32>().map_err(|_| {
                AppError::Validation(
                    "widths should be a list of comma separated ints".to_string(),
                )
            })
        })
        .collect()
}

pub async fn list_images(
    db: web::Data<Database>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse> {
    let images = Repo::<ImageAsset>::new(db.get_ref());
    let page = images
        .find_paginated(
            query.search_filter("name"),
            query.sort()?,
            query.page,
            query.page_size,
        )
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_image(db: web::Data<Database>, id: web::Path<String>) -> Result<HttpResponse> {
    let images = Repo::<ImageAsset>::new(db.get_ref());
    let image = images.find_by_id(&id).await?.ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().json(image))
}

/// Upload an image: derive renditions, store the canonical at the host,
/// persist the image document.
pub async fn upload_image(
    req: HttpRequest,
    body: web::Bytes,
    query: web::Query<UploadQuery>,
    db: web::Data<Database>,
    pipeline: web::Data<Arc<DerivationPipeline>>,
    cloudinary: web::Data<CloudinaryClient>,
) -> Result<HttpResponse> {
    let filename = query
        .filename
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            AppError::Validation("please pass the asset filename in the query string".to_string())
        })?;
    let folder = query
        .folder
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            AppError::Validation(
                "please pass the destination folder name in the query string".to_string(),
            )
        })?;

    let quality = query.quality.unwrap_or(DEFAULT_QUALITY);
    if quality > 100 {
        return Err(AppError::Validation(
            "quality should be an integer between 0 and 100".to_string(),
        ));
    }
    let widths = match query.widths.as_deref() {
        Some(raw) => parse_widths(raw)?,
        None => DEFAULT_WIDTHS.to_vec(),
    };

    if body.is_empty() {
        return Err(AppError::Validation(
            "the request body must contain the image bytes".to_string(),
        ));
    }
    let content_type = req.content_type().to_string();
    if content_type.is_empty() {
        return Err(AppError::UnsupportedMediaType(
            "missing Content-Type header".to_string(),
        ));
    }

    let images = Repo::<ImageAsset>::new(db.get_ref());
    ensure_unique(
        &images,
        "name",
        filename,
        None,
        &format!(
            "the image with filename '{}' already exists; please choose a different name",
            filename
        ),
    )
    .await?;

    let options = DerivationOptions {
        max_width: query.max_width.unwrap_or(DEFAULT_MAX_WIDTH),
        widths,
        quality,
        folder: folder.to_string(),
        name: filename.to_string(),
    };
    let derived = pipeline
        .get_ref()
        .clone()
        .derive_async(body, content_type, options)
        .await?;

    let public_id = format!("{}/{}", folder, filename);
    let receipt = cloudinary.upload(&derived.data_url, &public_id).await?;

    let name = receipt
        .public_id
        .rsplit('/')
        .next()
        .unwrap_or(&receipt.public_id)
        .to_string();

    let image = ImageAsset {
        header: RecordMeta::new(),
        name,
        public_id: receipt.public_id,
        version: receipt.version,
        signature: receipt.signature,
        width: receipt.width,
        height: receipt.height,
        format: receipt.format,
        bytes: receipt.bytes,
        url: receipt.url,
        secure_url: receipt.secure_url,
        responsive_urls: derived.responsive_urls,
        thumbnail_url: derived.thumbnail_url,
        blurred_image_url: derived.placeholder_data_url,
        alt_text: String::new(),
        used_in_post: None,
        updated_at: Utc::now(),
    };

    let image = images.insert_one(image).await?;
    Ok(HttpResponse::Created().json(image))
}

/// Delete an image: clear the referencing post first, then remove the
/// document and the host asset.
pub async fn delete_image(db: web::Data<Database>, id: web::Path<String>, cloudinary: web::Data<CloudinaryClient>) -> Result<HttpResponse> {
    let images = Repo::<ImageAsset>::new(db.get_ref());
    let image = images.find_by_id(&id).await?.ok_or(AppError::NotFound)?;
    let image_id = image
        .header
        .id
        .ok_or_else(|| AppError::Internal("image has no identity".to_string()))?;

    let linker = ImageLinker::new(db.get_ref());
    linker.unlink_before_delete(&image).await?;

    images.delete_by_id(image_id).await?;
    cloudinary.delete(&image.public_id).await?;

    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_widths() {
        assert_eq!(parse_widths("512,1024").unwrap(), vec![512, 1024]);
        assert_eq!(parse_widths("512, 718 ,1280").unwrap(), vec![512, 718, 1280]);
    }

    #[test]
    fn test_parse_widths_rejects_garbage() {
        assert!(parse_widths("512,abc").is_err());
        assert!(parse_widths("").is_err());
        assert!(parse_widths("512,,1024").is_err());
    }
}
