/// Post-image linker
///
/// A post's image reference must resolve to an uploaded image; on link the
/// image's derived fields are copied onto the post, and on image delete the
/// referencing post is put back into a valid state before the image
/// document goes away.
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;

use crate::db::Repo;
use crate::error::{AppError, Result};
use crate::models::{ImageAsset, Post};

pub struct ImageLinker {
    images: Repo<ImageAsset>,
    posts: Repo<Post>,
}

impl ImageLinker {
    pub fn new(db: &Database) -> Self {
        Self {
            images: Repo::new(db),
            posts: Repo::new(db),
        }
    }

    /// Resolve an image reference by exact secure-URL match.
    pub async fn resolve(&self, image_url: &str) -> Result<ImageAsset> {
        self.images
            .find_one(doc! { "secure_url": image_url })
            .await?
            .ok_or_else(|| {
                AppError::InvalidImageReference(
                    "the image link must come from an uploaded image; use /images to upload one and use the secure URL it returns".to_string(),
                )
            })
    }

    /// Copy the image's derived fields onto the post.
    pub fn apply(post: &mut Post, image: &ImageAsset) {
        post.image_url = Some(image.secure_url.clone());
        post.responsive_imgs = Some(image.responsive_urls.clone());
        post.blurred_image_url = Some(image.blurred_image_url.clone());
        post.image_alt_text = Some(image.name.clone());
        post.meta.open_graph.image_url = Some(image.secure_url.clone());
    }

    /// Point the image back at the post using it. On post update the old
    /// image's back-reference is left as-is; eventual consistency is
    /// accepted there.
    pub async fn bind(&self, image: &ImageAsset, post_id: ObjectId) -> Result<()> {
        let image_id = image
            .header
            .id
            .ok_or_else(|| AppError::Internal("image has no identity".to_string()))?;
        self.images
            .update_one(
                doc! { "_id": image_id },
                doc! { "$set": { "used_in_post": post_id } },
            )
            .await?;
        Ok(())
    }

    /// Reverse the link before an image is deleted: clear the referencing
    /// post's image fields and persist it, so no dangling reference
    /// survives the delete. Returns the unlinked post's id, if any.
    pub async fn unlink_before_delete(&self, image: &ImageAsset) -> Result<Option<ObjectId>> {
        let found = self
            .posts
            .find_one(doc! { "image_url": &image.secure_url })
            .await?;

        let Some(mut post) = found else {
            return Ok(None);
        };
        let post_id = post
            .header
            .id
            .ok_or_else(|| AppError::Internal("post has no identity".to_string()))?;

        clear_image_fields(&mut post);
        self.posts.replace_by_id(post_id, &post).await?;
        tracing::debug!(post_id = %post_id, image = %image.name, "cleared image fields on referencing post");
        Ok(Some(post_id))
    }
}

/// Null out every image-derived field on the post.
pub fn clear_image_fields(post: &mut Post) {
    post.image_url = None;
    post.responsive_imgs = None;
    post.blurred_image_url = None;
    post.image_alt_text = None;
    post.meta.open_graph.image_url = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OpenGraph, RecordMeta, ResponsiveUrl, SeoData};
    use chrono::Utc;

    fn post() -> Post {
        Post {
            header: RecordMeta::new(),
            title: "Title".to_string(),
            slug: "title".to_string(),
            short_description: "short".to_string(),
            body: "<p>body</p>".to_string(),
            image_url: None,
            responsive_imgs: None,
            blurred_image_url: None,
            image_alt_text: None,
            categories: Vec::new(),
            meta: SeoData {
                meta_description: "desc".to_string(),
                meta_keywords: "kw".to_string(),
                open_graph: OpenGraph {
                    title: "Title".to_string(),
                    description: "desc".to_string(),
                    image_url: None,
                    url: None,
                    og_type: None,
                },
            },
            is_published: false,
            updated_at: Utc::now(),
        }
    }

    fn image() -> ImageAsset {
        ImageAsset {
            header: RecordMeta {
                id: Some(ObjectId::new()),
                created_at: Utc::now(),
            },
            name: "cover".to_string(),
            public_id: "blog/cover".to_string(),
            version: 1,
            signature: "sig".to_string(),
            width: 2400,
            height: 1600,
            format: "webp".to_string(),
            bytes: 1024,
            url: "http://res.cloudinary.com/demo/image/upload/blog/cover".to_string(),
            secure_url: "https://res.cloudinary.com/demo/image/upload/blog/cover".to_string(),
            responsive_urls: vec![ResponsiveUrl {
                width: 512,
                url: "https://res.cloudinary.com/demo/image/upload/q_70,w_512,c_limit/blog/cover"
                    .to_string(),
            }],
            thumbnail_url: "thumb".to_string(),
            blurred_image_url: "data:image/webp;base64,AAAA".to_string(),
            alt_text: String::new(),
            used_in_post: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_apply_copies_derived_fields() {
        let mut p = post();
        let img = image();
        ImageLinker::apply(&mut p, &img);

        assert_eq!(p.image_url.as_deref(), Some(img.secure_url.as_str()));
        assert_eq!(p.responsive_imgs.as_ref().unwrap(), &img.responsive_urls);
        assert_eq!(
            p.blurred_image_url.as_deref(),
            Some(img.blurred_image_url.as_str())
        );
        assert_eq!(p.image_alt_text.as_deref(), Some("cover"));
        assert_eq!(
            p.meta.open_graph.image_url.as_deref(),
            Some(img.secure_url.as_str())
        );
    }

    #[test]
    fn test_clear_reverses_apply() {
        let mut p = post();
        ImageLinker::apply(&mut p, &image());
        clear_image_fields(&mut p);

        assert!(p.image_url.is_none());
        assert!(p.responsive_imgs.is_none());
        assert!(p.blurred_image_url.is_none());
        assert!(p.image_alt_text.is_none());
        assert!(p.meta.open_graph.image_url.is_none());
    }
}
