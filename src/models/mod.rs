/// Data models for blog-api
///
/// Every stored entity embeds a [`RecordMeta`] header (identity + creation
/// time) by composition; the [`Record`] trait exposes the header and the
/// collection name to the generic repository. Category names and image
/// derived fields are denormalized copies on the post, not live foreign
/// keys, and are kept coherent by explicit cascades.
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;

/// Common record header shared by all stored entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMeta {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl RecordMeta {
    pub fn new() -> Self {
        Self {
            id: None,
            created_at: Utc::now(),
        }
    }
}

impl Default for RecordMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability over the record header, used by the generic repository.
pub trait Record: Serialize + DeserializeOwned + Unpin + Send + Sync {
    const COLLECTION: &'static str;

    fn header(&self) -> &RecordMeta;
    fn header_mut(&mut self) -> &mut RecordMeta;
}

/// A (width, URL) responsive rendition of an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsiveUrl {
    pub width: u32,
    pub url: String,
}

/// Category entry on a post: identity plus a denormalized name copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: ObjectId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenGraph {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub og_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeoData {
    pub meta_description: String,
    pub meta_keywords: String,
    pub open_graph: OpenGraph,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    #[serde(flatten)]
    pub header: RecordMeta,
    pub title: String,
    pub slug: String,
    pub short_description: String,
    /// HTML body, sanitized before every write.
    pub body: String,
    pub image_url: Option<String>,
    pub responsive_imgs: Option<Vec<ResponsiveUrl>>,
    pub blurred_image_url: Option<String>,
    pub image_alt_text: Option<String>,
    #[serde(default)]
    pub categories: Vec<CategoryRef>,
    pub meta: SeoData,
    #[serde(default)]
    pub is_published: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Record for Post {
    const COLLECTION: &'static str = "Posts";

    fn header(&self) -> &RecordMeta {
        &self.header
    }
    fn header_mut(&mut self) -> &mut RecordMeta {
        &mut self.header
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(flatten)]
    pub header: RecordMeta,
    pub name: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn new(name: String) -> Self {
        Self {
            header: RecordMeta::new(),
            name,
            updated_at: Utc::now(),
        }
    }
}

impl Record for Category {
    const COLLECTION: &'static str = "Categories";

    fn header(&self) -> &RecordMeta {
        &self.header
    }
    fn header_mut(&mut self) -> &mut RecordMeta {
        &mut self.header
    }
}

/// An uploaded image: host identifiers plus the derived renditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAsset {
    #[serde(flatten)]
    pub header: RecordMeta,
    pub name: String,
    pub public_id: String,
    pub version: u64,
    pub signature: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub bytes: u64,
    pub url: String,
    pub secure_url: String,
    #[serde(default)]
    pub responsive_urls: Vec<ResponsiveUrl>,
    pub thumbnail_url: String,
    /// Inline base64 data URL, renderable without a network round-trip.
    pub blurred_image_url: String,
    #[serde(default)]
    pub alt_text: String,
    /// Identity of the post currently using this image, if any.
    pub used_in_post: Option<ObjectId>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Record for ImageAsset {
    const COLLECTION: &'static str = "Images";

    fn header(&self) -> &RecordMeta {
        &self.header
    }
    fn header_mut(&mut self) -> &mut RecordMeta {
        &mut self.header
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    #[serde(flatten)]
    pub header: RecordMeta,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Record for Subscriber {
    const COLLECTION: &'static str = "Subscribers";

    fn header(&self) -> &RecordMeta {
        &self.header
    }
    fn header_mut(&mut self) -> &mut RecordMeta {
        &mut self.header
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    #[serde(flatten)]
    pub header: RecordMeta,
    pub slug: String,
    pub page_fields: HashMap<String, String>,
    pub meta: SeoData,
    pub image: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Record for Page {
    const COLLECTION: &'static str = "Pages";

    fn header(&self) -> &RecordMeta {
        &self.header
    }
    fn header_mut(&mut self) -> &mut RecordMeta {
        &mut self.header
    }
}

/// Fields like titles and names must not contain HTML tags.
pub fn is_html_free(value: &str) -> bool {
    !value.contains('<') && !value.contains('>')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_free_fields() {
        assert!(is_html_free("Plain title"));
        assert!(!is_html_free("<script>alert(1)</script>"));
        assert!(!is_html_free("1 > 0"));
    }

    #[test]
    fn test_record_meta_serializes_without_id() {
        let meta = RecordMeta::new();
        let doc = mongodb::bson::to_document(&meta).unwrap();
        assert!(!doc.contains_key("_id"));
        assert!(doc.contains_key("created_at"));
    }
}
