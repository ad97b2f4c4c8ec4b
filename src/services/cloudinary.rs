/// Cloudinary image host client
///
/// The transformation-URL builder is pure and deterministic (no network
/// call); uploads and deletes go over the REST API with SHA-1 request
/// signing.
use serde::Deserialize;
use sha1::{Digest, Sha1};

use crate::config::CloudinaryConfig;
use crate::error::{AppError, Result};
use crate::models::ResponsiveUrl;

/// Builds transformation URLs against an already-stored asset.
/// Format: https://res.cloudinary.com/{cloud}/image/upload/{transform}/{path}
#[derive(Clone, Debug)]
pub struct TransformUrlBuilder {
    cloud_name: String,
}

impl TransformUrlBuilder {
    pub fn new(cloud_name: impl Into<String>) -> Self {
        Self {
            cloud_name: cloud_name.into(),
        }
    }

    /// Single transformation URL combining width, quality and an optional
    /// blur effect. `c_limit` prevents upscaling on the host side.
    pub fn transform_url(&self, width: u32, quality: u8, blur: Option<u32>, path: &str) -> String {
        let mut transform = format!("q_{},w_{},c_limit", quality, width);
        if let Some(amount) = blur {
            transform.push_str(&format!(",e_blur:{}", amount));
        }
        format!(
            "https://res.cloudinary.com/{}/image/upload/{}/{}",
            self.cloud_name, transform, path
        )
    }

    /// One URL per requested width, in input order.
    pub fn responsive_urls(&self, widths: &[u32], quality: u8, path: &str) -> Vec<ResponsiveUrl> {
        widths
            .iter()
            .map(|&width| ResponsiveUrl {
                width,
                url: self.transform_url(width, quality, None, path),
            })
            .collect()
    }
}

/// What the host reports back after storing the canonical image.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadReceipt {
    pub public_id: String,
    pub version: u64,
    pub signature: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub bytes: u64,
    pub url: String,
    pub secure_url: String,
}

#[derive(Clone)]
pub struct CloudinaryClient {
    http: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryClient {
    pub fn new(config: &CloudinaryConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        }
    }

    pub fn url_builder(&self) -> TransformUrlBuilder {
        TransformUrlBuilder::new(self.cloud_name.clone())
    }

    /// Upload a base64 data URL under the given public id
    /// (`{folder}/{name}`). A store-write failure after this call succeeds
    /// leaves an orphaned host asset; that is accepted and not reconciled.
    pub async fn upload(&self, data_url: &str, public_id: &str) -> Result<UploadReceipt> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signed = vec![
            ("public_id".to_string(), public_id.to_string()),
            ("timestamp".to_string(), timestamp.clone()),
        ];
        let signature = sign_params(&signed, &self.api_secret);

        let endpoint = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.cloud_name
        );
        let form = vec![
            ("file".to_string(), data_url.to_string()),
            ("public_id".to_string(), public_id.to_string()),
            ("timestamp".to_string(), timestamp),
            ("api_key".to_string(), self.api_key.clone()),
            ("signature".to_string(), signature),
        ];

        let response = self.http.post(&endpoint).form(&form).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ImageHost(format!(
                "upload failed with status {}: {}",
                status, body
            )));
        }

        Ok(response.json::<UploadReceipt>().await?)
    }

    /// Delete a stored asset by public id.
    pub async fn delete(&self, public_id: &str) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signed = vec![
            ("public_id".to_string(), public_id.to_string()),
            ("timestamp".to_string(), timestamp.clone()),
        ];
        let signature = sign_params(&signed, &self.api_secret);

        let endpoint = format!(
            "https://api.cloudinary.com/v1_1/{}/image/destroy",
            self.cloud_name
        );
        let form = vec![
            ("public_id".to_string(), public_id.to_string()),
            ("timestamp".to_string(), timestamp),
            ("api_key".to_string(), self.api_key.clone()),
            ("signature".to_string(), signature),
        ];

        let response = self.http.post(&endpoint).form(&form).send().await?;
        if !response.status().is_success() {
            return Err(AppError::ImageHost(format!(
                "delete of '{}' failed with status {}",
                public_id,
                response.status()
            )));
        }
        Ok(())
    }
}

/// Cloudinary request signature: parameters sorted by name, joined as a
/// query string, secret appended, SHA-1 hex digest.
fn sign_params(params: &[(String, String)], secret: &str) -> String {
    let mut sorted: Vec<_> = params.to_vec();
    sorted.sort();
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Sha1::digest(format!("{}{}", joined, secret).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> TransformUrlBuilder {
        TransformUrlBuilder::new("demo")
    }

    #[test]
    fn test_transform_url_format() {
        let url = builder().transform_url(512, 70, None, "blog/cover");
        assert_eq!(
            url,
            "https://res.cloudinary.com/demo/image/upload/q_70,w_512,c_limit/blog/cover"
        );
    }

    #[test]
    fn test_transform_url_with_blur() {
        let url = builder().transform_url(150, 50, Some(70), "blog/cover");
        assert!(url.contains("q_50,w_150,c_limit,e_blur:70"));
    }

    #[test]
    fn test_responsive_urls_preserve_input_order() {
        let urls = builder().responsive_urls(&[512, 1024], 70, "blog/cover");
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].width, 512);
        assert_eq!(urls[1].width, 1024);
        assert!(urls[0].url.contains("w_512"));
        assert!(urls[0].url.contains("q_70"));
        assert!(urls[1].url.contains("w_1024"));
    }

    #[test]
    fn test_sign_params_is_sorted_and_stable() {
        let a = sign_params(
            &[
                ("timestamp".to_string(), "100".to_string()),
                ("public_id".to_string(), "blog/x".to_string()),
            ],
            "secret",
        );
        let b = sign_params(
            &[
                ("public_id".to_string(), "blog/x".to_string()),
                ("timestamp".to_string(), "100".to_string()),
            ],
            "secret",
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn test_sign_params_depends_on_secret() {
        let params = vec![("public_id".to_string(), "blog/x".to_string())];
        assert_ne!(sign_params(&params, "one"), sign_params(&params, "two"));
    }
}
