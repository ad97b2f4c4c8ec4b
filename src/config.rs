/// Configuration management for blog-api
///
/// Loads configuration from environment variables once at process start.
/// The resulting value is immutable and passed explicitly to every
/// component that needs it; nothing reads the environment at call time.
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub cloudinary: CloudinaryConfig,
    pub api: ApiConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub database: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApiConfig {
    /// Shared key expected in the `ApiKey` request header.
    pub api_key: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let cloud_name = std::env::var("CLOUDINARY_NAME").unwrap_or_default();
        let cloudinary_key = std::env::var("CLOUDINARY_KEY").unwrap_or_default();
        let cloudinary_secret = std::env::var("CLOUDINARY_SECRET").unwrap_or_default();

        if [&cloud_name, &cloudinary_key, &cloudinary_secret]
            .iter()
            .any(|v| v.trim().is_empty())
        {
            return Err("Please specify Cloudinary account details (CLOUDINARY_NAME, CLOUDINARY_KEY, CLOUDINARY_SECRET)".into());
        }

        let api_key = std::env::var("API_KEY")
            .map_err(|_| "API_KEY must be set (shared key for the ApiKey header)")?;

        Ok(Config {
            app: AppConfig {
                host: std::env::var("BLOG_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("BLOG_API_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("API_DB_URL")
                    .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
                database: std::env::var("BLOG_DB_NAME").unwrap_or_else(|_| "Blog".to_string()),
            },
            cloudinary: CloudinaryConfig {
                cloud_name,
                api_key: cloudinary_key,
                api_secret: cloudinary_secret,
            },
            api: ApiConfig { api_key },
        })
    }
}
