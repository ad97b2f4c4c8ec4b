/// Blog API - HTTP server
///
/// Serves the content-management endpoints for posts, categories, images,
/// subscribers and pages. Everything except the health probes sits behind
/// the shared-key middleware.
use actix_web::{middleware as actix_middleware, web, App, HttpResponse, HttpServer};
use blog_api::services::{CloudinaryClient, DerivationPipeline, TransformUrlBuilder};
use blog_api::{db, handlers, middleware, Config};
use std::io;
use std::sync::Arc;

// Uploaded originals can be large; renditions are derived server-side.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!(env = %config.app.env, "Blog API starting on {}", bind_address);

    let database = db::connect(&config.database.url, &config.database.database)
        .await
        .expect("Failed to connect to database");

    let urls = TransformUrlBuilder::new(config.cloudinary.cloud_name.clone());
    let pipeline = Arc::new(DerivationPipeline::new(urls));
    let cloudinary = CloudinaryClient::new(&config.cloudinary);
    let api_key = config.api.api_key.clone();

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(database.clone()))
            .app_data(web::Data::new(pipeline.clone()))
            .app_data(web::Data::new(cloudinary.clone()))
            .app_data(web::PayloadConfig::new(MAX_UPLOAD_BYTES))
            .wrap(actix_middleware::Logger::default())
            .route(
                "/healthz",
                web::get()
                    .to(|| async { HttpResponse::Ok().json(serde_json::json!({"status": "ok"})) }),
            )
            .route(
                "/ready",
                web::get().to(|| async { HttpResponse::Ok().finish() }),
            )
            .service(
                web::scope("")
                    .wrap(middleware::ApiKeyAuth::new(api_key.clone()))
                    .service(
                        web::scope("/posts")
                            .route("", web::get().to(handlers::posts::list_posts))
                            .route("", web::post().to(handlers::posts::create_post))
                            .route("/{id}", web::get().to(handlers::posts::get_post))
                            .route("/{id}", web::put().to(handlers::posts::update_post))
                            .route("/{id}", web::delete().to(handlers::posts::delete_post)),
                    )
                    .service(
                        web::scope("/categories")
                            .route("", web::get().to(handlers::categories::list_categories))
                            .route("", web::post().to(handlers::categories::create_category))
                            .route("/{id}", web::get().to(handlers::categories::get_category))
                            .route("/{id}", web::put().to(handlers::categories::update_category))
                            .route(
                                "/{id}",
                                web::delete().to(handlers::categories::delete_category),
                            ),
                    )
                    .service(
                        web::scope("/images")
                            .route("", web::get().to(handlers::images::list_images))
                            .route("", web::post().to(handlers::images::upload_image))
                            .route("/{id}", web::get().to(handlers::images::get_image))
                            .route("/{id}", web::delete().to(handlers::images::delete_image)),
                    )
                    .service(
                        web::scope("/subscribers")
                            .route("", web::get().to(handlers::subscribers::list_subscribers))
                            .route("", web::post().to(handlers::subscribers::create_subscriber))
                            .route("/{id}", web::get().to(handlers::subscribers::get_subscriber))
                            .route(
                                "/{id}",
                                web::put().to(handlers::subscribers::update_subscriber),
                            )
                            .route(
                                "/{id}",
                                web::delete().to(handlers::subscribers::delete_subscriber),
                            ),
                    )
                    .service(
                        web::scope("/pages")
                            .route("", web::get().to(handlers::pages::list_pages))
                            .route("", web::post().to(handlers::pages::create_page))
                            .route("/{slug}", web::get().to(handlers::pages::get_page))
                            .route("/{slug}", web::put().to(handlers::pages::update_page))
                            .route("/{slug}", web::delete().to(handlers::pages::delete_page)),
                    ),
            )
    })
    .bind(&bind_address)?
    .run()
    .await
}
