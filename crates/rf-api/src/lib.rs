//! # rf-api
//!
//! The JSON routing layer for Rusty-Forum.

pub mod handlers;
pub mod middleware;

use actix_web::web;

pub use handlers::{ApiError, AppState};

/// Mounts the post routes under `/api`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(web::JsonConfig::default().error_handler(handlers::json_error))
            .route("/topics/{tid}/posts", web::post().to(handlers::create_post))
            .route("/posts/{pid}", web::get().to(handlers::get_post)),
    );
}
