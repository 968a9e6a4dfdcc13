//! Request logging, CORS and response headers shared by every route.

use actix_cors::Cors;
use actix_web::middleware::{DefaultHeaders, Logger};

/// Access log line: peer, request line, status, size, latency.
/// Emitted through the `log` facade, which the tracing subscriber picks up.
pub fn request_logger() -> Logger {
    Logger::new(r#"%a "%r" %s %b %Dms"#)
}

pub fn cors_policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST"])
        .allowed_header(actix_web::http::header::CONTENT_TYPE)
        .max_age(3600)
}

pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
}
