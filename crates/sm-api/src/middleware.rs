//! Request logging, CORS and response hardening headers.

use actix_cors::Cors;
use actix_web::http::{header, Method};
use actix_web::middleware::{DefaultHeaders, Logger};

/// Access log in the default format:
/// remote-ip "request-line" status-code response-size "referrer" "user-agent"
pub fn standard_middleware() -> Logger {
    Logger::default()
}

/// Allows the listed origins, or any origin when the list is empty or
/// contains `*`.
pub fn cors_policy(origins: &[String]) -> Cors {
    let methods = vec![Method::GET, Method::POST, Method::PUT, Method::DELETE];
    let base = Cors::default()
        .allowed_methods(methods)
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_any_origin();
    }
    origins
        .iter()
        .fold(base, |cors, origin| cors.allowed_origin(origin))
}

pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .add((header::REFERRER_POLICY, "strict-origin-when-cross-origin"))
}
