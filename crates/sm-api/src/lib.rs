//! # sm-api
//!
//! The web routing and orchestration layer for ShopMate.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use sm_core::error::AppError;

use crate::error::HttpAppError;
use crate::handlers::{account, auth, cart, faqs, orders, products, support};

/// Malformed bodies, paths and query strings render as validation errors.
fn bad_input(err: impl std::fmt::Display, _req: &HttpRequest) -> actix_web::Error {
    HttpAppError(AppError::ValidationError(err.to_string())).into()
}

/// Extractor configs shared by every route, mounted by [`configure_routes`].
pub fn extractor_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, req| bad_input(err, req)))
        .app_data(web::PathConfig::default().error_handler(|err, req| bad_input(err, req)))
        .app_data(web::QueryConfig::default().error_handler(|err, req| bad_input(err, req)));
}

fn auth_routes() -> actix_web::Scope {
    web::scope("/auth")
        .route("/register", web::post().to(auth::register))
        .route("/verify-otp", web::post().to(auth::verify_otp))
        .route("/resend-otp", web::post().to(auth::resend_otp))
        .route("/login", web::post().to(auth::login))
        .route("/forgot-password", web::post().to(auth::forgot_password))
        .route("/reset-password", web::post().to(auth::reset_password))
        .route("/me", web::get().to(auth::me))
        .route("/login-history", web::get().to(auth::login_history))
        .route("/change-password", web::post().to(auth::change_password))
        .route("/change-password/confirm", web::post().to(auth::confirm_password_change))
}

fn admin_routes() -> actix_web::Scope {
    web::scope("/admin")
        .route("/orders", web::get().to(orders::list_all))
        .route("/orders/{id}/status", web::put().to(orders::update_status))
        .route("/support/tickets", web::get().to(support::list_all))
        .route("/support/tickets/{id}/status", web::put().to(support::update_status))
        .route("/faqs", web::post().to(faqs::create_faq))
        .route("/faqs/{id}", web::delete().to(faqs::delete_faq))
}

/// Mounts the whole API under `/api`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    extractor_config(cfg);
    cfg.service(
        web::scope("/api")
            .route("", web::get().to(handlers::index))
            .route("/", web::get().to(handlers::index))
            .service(auth_routes())
            .service(
                web::scope("/account")
                    .route("", web::delete().to(account::delete_account))
                    .route("/profile", web::put().to(account::update_profile))
                    .route("/address", web::put().to(account::update_address)),
            )
            .service(
                web::scope("/products")
                    .route("", web::get().to(products::list_products))
                    .route("", web::post().to(products::create_product))
                    .route("/{id}", web::get().to(products::get_product))
                    .route("/{id}", web::put().to(products::update_product))
                    .route("/{id}", web::delete().to(products::delete_product))
                    .route("/{id}/images", web::post().to(products::upload_image))
                    .route("/{id}/ratings", web::get().to(products::list_ratings))
                    .route("/{id}/ratings", web::post().to(products::rate_product)),
            )
            .service(
                web::scope("/cart")
                    .route("", web::get().to(cart::get_cart))
                    .route("", web::delete().to(cart::clear))
                    .route("/items", web::put().to(cart::set_item))
                    .route("/items/{product_id}", web::delete().to(cart::remove_item)),
            )
            .service(
                web::scope("/orders")
                    .route("", web::get().to(orders::list_mine))
                    .route("", web::post().to(orders::checkout))
                    .route("/buy-now", web::post().to(orders::buy_now))
                    .route("/{id}", web::get().to(orders::get_order))
                    .route("/{id}/cancel", web::post().to(orders::cancel)),
            )
            .service(
                web::scope("/support/tickets")
                    .route("", web::get().to(support::list_mine))
                    .route("", web::post().to(support::create_ticket))
                    .route("/{id}", web::get().to(support::get_ticket))
                    .route("/{id}", web::delete().to(support::delete_ticket))
                    .route("/{id}/messages", web::post().to(support::post_message)),
            )
            .route("/faqs", web::get().to(faqs::list_faqs))
            .service(admin_routes())
            .default_service(web::to(not_found)),
    );
}

async fn not_found(req: HttpRequest) -> HttpResponse {
    HttpAppError(AppError::not_found("Route", req.path())).error_response()
}
