//! # sm-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the core
//! services. Handlers parse input, call one service and project the result.

pub mod account;
pub mod auth;
pub mod cart;
pub mod faqs;
pub mod orders;
pub mod products;
pub mod support;

use actix_web::{HttpResponse, Responder};
use sm_core::traits::{AuthProvider, Mailer, MediaStore, ShopRepo};

/// State shared across all Actix-web workers.
pub struct AppState {
    pub repo: Box<dyn ShopRepo>,
    pub store: Box<dyn MediaStore>,
    pub auth: Box<dyn AuthProvider>,
    pub mailer: Box<dyn Mailer>,
}

/// Health check for "/api/".
pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(crate::dto::ack("ShopMate API is running"))
}
