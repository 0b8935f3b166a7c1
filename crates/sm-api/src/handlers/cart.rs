use actix_web::{web, HttpResponse};
use sm_core::services::checkout;
use uuid::Uuid;

use super::AppState;
use crate::dto::CartItemRequest;
use crate::error::ApiResult;
use crate::extractors::AuthUser;

pub async fn get_cart(data: web::Data<AppState>, AuthUser(user): AuthUser) -> ApiResult<HttpResponse> {
    let cart = checkout::get_cart(data.repo.as_ref(), &user).await?;
    Ok(HttpResponse::Ok().json(cart))
}

/// Sets the quantity of one line; zero removes it.
pub async fn set_item(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    body: web::Json<CartItemRequest>,
) -> ApiResult<HttpResponse> {
    let cart = checkout::set_cart_item(data.repo.as_ref(), &user, body.product_id, body.quantity).await?;
    Ok(HttpResponse::Ok().json(cart))
}

pub async fn remove_item(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let cart = checkout::remove_cart_item(data.repo.as_ref(), &user, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(cart))
}

pub async fn clear(data: web::Data<AppState>, AuthUser(user): AuthUser) -> ApiResult<HttpResponse> {
    checkout::clear_cart(data.repo.as_ref(), &user).await?;
    Ok(HttpResponse::NoContent().finish())
}
