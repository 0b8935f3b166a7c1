//! Order placement and lifecycle.

use actix_web::{web, HttpResponse};
use sm_core::models::OrderStatus;
use sm_core::services::checkout;
use uuid::Uuid;

use super::AppState;
use crate::dto::{BuyNowRequest, StatusRequest};
use crate::error::ApiResult;
use crate::extractors::{AdminUser, AuthUser};

pub async fn checkout(data: web::Data<AppState>, AuthUser(user): AuthUser) -> ApiResult<HttpResponse> {
    let order = checkout::checkout(data.repo.as_ref(), data.mailer.as_ref(), &user).await?;
    Ok(HttpResponse::Created().json(order))
}

pub async fn buy_now(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    body: web::Json<BuyNowRequest>,
) -> ApiResult<HttpResponse> {
    let order = checkout::buy_now(
        data.repo.as_ref(),
        data.mailer.as_ref(),
        &user,
        body.into_inner().items,
    )
    .await?;
    Ok(HttpResponse::Created().json(order))
}

pub async fn list_mine(data: web::Data<AppState>, AuthUser(user): AuthUser) -> ApiResult<HttpResponse> {
    let orders = checkout::list_my_orders(data.repo.as_ref(), &user).await?;
    Ok(HttpResponse::Ok().json(orders))
}

pub async fn list_all(data: web::Data<AppState>, _admin: AdminUser) -> ApiResult<HttpResponse> {
    let orders = checkout::list_all_orders(data.repo.as_ref()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

pub async fn get_order(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let order = checkout::get_order(data.repo.as_ref(), &user, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

pub async fn cancel(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let order = checkout::cancel_order(data.repo.as_ref(), &user, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

pub async fn update_status(
    data: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<Uuid>,
    body: web::Json<StatusRequest>,
) -> ApiResult<HttpResponse> {
    let next: OrderStatus = body.status.parse()?;
    let order = checkout::update_order_status(data.repo.as_ref(), path.into_inner(), next).await?;
    Ok(HttpResponse::Ok().json(order))
}
