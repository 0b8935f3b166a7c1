use actix_web::{web, HttpResponse};
use sm_core::models::Address;
use sm_core::services::accounts;

use super::AppState;
use crate::dto::{ProfileRequest, UserView};
use crate::error::ApiResult;
use crate::extractors::AuthUser;

pub async fn update_profile(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    body: web::Json<ProfileRequest>,
) -> ApiResult<HttpResponse> {
    let user = accounts::update_profile(data.repo.as_ref(), &user, &body.name, body.mobile.as_deref()).await?;
    Ok(HttpResponse::Ok().json(UserView::from(&user)))
}

pub async fn update_address(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    body: web::Json<Address>,
) -> ApiResult<HttpResponse> {
    let user = accounts::update_address(data.repo.as_ref(), &user, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(UserView::from(&user)))
}

pub async fn delete_account(data: web::Data<AppState>, AuthUser(user): AuthUser) -> ApiResult<HttpResponse> {
    accounts::delete_account(data.repo.as_ref(), &user).await?;
    Ok(HttpResponse::NoContent().finish())
}
