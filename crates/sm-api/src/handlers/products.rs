//! Catalog browsing, admin product management, image uploads and ratings.

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use sm_core::error::AppError;
use sm_core::models::{ProductFilter, ProductInput};
use sm_core::services::catalog::{self, MAX_IMAGE_BYTES};
use uuid::Uuid;

use super::AppState;
use crate::dto::RatingRequest;
use crate::error::ApiResult;
use crate::extractors::{AdminUser, AuthUser};

pub async fn list_products(data: web::Data<AppState>, query: web::Query<ProductFilter>) -> ApiResult<HttpResponse> {
    let products = catalog::list_products(data.repo.as_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(products))
}

pub async fn get_product(data: web::Data<AppState>, path: web::Path<Uuid>) -> ApiResult<HttpResponse> {
    let product = catalog::get_product(data.repo.as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(product))
}

pub async fn create_product(
    data: web::Data<AppState>,
    _admin: AdminUser,
    body: web::Json<ProductInput>,
) -> ApiResult<HttpResponse> {
    let product = catalog::create_product(data.repo.as_ref(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(product))
}

pub async fn update_product(
    data: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<Uuid>,
    body: web::Json<ProductInput>,
) -> ApiResult<HttpResponse> {
    let product = catalog::update_product(data.repo.as_ref(), path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(product))
}

pub async fn delete_product(
    data: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    catalog::delete_product(data.repo.as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Reads the first file part of the form, refusing to buffer past the cap.
async fn read_image(mut form: Multipart) -> Result<(Vec<u8>, String), AppError> {
    let malformed = |err: actix_multipart::MultipartError| AppError::ValidationError(format!("malformed upload: {err}"));

    while let Some(field) = form.next().await {
        let mut field = field.map_err(malformed)?;
        let Some(content_type) = field.content_type().map(|m| m.essence_str().to_owned()) else {
            continue;
        };

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(malformed)?;
            if data.len() + chunk.len() > MAX_IMAGE_BYTES {
                return Err(AppError::ValidationError("image exceeds 5 MiB".into()));
            }
            data.extend_from_slice(&chunk);
        }
        return Ok((data, content_type));
    }
    Err(AppError::ValidationError("no image file in upload".into()))
}

pub async fn upload_image(
    data: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<Uuid>,
    form: Multipart,
) -> ApiResult<HttpResponse> {
    let (bytes, content_type) = read_image(form).await?;
    let product = catalog::upload_product_image(
        data.repo.as_ref(),
        data.store.as_ref(),
        path.into_inner(),
        bytes,
        &content_type,
    )
    .await?;
    Ok(HttpResponse::Created().json(product))
}

pub async fn rate_product(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<RatingRequest>,
) -> ApiResult<HttpResponse> {
    let product = catalog::rate_product(data.repo.as_ref(), &user, path.into_inner(), body.score).await?;
    Ok(HttpResponse::Created().json(product))
}

pub async fn list_ratings(data: web::Data<AppState>, path: web::Path<Uuid>) -> ApiResult<HttpResponse> {
    let ratings = catalog::list_ratings(data.repo.as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ratings))
}
