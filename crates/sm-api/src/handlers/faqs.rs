use actix_web::{web, HttpResponse};
use sm_core::services::support::{self, NewFaq};
use uuid::Uuid;

use super::AppState;
use crate::dto::{CategoryQuery, FaqRequest};
use crate::error::ApiResult;
use crate::extractors::AdminUser;

pub async fn list_faqs(data: web::Data<AppState>, query: web::Query<CategoryQuery>) -> ApiResult<HttpResponse> {
    let faqs = support::list_faqs(data.repo.as_ref(), query.category.as_deref()).await?;
    Ok(HttpResponse::Ok().json(faqs))
}

pub async fn create_faq(
    data: web::Data<AppState>,
    _admin: AdminUser,
    body: web::Json<FaqRequest>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let faq = support::create_faq(
        data.repo.as_ref(),
        NewFaq {
            question: body.question,
            answer: body.answer,
            category: body.category,
        },
    )
    .await?;
    Ok(HttpResponse::Created().json(faq))
}

pub async fn delete_faq(
    data: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    support::delete_faq(data.repo.as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
