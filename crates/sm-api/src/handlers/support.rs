//! Support tickets. Opening one does not require an account.

use actix_web::{web, HttpResponse};
use sm_core::error::AppError;
use sm_core::models::TicketStatus;
use sm_core::services::support::{self, NewTicket};
use uuid::Uuid;

use super::AppState;
use crate::dto::{MessageRequest, StatusRequest, TicketRequest};
use crate::error::ApiResult;
use crate::extractors::{AdminUser, AuthUser, MaybeUser};

pub async fn create_ticket(
    data: web::Data<AppState>,
    MaybeUser(requester): MaybeUser,
    body: web::Json<TicketRequest>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let name = body
        .name
        .or_else(|| requester.as_ref().map(|u| u.name.clone()))
        .ok_or_else(|| AppError::ValidationError("name is required".into()))?;
    let email = body
        .email
        .or_else(|| requester.as_ref().map(|u| u.email.clone()))
        .ok_or_else(|| AppError::ValidationError("email is required".into()))?;

    let ticket = support::create_ticket(
        data.repo.as_ref(),
        requester.as_ref(),
        NewTicket {
            name,
            email,
            subject: body.subject,
            description: body.description,
        },
    )
    .await?;
    Ok(HttpResponse::Created().json(ticket))
}

pub async fn list_mine(data: web::Data<AppState>, AuthUser(user): AuthUser) -> ApiResult<HttpResponse> {
    let tickets = support::list_my_tickets(data.repo.as_ref(), &user).await?;
    Ok(HttpResponse::Ok().json(tickets))
}

pub async fn list_all(data: web::Data<AppState>, _admin: AdminUser) -> ApiResult<HttpResponse> {
    let tickets = support::list_all_tickets(data.repo.as_ref()).await?;
    Ok(HttpResponse::Ok().json(tickets))
}

pub async fn get_ticket(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let ticket = support::get_ticket(data.repo.as_ref(), &user, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ticket))
}

pub async fn post_message(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<MessageRequest>,
) -> ApiResult<HttpResponse> {
    let ticket = support::post_message(data.repo.as_ref(), &user, path.into_inner(), &body.message).await?;
    Ok(HttpResponse::Created().json(ticket))
}

pub async fn update_status(
    data: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<Uuid>,
    body: web::Json<StatusRequest>,
) -> ApiResult<HttpResponse> {
    let next: TicketStatus = body.status.parse()?;
    let ticket = support::update_ticket_status(data.repo.as_ref(), path.into_inner(), next).await?;
    Ok(HttpResponse::Ok().json(ticket))
}

pub async fn delete_ticket(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    support::delete_ticket(data.repo.as_ref(), &user, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
