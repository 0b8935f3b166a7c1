//! Registration, verification, login and the password flows.

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use sm_core::services::accounts::{self, LoginOrigin, Registration, Session};

use super::AppState;
use crate::dto::{
    ack, ChangePasswordRequest, CodeRequest, EmailRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
    SessionView, UserMessage, UserView, VerifyOtpRequest,
};
use crate::error::ApiResult;
use crate::extractors::AuthUser;

fn session_view(session: Session, message: &'static str) -> SessionView {
    SessionView {
        access_token: session.token,
        token_type: "bearer",
        user: UserView::from(&session.user),
        message,
    }
}

fn login_origin(req: &HttpRequest) -> LoginOrigin {
    LoginOrigin {
        address: req.connection_info().realip_remote_addr().map(str::to_owned),
        client: req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    }
}

pub async fn register(data: web::Data<AppState>, body: web::Json<RegisterRequest>) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let user = accounts::register(
        data.repo.as_ref(),
        data.auth.as_ref(),
        data.mailer.as_ref(),
        Registration {
            name: body.name,
            email: body.email,
            password: body.password,
        },
    )
    .await?;
    Ok(HttpResponse::Created().json(UserMessage {
        user: UserView::from(&user),
        message: "registration successful; check your email for the verification code",
    }))
}

pub async fn verify_otp(data: web::Data<AppState>, body: web::Json<VerifyOtpRequest>) -> ApiResult<HttpResponse> {
    let session = accounts::verify_registration(data.repo.as_ref(), data.auth.as_ref(), &body.email, &body.code).await?;
    Ok(HttpResponse::Ok().json(session_view(session, "email verified")))
}

pub async fn resend_otp(data: web::Data<AppState>, body: web::Json<EmailRequest>) -> ApiResult<HttpResponse> {
    accounts::resend_otp(data.repo.as_ref(), data.mailer.as_ref(), &body.email).await?;
    Ok(HttpResponse::Ok().json(ack("a new verification code has been sent")))
}

pub async fn login(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let session = accounts::login(
        data.repo.as_ref(),
        data.auth.as_ref(),
        &body.email,
        &body.password,
        login_origin(&req),
    )
    .await?;
    Ok(HttpResponse::Ok().json(session_view(session, "login successful")))
}

pub async fn forgot_password(data: web::Data<AppState>, body: web::Json<EmailRequest>) -> ApiResult<HttpResponse> {
    accounts::forgot_password(data.repo.as_ref(), data.mailer.as_ref(), &body.email).await?;
    Ok(HttpResponse::Ok().json(ack("a password reset code has been sent")))
}

pub async fn reset_password(
    data: web::Data<AppState>,
    body: web::Json<ResetPasswordRequest>,
) -> ApiResult<HttpResponse> {
    accounts::reset_password(
        data.repo.as_ref(),
        data.auth.as_ref(),
        &body.email,
        &body.code,
        &body.new_password,
    )
    .await?;
    Ok(HttpResponse::Ok().json(ack("password has been reset")))
}

pub async fn me(AuthUser(user): AuthUser) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(UserView::from(&user)))
}

pub async fn login_history(data: web::Data<AppState>, AuthUser(user): AuthUser) -> ApiResult<HttpResponse> {
    let history = accounts::login_history(data.repo.as_ref(), &user).await?;
    Ok(HttpResponse::Ok().json(history))
}

pub async fn change_password(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    body: web::Json<ChangePasswordRequest>,
) -> ApiResult<HttpResponse> {
    accounts::request_password_change(
        data.repo.as_ref(),
        data.auth.as_ref(),
        data.mailer.as_ref(),
        &user,
        &body.current_password,
        &body.new_password,
    )
    .await?;
    Ok(HttpResponse::Ok().json(ack("check your email for the confirmation code")))
}

pub async fn confirm_password_change(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    body: web::Json<CodeRequest>,
) -> ApiResult<HttpResponse> {
    accounts::confirm_password_change(data.repo.as_ref(), &user, &body.code).await?;
    Ok(HttpResponse::Ok().json(ack("password changed")))
}
