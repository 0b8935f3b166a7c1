//! Bearer-credential extractors. Each resolves the token to a live user
//! through the access gate before the handler runs.

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use sm_core::error::AppError;
use sm_core::models::User;
use sm_core::services::access;

use crate::error::HttpAppError;
use crate::handlers::AppState;

/// Any authenticated user.
pub struct AuthUser(pub User);

/// An authenticated admin.
pub struct AdminUser(pub User);

/// The caller if a credential was sent. A credential that is sent but
/// invalid is still rejected.
pub struct MaybeUser(pub Option<User>);

fn authorization(req: &HttpRequest) -> Option<Option<String>> {
    let value = req.headers().get(header::AUTHORIZATION)?;
    Some(
        value
            .to_str()
            .ok()
            .and_then(access::bearer_token)
            .map(str::to_owned),
    )
}

fn state(req: &HttpRequest) -> Result<web::Data<AppState>, HttpAppError> {
    req.app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| AppError::Internal("application state is not configured".into()).into())
}

async fn resolve(state: web::Data<AppState>, token: Option<String>) -> Result<User, HttpAppError> {
    Ok(access::authenticate(state.repo.as_ref(), state.auth.as_ref(), token.as_deref()).await?)
}

impl FromRequest for AuthUser {
    type Error = HttpAppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = state(req);
        let token = authorization(req).flatten();
        Box::pin(async move { resolve(state?, token).await.map(AuthUser) })
    }
}

impl FromRequest for AdminUser {
    type Error = HttpAppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = state(req);
        let token = authorization(req).flatten();
        Box::pin(async move {
            let user = resolve(state?, token).await?;
            access::require_admin(&user)?;
            Ok(AdminUser(user))
        })
    }
}

impl FromRequest for MaybeUser {
    type Error = HttpAppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = state(req);
        let header = authorization(req);
        Box::pin(async move {
            match header {
                None => Ok(MaybeUser(None)),
                Some(token) => resolve(state?, token).await.map(|user| MaybeUser(Some(user))),
            }
        })
    }
}
