//! Access control gate: bearer credential -> live user -> role check.

use uuid::Uuid;

use crate::error::{AppError, CredentialError, Result};
use crate::models::User;
use crate::traits::{AuthProvider, ShopRepo};

/// Pulls the token out of an `Authorization` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Decodes the credential and resolves its subject.
pub async fn authenticate(
    repo: &dyn ShopRepo,
    auth: &dyn AuthProvider,
    token: Option<&str>,
) -> Result<User> {
    let token = token.ok_or(CredentialError::Missing)?;
    let claims = auth.decode_token(token)?;
    repo.get_user(claims.sub)
        .await?
        .ok_or(AppError::Credential(CredentialError::UnknownSubject))
}

pub fn require_admin(user: &User) -> Result<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("admin access required".into()))
    }
}

/// Owners and admins pass; everyone else is forbidden.
pub fn require_owner_or_admin(user: &User, owner: Option<Uuid>) -> Result<()> {
    if user.is_admin() || owner == Some(user.id) {
        Ok(())
    } else {
        Err(AppError::Forbidden("you do not have access to this resource".into()))
    }
}
