//! Registration, login and the OTP-gated credential flows.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Address, LoginRecord, Role, User};
use crate::otp::{self, OtpChallenge, OtpError, OtpPurpose, PendingOtp};
use crate::traits::{AuthProvider, Mailer, ShopRepo};
use crate::validation;

const LOGIN_HISTORY_LIMIT: i64 = 50;

pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// A freshly issued bearer credential and the user it belongs to.
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Where a login came from, for the history log.
#[derive(Debug, Default, Clone)]
pub struct LoginOrigin {
    pub address: Option<String>,
    pub client: Option<String>,
}

async fn user_by_email(repo: &dyn ShopRepo, email: &str) -> Result<User> {
    let email = validation::email(email)?;
    repo.find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::not_found("User", &email))
}

async fn reload(repo: &dyn ShopRepo, user_id: Uuid) -> Result<User> {
    repo.get_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User", user_id))
}

/// Stores a new code on the account (superseding any other) and mails it.
async fn issue_otp(
    repo: &dyn ShopRepo,
    mailer: &dyn Mailer,
    user: &User,
    challenge: OtpChallenge,
) -> Result<()> {
    let pending = PendingOtp::issue(challenge, Utc::now());
    repo.set_pending_otp(user.id, Some(&pending)).await?;

    let purpose = pending.challenge.purpose();
    if let Err(err) = mailer
        .send_otp(&user.email, &user.name, &pending.code, purpose)
        .await
    {
        log::warn!(
            "could not deliver {} code to {}: {err:#}",
            purpose.as_str(),
            user.email
        );
    }
    Ok(())
}

/// Creates an unverified account and sends it a registration code.
pub async fn register(
    repo: &dyn ShopRepo,
    auth: &dyn AuthProvider,
    mailer: &dyn Mailer,
    input: Registration,
) -> Result<User> {
    let name = validation::name(&input.name)?;
    let email = validation::email(&input.email)?;
    validation::password(&input.password)?;

    if repo.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("email already registered".into()));
    }

    let password_hash = auth.hash_password(&input.password).await?;
    let mut user = User {
        id: Uuid::now_v7(),
        name,
        email,
        password_hash,
        role: Role::User,
        verified: false,
        pending_otp: None,
        mobile: None,
        address: None,
        created_at: Utc::now(),
    };
    repo.create_user(&user).await?;
    log::info!("registered user {}", user.id);

    issue_otp(repo, mailer, &user, OtpChallenge::Registration).await?;
    user = reload(repo, user.id).await?;
    Ok(user)
}

/// Redeems a registration code; the account becomes verified and is logged in.
pub async fn verify_registration(
    repo: &dyn ShopRepo,
    auth: &dyn AuthProvider,
    email: &str,
    code: &str,
) -> Result<Session> {
    let user = user_by_email(repo, email).await?;
    otp::redeem(user.pending_otp.as_ref(), OtpPurpose::Register, code, Utc::now())?;
    if !repo.complete_verification(user.id, code).await? {
        return Err(OtpError::NotIssued.into());
    }
    log::info!("user {} verified", user.id);

    let user = reload(repo, user.id).await?;
    let token = auth.issue_token(&user)?;
    Ok(Session { token, user })
}

/// Replaces the pending registration code with a fresh one.
pub async fn resend_otp(repo: &dyn ShopRepo, mailer: &dyn Mailer, email: &str) -> Result<()> {
    let user = user_by_email(repo, email).await?;
    if user.verified {
        return Err(AppError::Conflict("email already verified".into()));
    }
    issue_otp(repo, mailer, &user, OtpChallenge::Registration).await
}

pub async fn login(
    repo: &dyn ShopRepo,
    auth: &dyn AuthProvider,
    email: &str,
    password: &str,
    origin: LoginOrigin,
) -> Result<Session> {
    let invalid = || AppError::Unauthorized("invalid credentials".into());

    let email = email.trim().to_lowercase();
    let user = repo.find_user_by_email(&email).await?.ok_or_else(invalid)?;
    if !auth.verify_password(password, &user.password_hash).await {
        return Err(invalid());
    }
    if !user.verified {
        return Err(AppError::Forbidden(
            "please verify your email before logging in".into(),
        ));
    }

    let token = auth.issue_token(&user)?;

    let record = LoginRecord {
        id: Uuid::now_v7(),
        user_id: user.id,
        logged_in_at: Utc::now(),
        origin: origin.address,
        client: origin.client,
    };
    if let Err(err) = repo.record_login(&record).await {
        log::warn!("could not record login for {}: {err}", user.id);
    }

    Ok(Session { token, user })
}

pub async fn forgot_password(repo: &dyn ShopRepo, mailer: &dyn Mailer, email: &str) -> Result<()> {
    let user = user_by_email(repo, email).await?;
    issue_otp(repo, mailer, &user, OtpChallenge::PasswordReset).await
}

pub async fn reset_password(
    repo: &dyn ShopRepo,
    auth: &dyn AuthProvider,
    email: &str,
    code: &str,
    new_password: &str,
) -> Result<()> {
    validation::password(new_password)?;
    let user = user_by_email(repo, email).await?;
    otp::redeem(user.pending_otp.as_ref(), OtpPurpose::Reset, code, Utc::now())?;

    let hash = auth.hash_password(new_password).await?;
    if !repo.commit_password(user.id, code, OtpPurpose::Reset, &hash).await? {
        return Err(OtpError::NotIssued.into());
    }
    log::info!("password reset for user {}", user.id);
    Ok(())
}

/// Checks the current password and parks the new one behind a code.
pub async fn request_password_change(
    repo: &dyn ShopRepo,
    auth: &dyn AuthProvider,
    mailer: &dyn Mailer,
    user: &User,
    current_password: &str,
    new_password: &str,
) -> Result<()> {
    if !auth.verify_password(current_password, &user.password_hash).await {
        return Err(AppError::Unauthorized("current password is incorrect".into()));
    }
    validation::password(new_password)?;

    let pending_hash = auth.hash_password(new_password).await?;
    issue_otp(repo, mailer, user, OtpChallenge::PasswordChange { pending_hash }).await
}

pub async fn confirm_password_change(repo: &dyn ShopRepo, user: &User, code: &str) -> Result<()> {
    let challenge = otp::redeem(
        user.pending_otp.as_ref(),
        OtpPurpose::ChangePassword,
        code,
        Utc::now(),
    )?;
    let hash = challenge
        .pending_hash()
        .ok_or_else(|| AppError::Internal("password change without pending hash".into()))?;
    if !repo
        .commit_password(user.id, code, OtpPurpose::ChangePassword, hash)
        .await?
    {
        return Err(OtpError::NotIssued.into());
    }
    log::info!("password changed for user {}", user.id);
    Ok(())
}

pub async fn login_history(repo: &dyn ShopRepo, user: &User) -> Result<Vec<LoginRecord>> {
    repo.list_logins(user.id, LOGIN_HISTORY_LIMIT).await
}

pub async fn update_profile(
    repo: &dyn ShopRepo,
    user: &User,
    name: &str,
    mobile: Option<&str>,
) -> Result<User> {
    let name = validation::name(name)?;
    let mobile = match mobile.map(str::trim).filter(|m| !m.is_empty()) {
        Some(raw) => Some(validation::mobile(raw)?),
        None => None,
    };
    repo.update_profile(user.id, &name, mobile.as_deref()).await?;
    reload(repo, user.id).await
}

pub async fn update_address(repo: &dyn ShopRepo, user: &User, address: Address) -> Result<User> {
    let address = validation::address(address)?;
    repo.update_address(user.id, &address).await?;
    reload(repo, user.id).await
}

pub async fn delete_account(repo: &dyn ShopRepo, user: &User) -> Result<()> {
    if !repo.delete_user(user.id).await? {
        return Err(AppError::not_found("User", user.id));
    }
    log::info!("deleted account {}", user.id);
    Ok(())
}
