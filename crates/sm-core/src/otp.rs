//! # One-time codes
//!
//! Registration, password reset and password change are each gated behind a
//! six-digit code delivered by email. A user carries at most one pending code;
//! issuing another supersedes it.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AppError;

pub const OTP_LENGTH: usize = 6;
pub const OTP_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Register,
    Reset,
    ChangePassword,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Reset => "reset",
            Self::ChangePassword => "change_password",
        }
    }
}

impl std::str::FromStr for OtpPurpose {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "register" => Ok(Self::Register),
            "reset" => Ok(Self::Reset),
            "change_password" => Ok(Self::ChangePassword),
            other => Err(AppError::ValidationError(format!("unknown otp purpose '{other}'"))),
        }
    }
}

/// What a pending code unlocks once redeemed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpChallenge {
    Registration,
    PasswordReset,
    /// The new password is hashed up front; redeeming the code commits it.
    PasswordChange { pending_hash: String },
}

impl OtpChallenge {
    pub fn purpose(&self) -> OtpPurpose {
        match self {
            Self::Registration => OtpPurpose::Register,
            Self::PasswordReset => OtpPurpose::Reset,
            Self::PasswordChange { .. } => OtpPurpose::ChangePassword,
        }
    }

    pub fn pending_hash(&self) -> Option<&str> {
        match self {
            Self::PasswordChange { pending_hash } => Some(pending_hash),
            _ => None,
        }
    }

    /// Rebuilds a challenge from its stored columns.
    /// Returns `None` for a password change without its pending hash.
    pub fn from_parts(purpose: OtpPurpose, pending_hash: Option<String>) -> Option<Self> {
        match purpose {
            OtpPurpose::Register => Some(Self::Registration),
            OtpPurpose::Reset => Some(Self::PasswordReset),
            OtpPurpose::ChangePassword => {
                pending_hash.map(|pending_hash| Self::PasswordChange { pending_hash })
            }
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpError {
    #[error("no verification code is pending for this account")]
    NotIssued,
    #[error("verification code was issued for a different purpose")]
    InvalidPurpose,
    #[error("invalid verification code")]
    InvalidCode,
    #[error("verification code has expired")]
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOtp {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub challenge: OtpChallenge,
}

impl PendingOtp {
    /// Fresh code valid for [`OTP_TTL_MINUTES`] from `now`.
    pub fn issue(challenge: OtpChallenge, now: DateTime<Utc>) -> Self {
        Self {
            code: generate_code(),
            expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
            challenge,
        }
    }

    /// Checks purpose, then code, then expiry.
    pub fn verify(&self, purpose: OtpPurpose, code: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
        if self.challenge.purpose() != purpose {
            return Err(OtpError::InvalidPurpose);
        }
        if self.code != code {
            return Err(OtpError::InvalidCode);
        }
        if now > self.expires_at {
            return Err(OtpError::Expired);
        }
        Ok(())
    }
}

/// Redeems whatever code is pending on an account, handing back its challenge.
pub fn redeem(
    pending: Option<&PendingOtp>,
    purpose: OtpPurpose,
    code: &str,
    now: DateTime<Utc>,
) -> Result<OtpChallenge, OtpError> {
    let pending = pending.ok_or(OtpError::NotIssued)?;
    pending.verify(purpose, code, now)?;
    Ok(pending.challenge.clone())
}

/// Uniformly random decimal digits.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..OTP_LENGTH)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}
