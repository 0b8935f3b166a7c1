//! # AppError
//!
//! Centralized error handling for the ShopMate ecosystem.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

use crate::otp::OtpError;

/// Why a bearer credential could not be turned into a live user.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    #[error("missing bearer credential")]
    Missing,
    #[error("credential has expired")]
    Expired,
    #[error("malformed credential")]
    Malformed,
    /// Well-formed and unexpired, but the account is gone.
    #[error("credential subject no longer exists")]
    UnknownSubject,
}

/// The primary error type for all sm-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., User, Product, Order)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., bad postal code, empty cart)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Bad login credentials
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed (unverified account, not an admin, not the owner)
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource already exists (e.g., duplicate email)
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Names the product that could not cover the requested quantity.
    #[error("insufficient stock for {0}")]
    InsufficientStock(String),

    #[error("a delivery address is required before placing an order")]
    MissingAddress,

    #[error("you have already rated this product")]
    DuplicateRating,

    #[error("ticket is closed")]
    TicketClosed,

    #[error("cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Email, storage or payment provider failure
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    /// Infrastructure failure (e.g., DB down)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        AppError::NotFound(entity.to_string(), id.to_string())
    }

    /// Taxonomy kind reported to callers alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(..) => "not_found",
            AppError::ValidationError(_) | AppError::MissingAddress => "validation",
            AppError::Unauthorized(_) | AppError::Credential(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Conflict(_)
            | AppError::InsufficientStock(_)
            | AppError::DuplicateRating
            | AppError::TicketClosed
            | AppError::InvalidTransition { .. } => "conflict",
            AppError::Otp(OtpError::Expired) => "expired",
            AppError::Otp(_) => "validation",
            AppError::UpstreamFailure(_) => "upstream_failure",
            AppError::Internal(_) => "internal",
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(..) => "NOT_FOUND",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Otp(OtpError::NotIssued) => "OTP_NOT_ISSUED",
            AppError::Otp(OtpError::InvalidPurpose) => "OTP_INVALID_PURPOSE",
            AppError::Otp(OtpError::InvalidCode) => "OTP_INVALID_CODE",
            AppError::Otp(OtpError::Expired) => "OTP_EXPIRED",
            AppError::Credential(CredentialError::Missing) => "CREDENTIAL_MISSING",
            AppError::Credential(CredentialError::Expired) => "CREDENTIAL_EXPIRED",
            AppError::Credential(CredentialError::Malformed) => "CREDENTIAL_MALFORMED",
            AppError::Credential(CredentialError::UnknownSubject) => "UNKNOWN_SUBJECT",
            AppError::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            AppError::MissingAddress => "MISSING_ADDRESS",
            AppError::DuplicateRating => "DUPLICATE_RATING",
            AppError::TicketClosed => "TICKET_CLOSED",
            AppError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AppError::UpstreamFailure(_) => "UPSTREAM_FAILURE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self.kind() {
            "not_found" => 404,
            "validation" | "expired" => 400,
            "unauthorized" => 401,
            "forbidden" => 403,
            "conflict" => 409,
            "upstream_failure" => 502,
            _ => 500,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{err:#}"))
    }
}

/// A specialized Result type for ShopMate logic.
pub type Result<T> = std::result::Result<T, AppError>;
