//! Request bodies and the explicit response projections.
//!
//! Domain records that carry secrets (password hashes, pending codes) are
//! never serialized directly; they go through a view type here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sm_core::models::{Address, LineRequest, Role, User};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub verified: bool,
    pub mobile: Option<String>,
    pub address: Option<Address>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            verified: user.verified,
            mobile: user.mobile.clone(),
            address: user.address.clone(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: UserView,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UserMessage {
    pub user: UserView,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Ack {
    pub message: &'static str,
}

pub fn ack(message: &'static str) -> Ack {
    Ack { message }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    #[serde(alias = "otp")]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    #[serde(alias = "otp")]
    pub code: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    #[serde(alias = "otp")]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub name: String,
    #[serde(default)]
    pub mobile: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    #[serde(alias = "rating")]
    pub score: i64,
}

#[derive(Debug, Deserialize)]
pub struct CartItemRequest {
    pub product_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct BuyNowRequest {
    pub items: Vec<LineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// Name and email fall back to the signed-in requester's.
#[derive(Debug, Deserialize)]
pub struct TicketRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub subject: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(alias = "body")]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct FaqRequest {
    pub question: String,
    pub answer: String,
    pub category: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}
