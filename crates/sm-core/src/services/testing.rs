use chrono::Utc;
use uuid::Uuid;

use crate::models::{Role, User};

pub(crate) fn sample_user() -> User {
    User {
        id: Uuid::now_v7(),
        name: "Jane Doe".into(),
        email: "jane@example.com".into(),
        password_hash: "$argon2id$stub".into(),
        role: Role::User,
        verified: true,
        pending_otp: None,
        mobile: None,
        address: None,
        created_at: Utc::now(),
    }
}
