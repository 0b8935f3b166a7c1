//! Shared harness for the end-to-end API tests.
//!
//! Each test builds its own [`Harness`]: a fresh in-memory SQLite store, the
//! argon2/JWT auth provider, a temporary media directory and a mailer that
//! records everything it is asked to send.

use std::sync::{Arc, Mutex};

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::{header, StatusCode};
use actix_web::{test, web};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use sm_api::handlers::AppState;
use sm_auth_simple::SimpleAuthProvider;
use sm_core::models::{Address, Order, Product, Role, User};
use sm_core::otp::OtpPurpose;
use sm_core::traits::{AuthProvider, CatalogRepo, Mailer, UserRepo};
use sm_db_sqlite::SqliteRepo;
use sm_storage_local::LocalMediaStore;
use tempfile::TempDir;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "password123";

/// Builds the full application around a harness state.
#[macro_export]
macro_rules! init_app {
    ($harness:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($harness.state.clone())
                .configure(sm_api::configure_routes),
        )
        .await
    };
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Otp { to: String, code: String, purpose: OtpPurpose },
    OrderConfirmation { to: String, order_number: String },
}

/// Everything the capturing mailer has been asked to deliver.
#[derive(Debug, Clone, Default)]
pub struct Outbox(Arc<Mutex<Vec<Sent>>>);

impl Outbox {
    pub fn all(&self) -> Vec<Sent> {
        self.0.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// The most recent code mailed to `to`.
    pub fn last_code(&self, to: &str) -> Option<String> {
        self.all().into_iter().rev().find_map(|sent| match sent {
            Sent::Otp { to: addr, code, .. } if addr == to => Some(code),
            _ => None,
        })
    }

    fn push(&self, sent: Sent) {
        if let Ok(mut outbox) = self.0.lock() {
            outbox.push(sent);
        }
    }
}

pub struct CapturingMailer(Outbox);

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send_otp(&self, to: &str, _name: &str, code: &str, purpose: OtpPurpose) -> anyhow::Result<()> {
        self.0.push(Sent::Otp {
            to: to.to_string(),
            code: code.to_string(),
            purpose,
        });
        Ok(())
    }

    async fn send_order_confirmation(&self, to: &str, order: &Order) -> anyhow::Result<()> {
        self.0.push(Sent::OrderConfirmation {
            to: to.to_string(),
            order_number: order.order_number.clone(),
        });
        Ok(())
    }
}

pub struct Harness {
    pub state: web::Data<AppState>,
    pub outbox: Outbox,
    pub media: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        let outbox = Outbox::default();
        Self::with_mailer(Box::new(CapturingMailer(outbox.clone())), outbox).await
    }

    /// Uses `mailer` instead of the capturing one; `outbox` stays empty
    /// unless the caller wires it in.
    pub async fn with_mailer(mailer: Box<dyn Mailer>, outbox: Outbox) -> Self {
        let media = tempfile::tempdir().expect("media dir");
        let repo = SqliteRepo::connect("sqlite::memory:", 1)
            .await
            .expect("in-memory store");
        let state = web::Data::new(AppState {
            repo: Box::new(repo),
            store: Box::new(LocalMediaStore::new(media.path().to_path_buf(), "/media")),
            auth: Box::new(SimpleAuthProvider::new(JWT_SECRET)),
            mailer,
        });
        Self { state, outbox, media }
    }

    /// A verified account with [`PASSWORD`] and a delivery address, plus a
    /// bearer credential for it.
    pub async fn user(&self, email: &str) -> (User, String) {
        self.account(email, Role::User, Some(address())).await
    }

    pub async fn admin(&self, email: &str) -> (User, String) {
        self.account(email, Role::Admin, Some(address())).await
    }

    pub async fn account(&self, email: &str, role: Role, address: Option<Address>) -> (User, String) {
        let user = User {
            id: Uuid::now_v7(),
            name: "Asha Rao".into(),
            email: email.into(),
            password_hash: self.state.auth.hash_password(PASSWORD).await.expect("hash"),
            role,
            verified: true,
            pending_otp: None,
            mobile: None,
            address,
            created_at: Utc::now(),
        };
        self.state.repo.create_user(&user).await.expect("create user");
        let token = self.state.auth.issue_token(&user).expect("token");
        (user, token)
    }

    pub async fn product(&self, name: &str, price: Decimal, stock: i64) -> Product {
        let product = Product {
            id: Uuid::now_v7(),
            name: name.into(),
            price,
            description: format!("{name} for everyday use"),
            category: "Kitchen".into(),
            stock,
            images: vec![],
            average_rating: 0.0,
            rating_count: 0,
            created_at: Utc::now(),
        };
        self.state.repo.create_product(&product).await.expect("create product");
        product
    }
}

pub fn address() -> Address {
    Address {
        name: "Asha Rao".into(),
        phone: "9876543210".into(),
        street: "12 Lake Road".into(),
        city: "Pune".into(),
        state: "MH".into(),
        postal_code: "411001".into(),
        country: "India".into(),
    }
}

pub fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {token}"))
}

/// Runs one request and decodes the body as JSON (`Null` when empty).
pub async fn send<S, R, B>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let bytes = test::read_body(resp).await;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}
