//! # sm-mail-smtp
//!
//! `Mailer` implementations: SMTP delivery via lettre with Askama templates,
//! and a log-only fallback for development.

use std::time::Duration;

use askama::Template;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::{authentication::Credentials, Error as SmtpError},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sm_core::models::{Address, Order, OrderItem};
use sm_core::otp::{OtpPurpose, OTP_TTL_MINUTES};
use sm_core::traits::Mailer;
use thiserror::Error;

#[derive(Template)]
#[template(path = "email/otp.html")]
struct OtpEmailHtml<'a> {
    name: &'a str,
    code: &'a str,
    action: &'a str,
    minutes: i64,
}

#[derive(Template)]
#[template(path = "email/otp.txt")]
struct OtpEmailText<'a> {
    name: &'a str,
    code: &'a str,
    action: &'a str,
    minutes: i64,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderEmailHtml<'a> {
    order_number: &'a str,
    items: &'a [OrderItem],
    total: &'a Decimal,
    address: &'a Address,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderEmailText<'a> {
    order_number: &'a str,
    items: &'a [OrderItem],
    total: &'a Decimal,
    address: &'a Address,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

/// Subject line and call to action for each kind of code.
fn otp_wording(purpose: OtpPurpose) -> (&'static str, &'static str) {
    match purpose {
        OtpPurpose::Register => ("Verify your ShopMate account", "verify your email address"),
        OtpPurpose::Reset => ("Reset your ShopMate password", "reset your password"),
        OtpPurpose::ChangePassword => ("Confirm your ShopMate password change", "confirm your new password"),
    }
}

fn multipart(from: &str, to: &str, subject: &str, text: String, html: String) -> Result<Message, MailError> {
    let message = Message::builder()
        .from(from.parse().map_err(|_| MailError::InvalidAddress(from.to_string()))?)
        .to(to.parse().map_err(|_| MailError::InvalidAddress(to.to_string()))?)
        .subject(subject)
        .multipart(
            MultiPart::alternative()
                .singlepart(SinglePart::builder().header(ContentType::TEXT_PLAIN).body(text))
                .singlepart(SinglePart::builder().header(ContentType::TEXT_HTML).body(html)),
        )?;
    Ok(message)
}

pub fn otp_message(from: &str, to: &str, name: &str, code: &str, purpose: OtpPurpose) -> Result<Message, MailError> {
    let (subject, action) = otp_wording(purpose);
    let minutes = OTP_TTL_MINUTES;
    let html = OtpEmailHtml { name, code, action, minutes }.render()?;
    let text = OtpEmailText { name, code, action, minutes }.render()?;
    multipart(from, to, subject, text, html)
}

pub fn order_message(from: &str, to: &str, order: &Order) -> Result<Message, MailError> {
    let subject = format!("Your ShopMate order {}", order.order_number);
    let html = OrderEmailHtml {
        order_number: &order.order_number,
        items: &order.items,
        total: &order.total_amount,
        address: &order.address,
    }
    .render()?;
    let text = OrderEmailText {
        order_number: &order.order_number,
        items: &order.items,
        total: &order.total_amount,
        address: &order.address,
    }
    .render()?;
    multipart(from, to, &subject, text, html)
}

pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: SecretString,
    pub from: String,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// STARTTLS relay with optional credentials; every send is bounded by
    /// `settings.timeout`.
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            .port(settings.port)
            .timeout(Some(settings.timeout));
        if let Some(username) = &settings.username {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                settings.password.expose_secret().to_string(),
            ));
        }
        Ok(Self {
            transport: builder.build(),
            from_address: settings.from.clone(),
        })
    }

    async fn deliver(&self, message: Message, to: &str) -> Result<(), MailError> {
        self.transport.send(message).await?;
        log::info!("email sent to {to}");
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_otp(&self, to: &str, name: &str, code: &str, purpose: OtpPurpose) -> anyhow::Result<()> {
        let message = otp_message(&self.from_address, to, name, code, purpose)?;
        Ok(self.deliver(message, to).await?)
    }

    async fn send_order_confirmation(&self, to: &str, order: &Order) -> anyhow::Result<()> {
        let message = order_message(&self.from_address, to, order)?;
        Ok(self.deliver(message, to).await?)
    }
}

/// Writes messages to the log instead of sending them. Used when no SMTP
/// host is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_otp(&self, to: &str, _name: &str, code: &str, purpose: OtpPurpose) -> anyhow::Result<()> {
        log::info!("[mail disabled] {} code for {to}: {code}", purpose.as_str());
        Ok(())
    }

    async fn send_order_confirmation(&self, to: &str, order: &Order) -> anyhow::Result<()> {
        log::info!(
            "[mail disabled] confirmation for order {} ({}) to {to}",
            order.order_number,
            order.total_amount
        );
        Ok(())
    }
}
