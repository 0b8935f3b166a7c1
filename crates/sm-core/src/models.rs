//! # Domain Models
//!
//! These structs represent the core entities of ShopMate.
//! We use UUID v7 for time-ordered, globally unique identification;
//! orders additionally carry a human-facing sequential number.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;
use crate::otp::PendingOtp;

/// Maps a string-backed enum to and from its stored representation.
macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = AppError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                match raw {
                    $($text => Ok(Self::$variant),)+
                    other => Err(AppError::ValidationError(format!(
                        "unknown {} '{}'",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

string_enum!(Role { User => "user", Admin => "admin" });

/// Structured delivery address. Snapshotted into every order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// A registered account. Never serialized directly; see the API projections.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Stored lower-cased; unique across all users.
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub verified: bool,
    /// The outstanding one-time code, if any. Issuing a new one replaces it.
    pub pending_otp: Option<PendingOtp>,
    pub mobile: Option<String>,
    pub address: Option<Address>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Payload of the signed bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id.
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Append-only record of a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRecord {
    pub id: Uuid,
    #[serde(skip)]
    pub user_id: Uuid,
    pub logged_in_at: DateTime<Utc>,
    /// Remote address as seen by the server (or the proxy-forwarded one).
    pub origin: Option<String>,
    /// The client's User-Agent.
    pub client: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub description: String,
    pub category: String,
    pub stock: i64,
    pub images: Vec<String>,
    /// Denormalized mean of all ratings; recomputed on every new rating.
    pub average_rating: f64,
    pub rating_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Editable product fields, used for both create and full update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub price: Decimal,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    /// Case-insensitive match against name and description.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub score: u8,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

string_enum!(OrderStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Position on the forward path; `Cancelled` is off the path.
    fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Shipped => Some(2),
            Self::Delivered => Some(3),
            Self::Cancelled => None,
        }
    }

    pub fn can_cancel(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Forward moves only, plus cancellation from `pending` / `confirmed`.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if next == Self::Cancelled {
            return self.can_cancel();
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }
}

/// One product/quantity/price tuple within an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Sequential, zero-padded: "0001", "0002", ...
    pub order_number: String,
    pub user_id: Uuid,
    pub user_email: String,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    /// Delivery address as it was when the order was placed.
    pub address: Address,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Formats an allocated sequence value. Widths past 9999 simply grow.
    pub fn number_from_sequence(seq: i64) -> String {
        format!("{seq:04}")
    }
}

/// A requested purchase of `quantity` units of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub product_id: Uuid,
    pub quantity: i64,
}

/// Everything the store needs to place an order in one transaction.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub user_id: Uuid,
    pub user_email: String,
    pub address: Address,
    /// Already merged per product, every quantity >= 1.
    pub lines: Vec<LineRequest>,
    /// Remove the ordered lines from the user's cart in the same transaction.
    pub from_cart: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i64,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartLine>,
    pub total: Decimal,
}

impl Cart {
    pub fn from_lines(items: Vec<CartLine>) -> Self {
        let total = items.iter().map(|line| line.line_total).sum();
        Self { items, total }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Closed,
}

string_enum!(TicketStatus {
    Open => "open",
    InProgress => "in_progress",
    Closed => "closed",
});

impl TicketStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::InProgress => 1,
            Self::Closed => 2,
        }
    }

    /// Forward only; nothing leaves `closed`.
    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        next.rank() > self.rank()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Admin,
}

string_enum!(Sender { User => "user", Admin => "admin" });

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketMessage {
    pub sender: Sender,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportTicket {
    pub id: Uuid,
    /// Owning account, absent for anonymous submissions.
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub description: String,
    pub status: TicketStatus,
    /// Ordered, append-only thread.
    pub messages: Vec<TicketMessage>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faq {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}
