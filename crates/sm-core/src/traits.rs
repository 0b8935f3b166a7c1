//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{CredentialError, Result};
use crate::models::*;
use crate::otp::{OtpPurpose, PendingOtp};

/// Credential store: accounts, their verification state and login history.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Fails with `Conflict` when the email is already taken.
    async fn create_user(&self, user: &User) -> Result<()>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Replaces (or clears) the pending one-time code.
    async fn set_pending_otp(&self, user_id: Uuid, otp: Option<&PendingOtp>) -> Result<()>;
    /// Flips the verified flag and clears the pending code, but only while
    /// `code` is still the pending registration code. `false` when it is not.
    async fn complete_verification(&self, user_id: Uuid, code: &str) -> Result<bool>;
    /// Stores a new password hash and clears the pending code, but only while
    /// `code` is still pending for `purpose`. `false` when it is not.
    async fn commit_password(
        &self,
        user_id: Uuid,
        code: &str,
        purpose: OtpPurpose,
        password_hash: &str,
    ) -> Result<bool>;
    async fn update_profile(&self, user_id: Uuid, name: &str, mobile: Option<&str>) -> Result<()>;
    async fn update_address(&self, user_id: Uuid, address: &Address) -> Result<()>;
    /// Cascades to login history, orders, tickets and cart.
    async fn delete_user(&self, user_id: Uuid) -> Result<bool>;

    async fn record_login(&self, record: &LoginRecord) -> Result<()>;
    /// Newest first.
    async fn list_logins(&self, user_id: Uuid, limit: i64) -> Result<Vec<LoginRecord>>;
}

/// Products and their ratings.
#[async_trait]
pub trait CatalogRepo: Send + Sync {
    async fn list_products(&self, filter: &ProductFilter, limit: i64) -> Result<Vec<Product>>;
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>>;
    async fn create_product(&self, product: &Product) -> Result<()>;
    /// Replaces editable fields; rating aggregates are left alone.
    async fn update_product(&self, id: Uuid, input: &ProductInput) -> Result<Option<Product>>;
    async fn delete_product(&self, id: Uuid) -> Result<bool>;
    async fn add_product_image(&self, id: Uuid, url: &str) -> Result<Option<Product>>;

    /// Inserts the rating and recomputes the product's average and count
    /// from all of its ratings. `DuplicateRating` if the user already rated it.
    async fn add_rating(&self, rating: &Rating) -> Result<Product>;
    async fn list_ratings(&self, product_id: Uuid) -> Result<Vec<Rating>>;
}

/// Per-user persisted cart.
#[async_trait]
pub trait CartRepo: Send + Sync {
    async fn get_cart(&self, user_id: Uuid) -> Result<Vec<CartLine>>;
    /// Upsert; `quantity` must be positive.
    async fn set_cart_item(&self, user_id: Uuid, product_id: Uuid, quantity: i64) -> Result<()>;
    async fn remove_cart_item(&self, user_id: Uuid, product_id: Uuid) -> Result<bool>;
    async fn clear_cart(&self, user_id: Uuid) -> Result<()>;
}

/// Order placement engine and order lifecycle.
#[async_trait]
pub trait OrderRepo: Send + Sync {
    /// Allocates the next order number, decrements stock for every line and
    /// persists the order as one unit. Any failing line rolls everything back:
    /// `NotFound` for a missing product, `InsufficientStock` naming the product.
    async fn place_order(&self, draft: &OrderDraft) -> Result<Order>;
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>>;
    async fn list_orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>>;
    async fn list_orders(&self, limit: i64) -> Result<Vec<Order>>;
    /// Compare-and-set on status. `false` when the order is no longer in `from`.
    async fn transition_order(&self, id: Uuid, from: OrderStatus, to: OrderStatus) -> Result<bool>;
}

/// Support tickets and their threads.
#[async_trait]
pub trait TicketRepo: Send + Sync {
    async fn create_ticket(&self, ticket: &SupportTicket) -> Result<()>;
    async fn get_ticket(&self, id: Uuid) -> Result<Option<SupportTicket>>;
    /// `None` lists every ticket.
    async fn list_tickets(&self, requester: Option<Uuid>) -> Result<Vec<SupportTicket>>;
    /// Appends unless the ticket is closed and `allow_closed` is false.
    /// Returns `false` when nothing was appended.
    async fn append_message(&self, ticket_id: Uuid, message: &TicketMessage, allow_closed: bool) -> Result<bool>;
    async fn transition_ticket(&self, id: Uuid, from: TicketStatus, to: TicketStatus) -> Result<bool>;
    async fn delete_ticket(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait FaqRepo: Send + Sync {
    async fn list_faqs(&self, category: Option<&str>) -> Result<Vec<Faq>>;
    async fn create_faq(&self, faq: &Faq) -> Result<()>;
    async fn delete_faq(&self, id: Uuid) -> Result<bool>;
}

/// Everything the HTTP layer needs from persistence, behind one object.
pub trait ShopRepo: UserRepo + CatalogRepo + CartRepo + OrderRepo + TicketRepo + FaqRepo {}

impl<T> ShopRepo for T where T: UserRepo + CatalogRepo + CartRepo + OrderRepo + TicketRepo + FaqRepo {}

/// Media storage contract for product images.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Saves raw bytes and returns a media_id.
    async fn save_upload(&self, data: Vec<u8>, content_type: &str) -> anyhow::Result<String>;
    /// Returns the public URL of the stored file.
    async fn get_url(&self, media_id: &str) -> String;
}

/// Password hashing and bearer credentials.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Salted one-way hash.
    async fn hash_password(&self, password: &str) -> Result<String>;
    async fn verify_password(&self, password: &str, hash: &str) -> bool;
    /// Signed, time-limited credential for `user`.
    fn issue_token(&self, user: &User) -> Result<String>;
    fn decode_token(&self, token: &str) -> std::result::Result<Claims, CredentialError>;
}

/// Outbound email. Callers treat delivery as best-effort.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(&self, to: &str, name: &str, code: &str, purpose: OtpPurpose) -> anyhow::Result<()>;
    async fn send_order_confirmation(&self, to: &str, order: &Order) -> anyhow::Result<()>;
}
