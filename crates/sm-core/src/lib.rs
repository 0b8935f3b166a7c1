//! shopmate/crates/sm-core/src/lib.rs
//!
//! The central domain logic and interface definitions for ShopMate.

pub mod error;
pub mod models;
pub mod otp;
pub mod services;
pub mod traits;
pub mod validation;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use otp::*;
pub use traits::*;
