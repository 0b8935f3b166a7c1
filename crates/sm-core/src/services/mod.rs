//! # Use cases
//!
//! Orchestration over the ports. Each function validates its input, talks to
//! the repository, and treats email as a best-effort side effect.

pub mod access;
pub mod accounts;
pub mod catalog;
pub mod checkout;
pub mod support;

#[cfg(test)]
pub(crate) mod testing;
