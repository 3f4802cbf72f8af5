//! `tallybook-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod money;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AccountId, OrganizationId, TransactionId};
pub use money::{MONEY_SCALE, checked_sum, ensure_amount, parse_amount};
