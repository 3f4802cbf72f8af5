//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// balancing, referential integrity). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. empty name, single-entry transaction).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Total debits and total credits of a transaction differ.
    #[error("transaction is not balanced (debits: {debits}, credits: {credits})")]
    Unbalanced { debits: Decimal, credits: Decimal },

    /// A reference between ledger records would be broken (or already is).
    #[error("referential integrity violated: {0}")]
    ReferentialIntegrity(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation clashes with existing state (e.g. duplicate account code).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unbalanced(debits: Decimal, credits: Decimal) -> Self {
        Self::Unbalanced { debits, credits }
    }

    pub fn referential(msg: impl Into<String>) -> Self {
        Self::ReferentialIntegrity(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbalanced_message_names_both_totals() {
        let err = DomainError::unbalanced(Decimal::new(10000, 2), Decimal::new(9900, 2));
        assert_eq!(
            err.to_string(),
            "transaction is not balanced (debits: 100.00, credits: 99.00)"
        );
    }
}
