use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tallybook_core::{
    AccountId, DomainError, DomainResult, Entity, OrganizationId, TransactionId, checked_sum,
    ensure_amount,
};

/// One line of a transaction: a debit or a credit against one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryLine {
    pub account_id: AccountId,
    pub debit: Decimal,
    pub credit: Decimal,
}

impl EntryLine {
    pub fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: Decimal::ZERO,
        }
    }

    pub fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            debit: Decimal::ZERO,
            credit: amount,
        }
    }

    /// Exactly one side must carry a positive amount.
    fn check(&self, index: usize) -> DomainResult<()> {
        ensure_amount(&format!("entry {index} debit"), self.debit)?;
        ensure_amount(&format!("entry {index} credit"), self.credit)?;

        match (self.debit.is_zero(), self.credit.is_zero()) {
            (true, true) => Err(DomainError::validation(format!(
                "entry {index} has neither a debit nor a credit"
            ))),
            (false, false) => Err(DomainError::validation(format!(
                "entry {index} has both a debit and a credit"
            ))),
            _ => Ok(()),
        }
    }
}

/// Input for recording a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub date: String,
    pub description: String,
    pub entries: Vec<EntryLine>,
    pub reference: String,
}

impl NewTransaction {
    /// Input checks that need no ledger state, in fail-fast order.
    pub fn validate_shape(&self) -> DomainResult<()> {
        if self.date.trim().is_empty() {
            return Err(DomainError::validation("transaction date is required"));
        }
        if self.description.trim().is_empty() {
            return Err(DomainError::validation("transaction description is required"));
        }
        if self.entries.len() < 2 {
            return Err(DomainError::validation(format!(
                "transaction needs at least 2 entries (got {})",
                self.entries.len()
            )));
        }
        for (index, line) in self.entries.iter().enumerate() {
            line.check(index)?;
        }
        Ok(())
    }
}

/// Total debits and total credits of a set of entry lines.
///
/// A side whose total does not fit in a `Decimal` is a validation error.
pub fn entry_totals(entries: &[EntryLine]) -> DomainResult<(Decimal, Decimal)> {
    entries
        .iter()
        .try_fold((Decimal::ZERO, Decimal::ZERO), |(debits, credits), line| {
            Ok((
                checked_sum("total debits", debits, line.debit)?,
                checked_sum("total credits", credits, line.credit)?,
            ))
        })
}

/// A recorded, immutable double-entry transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub date: String,
    pub description: String,
    pub entries: Vec<EntryLine>,
    pub reference: String,
    pub organization_id: OrganizationId,
    pub recorded_at: DateTime<Utc>,
}

impl Transaction {
    /// Sum of the debit column.
    pub fn total(&self) -> DomainResult<Decimal> {
        entry_totals(&self.entries).map(|(debits, _)| debits)
    }

    pub fn touches(&self, account_id: AccountId) -> bool {
        self.entries.iter().any(|e| e.account_id == account_id)
    }
}

impl Entity for Transaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_tx(entries: Vec<EntryLine>) -> NewTransaction {
        NewTransaction {
            date: "2023-01-15".to_string(),
            description: "Client payment received".to_string(),
            entries,
            reference: "INV-001".to_string(),
        }
    }

    #[test]
    fn single_entry_is_rejected() {
        let tx = new_tx(vec![EntryLine::debit(AccountId::new(), Decimal::from(100))]);
        assert!(matches!(tx.validate_shape(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn entry_with_both_sides_is_rejected() {
        let both = EntryLine {
            account_id: AccountId::new(),
            debit: Decimal::from(5),
            credit: Decimal::from(5),
        };
        let tx = new_tx(vec![both, EntryLine::credit(AccountId::new(), Decimal::from(5))]);
        let err = tx.validate_shape().unwrap_err();
        assert_eq!(
            err,
            DomainError::validation("entry 0 has both a debit and a credit")
        );
    }

    #[test]
    fn entry_with_neither_side_is_rejected() {
        let tx = new_tx(vec![
            EntryLine::debit(AccountId::new(), Decimal::from(5)),
            EntryLine::credit(AccountId::new(), Decimal::ZERO),
        ]);
        let err = tx.validate_shape().unwrap_err();
        assert_eq!(
            err,
            DomainError::validation("entry 1 has neither a debit nor a credit")
        );
    }

    #[test]
    fn negative_amount_is_rejected() {
        let tx = new_tx(vec![
            EntryLine::debit(AccountId::new(), Decimal::from(-5)),
            EntryLine::credit(AccountId::new(), Decimal::from(-5)),
        ]);
        assert!(matches!(tx.validate_shape(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn blank_description_is_rejected() {
        let mut tx = new_tx(vec![
            EntryLine::debit(AccountId::new(), Decimal::from(5)),
            EntryLine::credit(AccountId::new(), Decimal::from(5)),
        ]);
        tx.description = "  ".to_string();
        assert!(matches!(tx.validate_shape(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn totals_sum_each_side() {
        let a = AccountId::new();
        let entries = vec![
            EntryLine::debit(a, Decimal::new(1050, 2)),
            EntryLine::debit(a, Decimal::new(2000, 2)),
            EntryLine::credit(a, Decimal::new(3050, 2)),
        ];
        assert_eq!(
            entry_totals(&entries).unwrap(),
            (Decimal::new(3050, 2), Decimal::new(3050, 2))
        );
    }

    #[test]
    fn totals_past_the_decimal_limit_are_rejected() {
        let a = AccountId::new();
        let entries = vec![
            EntryLine::debit(a, Decimal::MAX),
            EntryLine::debit(a, Decimal::MAX),
            EntryLine::credit(a, Decimal::MAX),
        ];
        assert_eq!(
            entry_totals(&entries),
            Err(DomainError::validation("total debits is out of range"))
        );
    }
}
