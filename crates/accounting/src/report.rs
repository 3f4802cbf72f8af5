//! Read-only views over a ledger: trial balance, per-type totals and the
//! general-ledger activity of a single account.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tallybook_core::{AccountId, DomainResult, TransactionId, checked_sum};

use crate::account::{Account, AccountType, NormalBalance};
use crate::ledger::Ledger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub debit: Decimal,
    pub credit: Decimal,
}

impl TrialBalanceRow {
    fn from_account(account: &Account) -> Self {
        // A negative balance sits on the side opposite the normal one.
        let negative = account.balance < Decimal::ZERO;
        let (debit, credit) = match (account.normal_balance(), negative) {
            (NormalBalance::Debit, false) => (account.balance, Decimal::ZERO),
            (NormalBalance::Debit, true) => (Decimal::ZERO, -account.balance),
            (NormalBalance::Credit, false) => (Decimal::ZERO, account.balance),
            (NormalBalance::Credit, true) => (-account.balance, Decimal::ZERO),
        };
        Self {
            account_id: account.id,
            code: account.code.clone(),
            name: account.name.clone(),
            account_type: account.account_type,
            debit,
            credit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub rows: Vec<TrialBalanceRow>,
    pub total_debits: Decimal,
    pub total_credits: Decimal,
}

impl TrialBalance {
    pub fn is_balanced(&self) -> bool {
        self.total_debits == self.total_credits
    }
}

/// Sum of balances for one account type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTotal {
    pub account_type: AccountType,
    pub balance: Decimal,
}

/// One entry against an account, with the balance right after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLine {
    pub transaction_id: TransactionId,
    pub date: String,
    pub description: String,
    pub reference: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub running_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountActivity {
    pub account: Account,
    /// Balance before the first recorded entry (stored opening balance).
    pub opening_balance: Decimal,
    pub lines: Vec<ActivityLine>,
}

impl Ledger {
    /// Trial balance in chart-of-accounts order (by code).
    ///
    /// Column totals that do not fit in a `Decimal` are a validation error.
    pub fn trial_balance(&self) -> DomainResult<TrialBalance> {
        let mut accounts: Vec<&Account> = self.accounts().iter().collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));

        let rows: Vec<TrialBalanceRow> = accounts
            .into_iter()
            .map(TrialBalanceRow::from_account)
            .collect();
        let (total_debits, total_credits) = rows.iter().try_fold(
            (Decimal::ZERO, Decimal::ZERO),
            |(debits, credits), row| -> DomainResult<_> {
                Ok((
                    checked_sum("trial balance debits", debits, row.debit)?,
                    checked_sum("trial balance credits", credits, row.credit)?,
                ))
            },
        )?;

        Ok(TrialBalance {
            rows,
            total_debits,
            total_credits,
        })
    }

    /// Balance totals for each of the five account types, in [`AccountType::ALL`] order.
    pub fn totals_by_type(&self) -> DomainResult<Vec<TypeTotal>> {
        AccountType::ALL
            .into_iter()
            .map(|account_type| -> DomainResult<TypeTotal> {
                let balance = self
                    .accounts()
                    .iter()
                    .filter(|a| a.account_type == account_type)
                    .try_fold(Decimal::ZERO, |sum, a| {
                        checked_sum(&format!("{account_type} total"), sum, a.balance)
                    })?;
                Ok(TypeTotal {
                    account_type,
                    balance,
                })
            })
            .collect()
    }

    pub fn account_activity(&self, account_id: AccountId) -> DomainResult<AccountActivity> {
        let account = self.accounts()[self.index_of(account_id)?].clone();
        let kind = account.account_type;

        let touching: Vec<_> = self
            .transactions()
            .iter()
            .flat_map(|tx| {
                tx.entries
                    .iter()
                    .filter(move |line| line.account_id == account_id)
                    .map(move |line| (tx, line))
            })
            .collect();

        let mut deltas = Vec::with_capacity(touching.len());
        let mut posted = Decimal::ZERO;
        for (_, line) in &touching {
            let delta = kind.balance_delta(line.debit, line.credit)?;
            posted = checked_sum("posted activity", posted, delta)?;
            deltas.push(delta);
        }
        let opening_balance = checked_sum("opening balance", account.balance, -posted)?;

        let mut running = opening_balance;
        let mut lines = Vec::with_capacity(touching.len());
        for ((tx, line), delta) in touching.into_iter().zip(deltas) {
            running = checked_sum("running balance", running, delta)?;
            lines.push(ActivityLine {
                transaction_id: tx.id,
                date: tx.date.clone(),
                description: tx.description.clone(),
                reference: tx.reference.clone(),
                debit: line.debit,
                credit: line.credit,
                running_balance: running,
            });
        }

        Ok(AccountActivity {
            account,
            opening_balance,
            lines,
        })
    }
}
