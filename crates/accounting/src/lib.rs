//! Accounting module (double-entry ledger).
//!
//! Pure domain logic only: no IO, no logging, no persistence concerns.

pub mod account;
pub mod ledger;
pub mod report;
pub mod transaction;

pub use account::{Account, AccountType, AccountUpdate, NormalBalance};
pub use ledger::{Ledger, LedgerPolicy, LedgerSnapshot};
pub use report::{AccountActivity, ActivityLine, TrialBalance, TrialBalanceRow, TypeTotal};
pub use transaction::{EntryLine, NewTransaction, Transaction, entry_totals};
