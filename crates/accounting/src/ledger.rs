use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tallybook_core::{
    AccountId, DomainError, DomainResult, Entity, OrganizationId, TransactionId,
};

use crate::account::{Account, AccountType, AccountUpdate};
use crate::transaction::{NewTransaction, Transaction, entry_totals};

/// Rules a ledger enforces beyond the double-entry invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPolicy {
    /// Reject a second account with the same code in one organization.
    pub unique_codes: bool,
    /// Reject changing the type of an account that transactions already reference.
    pub lock_type_once_posted: bool,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            unique_codes: true,
            lock_type_once_posted: true,
        }
    }
}

/// Serializable state of one organization's ledger (the unit handed to storage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub organization_id: OrganizationId,
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
}

impl LedgerSnapshot {
    pub fn empty(organization_id: OrganizationId) -> Self {
        Self {
            organization_id,
            accounts: Vec::new(),
            transactions: Vec::new(),
        }
    }
}

/// One organization's chart of accounts and transaction history.
///
/// Every mutating operation validates its whole input before touching state, so
/// a failed call leaves the ledger exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    organization_id: OrganizationId,
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
    policy: LedgerPolicy,
}

impl Ledger {
    pub fn new(organization_id: OrganizationId) -> Self {
        Self {
            organization_id,
            accounts: Vec::new(),
            transactions: Vec::new(),
            policy: LedgerPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: LedgerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Rebuild a ledger from stored state.
    ///
    /// Balances are taken as stored (opening balances may predate any recorded
    /// transaction). Records from another organization, duplicate account ids and
    /// entries pointing at missing accounts are rejected.
    pub fn from_snapshot(snapshot: LedgerSnapshot, policy: LedgerPolicy) -> DomainResult<Self> {
        let org = snapshot.organization_id;

        for (i, account) in snapshot.accounts.iter().enumerate() {
            ensure_owned(org, "account", account)?;
            if snapshot.accounts[..i].iter().any(|a| a.id == account.id) {
                return Err(DomainError::conflict(format!(
                    "duplicate account id {}",
                    account.id
                )));
            }
        }

        for tx in &snapshot.transactions {
            ensure_owned(org, "transaction", tx)?;
            if let Some(line) = tx
                .entries
                .iter()
                .find(|line| !snapshot.accounts.iter().any(|a| a.id == line.account_id))
            {
                return Err(DomainError::referential(format!(
                    "transaction {} references unknown account {}",
                    tx.id, line.account_id
                )));
            }
        }

        Ok(Self {
            organization_id: org,
            accounts: snapshot.accounts,
            transactions: snapshot.transactions,
            policy,
        })
    }

    pub fn to_snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            organization_id: self.organization_id,
            accounts: self.accounts.clone(),
            transactions: self.transactions.clone(),
        }
    }

    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    pub fn policy(&self) -> LedgerPolicy {
        self.policy
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn account(&self, account_id: AccountId) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == account_id)
    }

    pub fn account_by_code(&self, code: &str) -> Option<&Account> {
        let code = code.trim();
        self.accounts
            .iter()
            .find(|a| a.code.eq_ignore_ascii_case(code))
    }

    /// Whether any recorded transaction has an entry against the account.
    pub fn is_referenced(&self, account_id: AccountId) -> bool {
        self.transactions.iter().any(|tx| tx.touches(account_id))
    }

    pub fn create_account(
        &mut self,
        name: &str,
        account_type: AccountType,
        code: &str,
    ) -> DomainResult<Account> {
        let name = required("account name", name)?;
        let code = required("account code", code)?;
        self.ensure_code_free(&code, None)?;

        let account = Account::open(self.organization_id, name, account_type, code);
        self.accounts.push(account.clone());
        Ok(account)
    }

    pub fn update_account(
        &mut self,
        account_id: AccountId,
        update: AccountUpdate,
    ) -> DomainResult<Account> {
        let index = self.index_of(account_id)?;

        let name = update
            .name
            .as_deref()
            .map(|n| required("account name", n))
            .transpose()?;
        let code = update
            .code
            .as_deref()
            .map(|c| required("account code", c))
            .transpose()?;
        if let Some(code) = &code {
            self.ensure_code_free(code, Some(account_id))?;
        }
        if let Some(new_type) = update.account_type {
            let current = self.accounts[index].account_type;
            if new_type != current
                && self.policy.lock_type_once_posted
                && self.is_referenced(account_id)
            {
                return Err(DomainError::referential(format!(
                    "cannot change type of account {account_id} from {current} to {new_type}: \
                     transactions already reference it"
                )));
            }
        }

        let account = &mut self.accounts[index];
        if let Some(name) = name {
            account.name = name;
        }
        if let Some(code) = code {
            account.code = code;
        }
        if let Some(new_type) = update.account_type {
            account.account_type = new_type;
        }
        Ok(account.clone())
    }

    pub fn delete_account(&mut self, account_id: AccountId) -> DomainResult<Account> {
        let index = self.index_of(account_id)?;
        if self.is_referenced(account_id) {
            return Err(DomainError::referential(format!(
                "cannot delete account {account_id}: transactions reference it"
            )));
        }
        Ok(self.accounts.remove(index))
    }

    /// Validate a transaction against this ledger and, if it holds, post every
    /// entry and append the transaction as one unit.
    pub fn create_transaction(
        &mut self,
        new: NewTransaction,
        recorded_at: DateTime<Utc>,
    ) -> DomainResult<Transaction> {
        let balances = self.resolve_entries(&new)?;

        for (index, balance) in balances {
            self.accounts[index].balance = balance;
        }

        let tx = Transaction {
            id: TransactionId::new(),
            date: new.date.trim().to_string(),
            description: new.description.trim().to_string(),
            entries: new.entries,
            reference: new.reference.trim().to_string(),
            organization_id: self.organization_id,
            recorded_at,
        };
        self.transactions.push(tx.clone());
        Ok(tx)
    }

    /// Check a transaction without posting it.
    ///
    /// Returns the new balance of every account the entries touch, keyed by
    /// account index; nothing is mutated.
    fn resolve_entries(&self, new: &NewTransaction) -> DomainResult<Vec<(usize, Decimal)>> {
        new.validate_shape()?;

        let mut targets = Vec::with_capacity(new.entries.len());
        for (i, line) in new.entries.iter().enumerate() {
            let index = self
                .accounts
                .iter()
                .position(|a| a.id == line.account_id)
                .ok_or_else(|| {
                    DomainError::referential(format!(
                        "entry {i} references account {} which does not exist in organization {}",
                        line.account_id, self.organization_id
                    ))
                })?;
            targets.push(index);
        }

        let (debits, credits) = entry_totals(&new.entries)?;
        if debits != credits {
            return Err(DomainError::unbalanced(debits, credits));
        }

        let mut balances: Vec<(usize, Decimal)> = Vec::with_capacity(targets.len());
        for (index, line) in targets.into_iter().zip(&new.entries) {
            let account = &self.accounts[index];
            let slot = match balances.iter().position(|(at, _)| *at == index) {
                Some(slot) => slot,
                None => {
                    balances.push((index, account.balance));
                    balances.len() - 1
                }
            };
            balances[slot].1 = account.apply_entry(balances[slot].1, line.debit, line.credit)?;
        }

        Ok(balances)
    }

    /// Current balance; unknown ids are `NotFound`, never a silent zero.
    pub fn account_balance(&self, account_id: AccountId) -> DomainResult<Decimal> {
        self.account(account_id)
            .map(|a| a.balance)
            .ok_or_else(|| not_found(account_id))
    }

    /// Accounts of one type, in creation order.
    pub fn accounts_by_type(&self, account_type: AccountType) -> Vec<Account> {
        self.accounts
            .iter()
            .filter(|a| a.account_type == account_type)
            .cloned()
            .collect()
    }

    /// Case-insensitive match on name or code. An empty query matches everything.
    pub fn search_accounts(&self, query: &str) -> Vec<Account> {
        let needle = query.trim().to_lowercase();
        self.accounts
            .iter()
            .filter(|a| {
                needle.is_empty()
                    || a.name.to_lowercase().contains(&needle)
                    || a.code.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    /// Case-insensitive match on description or reference.
    pub fn search_transactions(&self, query: &str) -> Vec<Transaction> {
        let needle = query.trim().to_lowercase();
        self.transactions
            .iter()
            .filter(|tx| {
                needle.is_empty()
                    || tx.description.to_lowercase().contains(&needle)
                    || tx.reference.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    pub(crate) fn index_of(&self, account_id: AccountId) -> DomainResult<usize> {
        self.accounts
            .iter()
            .position(|a| a.id == account_id)
            .ok_or_else(|| not_found(account_id))
    }

    fn ensure_code_free(&self, code: &str, except: Option<AccountId>) -> DomainResult<()> {
        if !self.policy.unique_codes {
            return Ok(());
        }
        match self.account_by_code(code) {
            Some(existing) if Some(existing.id) != except => Err(DomainError::conflict(format!(
                "account code '{code}' is already used by '{}'",
                existing.name
            ))),
            _ => Ok(()),
        }
    }
}

fn required(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn ensure_owned<E>(org: OrganizationId, kind: &str, record: &E) -> DomainResult<()>
where
    E: Entity,
    E::Id: core::fmt::Display,
{
    if record.organization_id() != org {
        return Err(DomainError::referential(format!(
            "{kind} {} belongs to organization {}, not {org}",
            record.id(),
            record.organization_id()
        )));
    }
    Ok(())
}

fn not_found(account_id: AccountId) -> DomainError {
    DomainError::not_found(format!("account {account_id}"))
}
