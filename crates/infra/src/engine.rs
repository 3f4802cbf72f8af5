//! Multi-organization ledger engine.
//!
//! Owns one [`Ledger`] per organization behind its own `RwLock`, so mutations of
//! one organization are serialized while other organizations proceed
//! independently. Reads share the lock and always see a fully applied state.
//!
//! ```text
//! mutation
//!   ↓
//! 1. Resolve the owning organization (account index for id-only calls)
//!   ↓
//! 2. Take that organization's write lock
//!   ↓
//! 3. Apply the operation to a draft copy of the ledger (validate-then-apply)
//!   ↓
//! 4. Save the draft's snapshot to the store
//!   ↓
//! 5. Re-index added or removed accounts, swap the draft in, release the lock
//! ```
//!
//! A failure at step 3 or 4 leaves the live ledger and the index untouched.
//!
//! The account index only ever misses for accounts of organizations this engine
//! has not loaded yet; a miss sweeps the store before answering `NotFound`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;

use tallybook_accounting::{
    Account, AccountActivity, AccountType, AccountUpdate, EntryLine, Ledger, NewTransaction,
    Transaction, TrialBalance, TypeTotal,
};
use tallybook_core::{AccountId, DomainError, DomainResult, OrganizationId};

use crate::config::EngineConfig;
use crate::ledger_store::{LedgerStore, StoreError};

#[derive(Debug, Error)]
pub enum EngineError {
    /// The operation was rejected by ledger rules; nothing changed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The store refused the new state; nothing changed.
    #[error("ledger store failed: {0}")]
    Store(#[from] StoreError),

    #[error("ledger state lock poisoned")]
    Poisoned,
}

impl EngineError {
    /// The domain rejection behind this error, if that is what it is.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            EngineError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

type SharedLedger = Arc<RwLock<Ledger>>;
type AccountIndex = HashMap<AccountId, OrganizationId>;

/// Ledger engine over a [`LedgerStore`].
///
/// Callers only ever receive clones of accounts and transactions.
pub struct LedgerEngine<S> {
    store: S,
    config: EngineConfig,
    ledgers: RwLock<HashMap<OrganizationId, SharedLedger>>,
    account_index: RwLock<AccountIndex>,
}

impl<S> core::fmt::Debug for LedgerEngine<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LedgerEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Engine that loads organization ledgers from the store on first use.
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            ledgers: RwLock::new(HashMap::new()),
            account_index: RwLock::new(HashMap::new()),
        }
    }

    /// Engine with every stored organization loaded up front.
    pub fn load(store: S, config: EngineConfig) -> EngineResult<Self> {
        let engine = Self::new(store, config);
        engine.load_stored()?;
        Ok(engine)
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    pub fn create_account(
        &self,
        name: &str,
        account_type: AccountType,
        code: &str,
        organization_id: OrganizationId,
    ) -> EngineResult<Account> {
        let account = self.mutate(organization_id, "create_account", |ledger| {
            ledger.create_account(name, account_type, code)
        })?;

        tracing::info!(
            "created {} account {} ({}) for organization {}",
            account.account_type,
            account.code,
            account.id,
            organization_id
        );
        Ok(account)
    }

    pub fn update_account(
        &self,
        account_id: AccountId,
        update: AccountUpdate,
    ) -> EngineResult<Account> {
        if update.is_empty() {
            return self.account(account_id);
        }

        let org = self.owner_of(account_id)?;
        let account = self.mutate(org, "update_account", |ledger| {
            ledger.update_account(account_id, update)
        })?;

        tracing::info!("updated account {} in organization {}", account_id, org);
        Ok(account)
    }

    pub fn delete_account(&self, account_id: AccountId) -> EngineResult<()> {
        let org = self.owner_of(account_id)?;
        self.mutate(org, "delete_account", |ledger| {
            ledger.delete_account(account_id)
        })?;

        tracing::info!("deleted account {} from organization {}", account_id, org);
        Ok(())
    }

    /// Validate and record a double-entry transaction for an organization.
    pub fn create_transaction(
        &self,
        date: &str,
        description: &str,
        entries: Vec<EntryLine>,
        reference: &str,
        organization_id: OrganizationId,
    ) -> EngineResult<Transaction> {
        let new = NewTransaction {
            date: date.to_string(),
            description: description.to_string(),
            entries,
            reference: reference.to_string(),
        };

        let tx = self.mutate(organization_id, "create_transaction", |ledger| {
            ledger.create_transaction(new, Utc::now())
        })?;

        tracing::info!(
            "recorded transaction {} for organization {} ({} entries)",
            tx.id,
            organization_id,
            tx.entries.len()
        );
        Ok(tx)
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Current balance of an account; `NotFound` for unknown ids.
    pub fn get_account_balance(&self, account_id: AccountId) -> EngineResult<Decimal> {
        let org = self.owner_of(account_id)?;
        self.read(org, |ledger| ledger.account_balance(account_id))
    }

    pub fn get_accounts_by_type(
        &self,
        account_type: AccountType,
        organization_id: OrganizationId,
    ) -> EngineResult<Vec<Account>> {
        self.read(organization_id, |ledger| {
            Ok(ledger.accounts_by_type(account_type))
        })
    }

    pub fn account(&self, account_id: AccountId) -> EngineResult<Account> {
        let org = self.owner_of(account_id)?;
        self.read(org, |ledger| {
            ledger
                .account(account_id)
                .cloned()
                .ok_or_else(|| DomainError::not_found(format!("account {account_id}")))
        })
    }

    pub fn accounts(&self, organization_id: OrganizationId) -> EngineResult<Vec<Account>> {
        self.read(organization_id, |ledger| Ok(ledger.accounts().to_vec()))
    }

    pub fn transactions(&self, organization_id: OrganizationId) -> EngineResult<Vec<Transaction>> {
        self.read(organization_id, |ledger| Ok(ledger.transactions().to_vec()))
    }

    pub fn search_accounts(
        &self,
        organization_id: OrganizationId,
        query: &str,
    ) -> EngineResult<Vec<Account>> {
        self.read(organization_id, |ledger| Ok(ledger.search_accounts(query)))
    }

    pub fn search_transactions(
        &self,
        organization_id: OrganizationId,
        query: &str,
    ) -> EngineResult<Vec<Transaction>> {
        self.read(organization_id, |ledger| Ok(ledger.search_transactions(query)))
    }

    pub fn account_activity(&self, account_id: AccountId) -> EngineResult<AccountActivity> {
        let org = self.owner_of(account_id)?;
        self.read(org, |ledger| ledger.account_activity(account_id))
    }

    pub fn trial_balance(&self, organization_id: OrganizationId) -> EngineResult<TrialBalance> {
        self.read(organization_id, |ledger| ledger.trial_balance())
    }

    pub fn totals_by_type(&self, organization_id: OrganizationId) -> EngineResult<Vec<TypeTotal>> {
        self.read(organization_id, |ledger| ledger.totals_by_type())
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn owner_of(&self, account_id: AccountId) -> EngineResult<OrganizationId> {
        if let Some(org) = self.indexed_owner(account_id)? {
            return Ok(org);
        }

        // The account may belong to a stored organization not loaded yet.
        self.load_stored()?;
        self.indexed_owner(account_id)?
            .ok_or_else(|| DomainError::not_found(format!("account {account_id}")).into())
    }

    fn indexed_owner(&self, account_id: AccountId) -> EngineResult<Option<OrganizationId>> {
        let index = self.account_index.read().map_err(|_| EngineError::Poisoned)?;
        Ok(index.get(&account_id).copied())
    }

    /// Load and index every stored organization this engine does not hold yet.
    fn load_stored(&self) -> EngineResult<()> {
        let snapshots = self.store.load_all()?;

        let mut ledgers = self.ledgers.write().map_err(|_| EngineError::Poisoned)?;
        let mut index = self.account_index.write().map_err(|_| EngineError::Poisoned)?;
        for snapshot in snapshots {
            if ledgers.contains_key(&snapshot.organization_id) {
                continue;
            }
            let ledger = Ledger::from_snapshot(snapshot, self.config.policy())?;
            let org = ledger.organization_id();
            index_accounts(&mut index, &ledger);
            tracing::debug!(
                "loaded ledger for organization {} ({} accounts, {} transactions)",
                org,
                ledger.accounts().len(),
                ledger.transactions().len()
            );
            ledgers.insert(org, Arc::new(RwLock::new(ledger)));
        }
        Ok(())
    }

    fn existing(&self, organization_id: OrganizationId) -> EngineResult<Option<SharedLedger>> {
        let ledgers = self.ledgers.read().map_err(|_| EngineError::Poisoned)?;
        Ok(ledgers.get(&organization_id).cloned())
    }

    /// Ledger for an organization, loading it from the store or starting an
    /// empty one the first time it is touched.
    fn ledger_for(&self, organization_id: OrganizationId) -> EngineResult<SharedLedger> {
        if let Some(ledger) = self.existing(organization_id)? {
            return Ok(ledger);
        }

        let mut ledgers = self.ledgers.write().map_err(|_| EngineError::Poisoned)?;
        // Another writer may have loaded it while we waited for the lock.
        if let Some(ledger) = ledgers.get(&organization_id) {
            return Ok(ledger.clone());
        }

        let ledger = match self.store.load(organization_id)? {
            Some(snapshot) => {
                if snapshot.organization_id != organization_id {
                    return Err(DomainError::referential(format!(
                        "store returned ledger of organization {} for {}",
                        snapshot.organization_id, organization_id
                    ))
                    .into());
                }
                let ledger = Ledger::from_snapshot(snapshot, self.config.policy())?;
                let mut index = self.account_index.write().map_err(|_| EngineError::Poisoned)?;
                index_accounts(&mut index, &ledger);
                ledger
            }
            None => Ledger::new(organization_id).with_policy(self.config.policy()),
        };

        let shared = Arc::new(RwLock::new(ledger));
        ledgers.insert(organization_id, shared.clone());
        Ok(shared)
    }

    fn mutate<T>(
        &self,
        organization_id: OrganizationId,
        operation: &'static str,
        op: impl FnOnce(&mut Ledger) -> DomainResult<T>,
    ) -> EngineResult<T> {
        let shared = self.ledger_for(organization_id)?;
        let mut live = shared.write().map_err(|_| EngineError::Poisoned)?;

        let mut draft = live.clone();
        let out = op(&mut draft).inspect_err(|e| {
            tracing::warn!(
                "{} rejected for organization {}: {}",
                operation,
                organization_id,
                e
            );
        })?;

        // Taken before saving so nothing can fail once the store has the new state.
        let mut index = if draft.accounts().len() != live.accounts().len() {
            Some(self.account_index.write().map_err(|_| EngineError::Poisoned)?)
        } else {
            None
        };

        self.store.save(&draft.to_snapshot()).inspect_err(|e| {
            tracing::error!(
                "{} not committed for organization {}: {}",
                operation,
                organization_id,
                e
            );
        })?;

        if let Some(index) = index.as_mut() {
            for account in live.accounts() {
                index.remove(&account.id);
            }
            index_accounts(index, &draft);
        }
        *live = draft;
        Ok(out)
    }

    /// Run a query against a consistent view of an organization's ledger.
    ///
    /// Organizations with nothing recorded read as an empty ledger.
    fn read<T>(
        &self,
        organization_id: OrganizationId,
        query: impl FnOnce(&Ledger) -> DomainResult<T>,
    ) -> EngineResult<T> {
        match self.existing(organization_id)? {
            Some(shared) => {
                let ledger = shared.read().map_err(|_| EngineError::Poisoned)?;
                Ok(query(&*ledger)?)
            }
            None => match self.store.load(organization_id)? {
                Some(_) => {
                    let shared = self.ledger_for(organization_id)?;
                    let ledger = shared.read().map_err(|_| EngineError::Poisoned)?;
                    Ok(query(&*ledger)?)
                }
                None => Ok(query(&Ledger::new(organization_id))?),
            },
        }
    }
}

fn index_accounts(index: &mut AccountIndex, ledger: &Ledger) {
    let org = ledger.organization_id();
    for account in ledger.accounts() {
        index.insert(account.id, org);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger_store::InMemoryLedgerStore;

    fn engine() -> LedgerEngine<Arc<InMemoryLedgerStore>> {
        LedgerEngine::new(Arc::new(InMemoryLedgerStore::new()), EngineConfig::default())
    }

    fn dec(units: i64) -> Decimal {
        Decimal::from(units)
    }

    #[test]
    fn create_account_is_indexed_and_persisted() {
        let engine = engine();
        let org = OrganizationId::new();
        let cash = engine
            .create_account("Cash", AccountType::Asset, "1000", org)
            .unwrap();

        assert_eq!(engine.account(cash.id).unwrap(), cash);
        assert_eq!(engine.get_account_balance(cash.id).unwrap(), Decimal::ZERO);

        let stored = engine.store().load(org).unwrap().unwrap();
        assert_eq!(stored.accounts, vec![cash]);
    }

    #[test]
    fn create_account_validation_error_surfaces_as_domain_error() {
        let engine = engine();
        let err = engine
            .create_account("", AccountType::Asset, "1000", OrganizationId::new())
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::Validation(_))));
    }

    #[test]
    fn posting_updates_balances_by_sign_convention() {
        let engine = engine();
        let org = OrganizationId::new();
        let cash = engine
            .create_account("Cash", AccountType::Asset, "1000", org)
            .unwrap();
        let loan = engine
            .create_account("Loans Payable", AccountType::Liability, "2100", org)
            .unwrap();

        engine
            .create_transaction(
                "2023-02-01",
                "Loan drawdown",
                vec![EntryLine::debit(cash.id, dec(1000)), EntryLine::credit(loan.id, dec(1000))],
                "LOAN-1",
                org,
            )
            .unwrap();
        engine
            .create_transaction(
                "2023-03-01",
                "Loan repayment",
                vec![EntryLine::debit(loan.id, dec(200)), EntryLine::credit(cash.id, dec(200))],
                "LOAN-2",
                org,
            )
            .unwrap();

        assert_eq!(engine.get_account_balance(cash.id).unwrap(), dec(800));
        assert_eq!(engine.get_account_balance(loan.id).unwrap(), dec(800));
        assert_eq!(engine.transactions(org).unwrap().len(), 2);
    }

    #[test]
    fn unknown_account_balance_is_not_found() {
        let engine = engine();
        let err = engine.get_account_balance(AccountId::new()).unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::NotFound(_))));
    }

    #[test]
    fn delete_account_guards_references() {
        let engine = engine();
        let org = OrganizationId::new();
        let cash = engine
            .create_account("Cash", AccountType::Asset, "1000", org)
            .unwrap();
        let sales = engine
            .create_account("Sales", AccountType::Revenue, "4000", org)
            .unwrap();
        let spare = engine
            .create_account("Spare", AccountType::Expense, "5999", org)
            .unwrap();
        engine
            .create_transaction(
                "2023-01-15",
                "Cash sale",
                vec![EntryLine::debit(cash.id, dec(10)), EntryLine::credit(sales.id, dec(10))],
                "",
                org,
            )
            .unwrap();

        let err = engine.delete_account(cash.id).unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(DomainError::ReferentialIntegrity(_))
        ));
        assert!(engine.account(cash.id).is_ok());

        engine.delete_account(spare.id).unwrap();
        assert!(matches!(
            engine.account(spare.id).unwrap_err().as_domain(),
            Some(DomainError::NotFound(_))
        ));
        assert_eq!(engine.accounts(org).unwrap().len(), 2);
    }

    #[test]
    fn update_account_resolves_owner_from_id() {
        let engine = engine();
        let org = OrganizationId::new();
        let cash = engine
            .create_account("Cash", AccountType::Asset, "1000", org)
            .unwrap();
        let renamed = engine
            .update_account(cash.id, AccountUpdate::default().name("Petty Cash"))
            .unwrap();
        assert_eq!(renamed.name, "Petty Cash");
        assert_eq!(engine.search_accounts(org, "petty").unwrap(), vec![renamed]);
    }

    #[test]
    fn unknown_organization_reads_as_empty() {
        let engine = engine();
        let org = OrganizationId::new();
        assert!(engine
            .get_accounts_by_type(AccountType::Asset, org)
            .unwrap()
            .is_empty());
        assert!(engine.trial_balance(org).unwrap().rows.is_empty());
        assert!(engine.store().is_empty().unwrap());
    }

    /// Engine over a store that already holds Cash and Spare for `org`.
    fn stored_books() -> (Arc<InMemoryLedgerStore>, OrganizationId, Account, Account) {
        let store = Arc::new(InMemoryLedgerStore::new());
        let org = OrganizationId::new();
        let first = LedgerEngine::new(store.clone(), EngineConfig::default());
        let cash = first
            .create_account("Cash", AccountType::Asset, "1000", org)
            .unwrap();
        let spare = first
            .create_account("Spare", AccountType::Expense, "5999", org)
            .unwrap();
        (store, org, cash, spare)
    }

    #[test]
    fn new_engine_loads_stored_ledgers_lazily() {
        let (store, org, cash, spare) = stored_books();

        let second = LedgerEngine::new(store, EngineConfig::default());
        let accounts = second.accounts(org).unwrap();
        assert_eq!(accounts, vec![cash.clone(), spare]);
        assert_eq!(second.get_account_balance(cash.id).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn id_only_calls_find_stored_accounts_on_a_fresh_engine() {
        let (store, org, cash, spare) = stored_books();

        let second = LedgerEngine::new(store.clone(), EngineConfig::default());
        assert_eq!(second.get_account_balance(cash.id).unwrap(), Decimal::ZERO);

        let third = LedgerEngine::new(store.clone(), EngineConfig::default());
        assert_eq!(third.account(cash.id).unwrap(), cash);
        assert!(third.account_activity(cash.id).unwrap().lines.is_empty());

        let fourth = LedgerEngine::new(store.clone(), EngineConfig::default());
        let renamed = fourth
            .update_account(cash.id, AccountUpdate::default().name("Cash on Hand"))
            .unwrap();
        assert_eq!(renamed.name, "Cash on Hand");

        let fifth = LedgerEngine::new(store.clone(), EngineConfig::default());
        fifth.delete_account(spare.id).unwrap();
        assert_eq!(fifth.accounts(org).unwrap(), vec![renamed]);
        assert_eq!(store.load(org).unwrap().unwrap().accounts.len(), 1);

        // Still a distinct signal once the store has been swept.
        assert!(matches!(
            fifth.get_account_balance(AccountId::new()).unwrap_err().as_domain(),
            Some(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn account_index_follows_create_and_delete() {
        let engine = engine();
        let org = OrganizationId::new();
        let cash = engine
            .create_account("Cash", AccountType::Asset, "1000", org)
            .unwrap();
        assert_eq!(engine.indexed_owner(cash.id).unwrap(), Some(org));

        engine.delete_account(cash.id).unwrap();
        assert_eq!(engine.indexed_owner(cash.id).unwrap(), None);
    }

    #[test]
    fn rejected_create_leaves_index_unchanged() {
        let engine = engine();
        let org = OrganizationId::new();
        engine
            .create_account("Cash", AccountType::Asset, "1000", org)
            .unwrap();
        let err = engine
            .create_account("Bank", AccountType::Asset, "1000", org)
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::Conflict(_))));
        assert_eq!(engine.account_index.read().unwrap().len(), 1);
    }
}
