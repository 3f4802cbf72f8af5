//! Ledger persistence boundary.
//!
//! The engine exchanges whole-organization [`LedgerSnapshot`]s with a store and
//! never assumes anything about how they are kept. Validation stays in the
//! domain; a store only loads and saves.

pub mod in_memory;

use std::sync::Arc;

use thiserror::Error;

use tallybook_accounting::LedgerSnapshot;
use tallybook_core::OrganizationId;

pub use in_memory::InMemoryLedgerStore;

/// Ledger store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to serialize ledger snapshot: {0}")]
    Serialize(String),

    #[error("failed to deserialize ledger snapshot: {0}")]
    Deserialize(String),

    #[error("ledger store unavailable: {0}")]
    Unavailable(String),
}

/// Load/save port for per-organization ledger state.
///
/// `save` replaces the organization's stored snapshot as a whole; the engine
/// calls it before making a mutation visible, so a failing `save` means the
/// mutation did not happen.
pub trait LedgerStore: Send + Sync {
    /// Every stored organization ledger (engine start-up).
    fn load_all(&self) -> Result<Vec<LedgerSnapshot>, StoreError>;

    fn load(&self, organization_id: OrganizationId) -> Result<Option<LedgerSnapshot>, StoreError>;

    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), StoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn load_all(&self) -> Result<Vec<LedgerSnapshot>, StoreError> {
        (**self).load_all()
    }

    fn load(&self, organization_id: OrganizationId) -> Result<Option<LedgerSnapshot>, StoreError> {
        (**self).load(organization_id)
    }

    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
        (**self).save(snapshot)
    }
}
