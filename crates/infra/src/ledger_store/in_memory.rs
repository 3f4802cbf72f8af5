use std::collections::HashMap;
use std::sync::RwLock;

use tallybook_accounting::LedgerSnapshot;
use tallybook_core::OrganizationId;

use super::{LedgerStore, StoreError};

/// In-memory ledger store for tests/dev.
///
/// Snapshots are kept as serialized JSON documents keyed by organization, the
/// same shape a browser key/value store would hold.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    documents: RwLock<HashMap<OrganizationId, String>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of organizations with a stored ledger.
    pub fn len(&self) -> Result<usize, StoreError> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        Ok(documents.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn decode(document: &str) -> Result<LedgerSnapshot, StoreError> {
        serde_json::from_str(document).map_err(|e| StoreError::Deserialize(e.to_string()))
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn load_all(&self) -> Result<Vec<LedgerSnapshot>, StoreError> {
        let documents = self.documents.read().map_err(|_| poisoned())?;

        documents.values().map(|doc| Self::decode(doc)).collect()
    }

    fn load(&self, organization_id: OrganizationId) -> Result<Option<LedgerSnapshot>, StoreError> {
        let documents = self.documents.read().map_err(|_| poisoned())?;

        documents
            .get(&organization_id)
            .map(|doc| Self::decode(doc))
            .transpose()
    }

    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
        let document =
            serde_json::to_string(snapshot).map_err(|e| StoreError::Serialize(e.to_string()))?;

        let mut documents = self.documents.write().map_err(|_| poisoned())?;
        documents.insert(snapshot.organization_id, document);
        Ok(())
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}
