//! Infrastructure layer: ledger engine orchestration, storage adapters, config.

pub mod config;
pub mod engine;
pub mod ledger_store;


pub use config::{ConfigError, EngineConfig};
pub use engine::{EngineError, EngineResult, LedgerEngine};
pub use ledger_store::{InMemoryLedgerStore, LedgerStore, StoreError};
