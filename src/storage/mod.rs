pub mod json_backend;

use std::path::Path;

use crate::{errors::LedgerError, ledger::TuitionLedger};

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Abstraction over persistence backends capable of storing ledgers and
/// snapshots.
pub trait StorageBackend: Send + Sync {
    fn save(&self, ledger: &TuitionLedger, name: &str) -> Result<()>;
    fn load(&self, name: &str) -> Result<TuitionLedger>;
    fn list_backups(&self, name: &str) -> Result<Vec<String>>;
    fn backup(&self, ledger: &TuitionLedger, name: &str, note: Option<&str>) -> Result<()>;
    fn restore(&self, name: &str, backup_name: &str) -> Result<TuitionLedger>;
    fn last_ledger(&self) -> Result<Option<String>>;
    fn record_last_ledger(&self, name: Option<&str>) -> Result<()>;

    /// Optional helpers for ad-hoc file operations. Default implementations
    /// forward to plain JSON files when not overridden.
    fn save_to_path(&self, ledger: &TuitionLedger, path: &Path) -> Result<()> {
        json_backend::save_ledger_to_path(ledger, path)
    }

    fn load_from_path(&self, path: &Path) -> Result<TuitionLedger> {
        json_backend::load_ledger_from_path(path)
    }
}

pub use json_backend::{ledger_warnings, JsonStorage};
