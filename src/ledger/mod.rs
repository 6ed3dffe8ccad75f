//! Tuition ledger aggregate and persistence-friendly helpers.

#[allow(clippy::module_inception)]
pub mod ledger;

pub use ledger::{TuitionLedger, CURRENT_SCHEMA_VERSION};
