#![doc(test(attr(deny(warnings))))]

//! Tuition Core tracks, per student and academic period, how much tuition
//! is billed, how much has been paid, and the resulting obligation status,
//! driving due-date and promissory-note workflows.

pub mod cipher;
pub mod core;
pub mod domain;
pub mod errors;
pub mod ledger;
pub mod storage;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Tuition Core tracing initialized.");
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
    }
}
