use std::path::{Path, PathBuf};
use std::sync::Once;
use std::{env, fs};

use crate::errors::LedgerError;

const DEFAULT_DIR_NAME: &str = ".tuition_core";
const LEDGER_DIR: &str = "ledgers";
const BACKUP_DIR: &str = "backups";
const STATE_FILE: &str = "state.json";

static TRACING_INIT: Once = Once::new();

/// Initializes the global tracing subscriber with sensible defaults.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter =
            EnvFilter::from_default_env().add_directive("tuition_core=info".parse().unwrap());

        fmt().with_env_filter(filter).init();
    });
}

pub fn ensure_dir(path: &Path) -> Result<(), LedgerError> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// Resolves the filesystem layout used by the storage backend.
pub struct PathResolver;

impl PathResolver {
    /// Application data directory, defaulting to `~/.tuition_core` with a
    /// `TUITION_CORE_HOME` override.
    pub fn resolve_base(root: Option<PathBuf>) -> PathBuf {
        if let Some(custom) = root {
            return custom;
        }
        if let Some(custom) = env::var_os("TUITION_CORE_HOME") {
            return PathBuf::from(custom);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DIR_NAME)
    }

    pub fn ledgers_dir_in(base: &Path) -> PathBuf {
        base.join(LEDGER_DIR)
    }

    pub fn backups_dir_in(base: &Path) -> PathBuf {
        base.join(BACKUP_DIR)
    }

    pub fn state_file_in(base: &Path) -> PathBuf {
        base.join(STATE_FILE)
    }
}
