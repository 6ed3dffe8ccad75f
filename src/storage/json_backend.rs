use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use crate::{
    errors::LedgerError,
    ledger::TuitionLedger,
    utils::{ensure_dir, PathResolver},
};

use super::{Result, StorageBackend};

const BACKUP_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M";
const TMP_SUFFIX: &str = "tmp";
const DEFAULT_RETENTION: usize = 5;

/// File-backed storage keeping one JSON document per named ledger, with
/// timestamped backups pruned to a retention count.
#[derive(Clone)]
pub struct JsonStorage {
    ledgers_dir: PathBuf,
    backups_dir: PathBuf,
    state_file: PathBuf,
    retention: usize,
}

impl JsonStorage {
    pub fn new(root: Option<PathBuf>, retention: Option<usize>) -> Result<Self> {
        let base = PathResolver::resolve_base(root);
        ensure_dir(&base)?;
        let ledgers_dir = PathResolver::ledgers_dir_in(&base);
        let backups_dir = PathResolver::backups_dir_in(&base);
        ensure_dir(&ledgers_dir)?;
        ensure_dir(&backups_dir)?;
        Ok(Self {
            ledgers_dir,
            backups_dir,
            state_file: PathResolver::state_file_in(&base),
            retention: retention.unwrap_or(DEFAULT_RETENTION).max(1),
        })
    }

    pub fn new_default() -> Result<Self> {
        Self::new(None, None)
    }

    pub fn ledger_path(&self, name: &str) -> PathBuf {
        self.ledgers_dir
            .join(format!("{}.json", canonical_name(name)))
    }

    fn backup_dir(&self, name: &str) -> PathBuf {
        self.backups_dir.join(canonical_name(name))
    }

    pub fn backup_path(&self, name: &str, backup_name: &str) -> PathBuf {
        self.backup_dir(name).join(backup_name)
    }

    fn read_state(&self) -> Result<StoreState> {
        if self.state_file.exists() {
            let data = fs::read_to_string(&self.state_file)?;
            Ok(serde_json::from_str(&data)?)
        } else {
            Ok(StoreState::default())
        }
    }

    fn write_backup_file(
        &self,
        ledger: &TuitionLedger,
        name: &str,
        note: Option<&str>,
    ) -> Result<()> {
        let dir = self.backup_dir(name);
        ensure_dir(&dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let mut file_stem = format!("{}_{}", canonical_name(name), timestamp);
        if let Some(label) = sanitize_backup_note(note) {
            file_stem.push('_');
            file_stem.push_str(&label);
        }
        let path = dir.join(format!("{}.{}", file_stem, BACKUP_EXTENSION));
        let json = serde_json::to_string_pretty(ledger)?;
        write_atomic(&path, &json)?;
        self.prune_backups(name)?;
        Ok(())
    }

    fn prune_backups(&self, name: &str) -> Result<()> {
        let backups = self.list_backups(name)?;
        if backups.len() <= self.retention {
            return Ok(());
        }
        for entry in backups.iter().skip(self.retention) {
            let path = self.backup_path(name, entry);
            let _ = fs::remove_file(path);
        }
        Ok(())
    }
}

impl StorageBackend for JsonStorage {
    fn save(&self, ledger: &TuitionLedger, name: &str) -> Result<()> {
        let path = self.ledger_path(name);
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        let json = serde_json::to_string_pretty(ledger)?;
        let tmp = tmp_path(&path);
        write_atomic(&tmp, &json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn load(&self, name: &str) -> Result<TuitionLedger> {
        load_ledger_from_path(&self.ledger_path(name))
    }

    fn list_backups(&self, name: &str) -> Result<Vec<String>> {
        let dir = self.backup_dir(name);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(BACKUP_EXTENSION) {
                continue;
            }
            let file_name = match path.file_name().and_then(|stem| stem.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            entries.push(file_name);
        }
        entries.sort_by(|a, b| parse_backup_timestamp(b).cmp(&parse_backup_timestamp(a)));
        Ok(entries)
    }

    fn backup(&self, ledger: &TuitionLedger, name: &str, note: Option<&str>) -> Result<()> {
        self.write_backup_file(ledger, name, note)
    }

    fn restore(&self, name: &str, backup_name: &str) -> Result<TuitionLedger> {
        let backup_path = self.backup_path(name, backup_name);
        if !backup_path.exists() {
            return Err(LedgerError::Storage(format!(
                "backup `{}` not found",
                backup_name
            )));
        }
        let target = self.ledger_path(name);
        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }
        fs::copy(&backup_path, &target)?;
        load_ledger_from_path(&target)
    }

    fn last_ledger(&self) -> Result<Option<String>> {
        let state = self.read_state()?;
        Ok(state.last_ledger)
    }

    fn record_last_ledger(&self, name: Option<&str>) -> Result<()> {
        let mut state = self.read_state()?;
        state.last_ledger = name.map(canonical_name);
        let data = serde_json::to_string_pretty(&state)?;
        write_atomic(&self.state_file, &data)?;
        Ok(())
    }
}

pub fn save_ledger_to_path(ledger: &TuitionLedger, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let json = serde_json::to_string_pretty(ledger)?;
    let tmp = tmp_path(path);
    write_atomic(&tmp, &json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_ledger_from_path(path: &Path) -> Result<TuitionLedger> {
    let data = fs::read_to_string(path)?;
    let ledger: TuitionLedger = serde_json::from_str(&data)?;
    Ok(ledger)
}

/// Referential integrity sweep run after loads; dangling references are
/// reported, not repaired.
pub fn ledger_warnings(ledger: &TuitionLedger) -> Vec<String> {
    let year_ids: HashSet<_> = ledger.years.iter().map(|year| year.id).collect();
    let period_ids: HashSet<_> = ledger.periods.iter().map(|period| period.id).collect();
    let enrollment_ids: HashSet<_> = ledger.enrollments.iter().map(|enr| enr.id).collect();
    let mut warnings = Vec::new();

    for enrollment in &ledger.enrollments {
        if !year_ids.contains(&enrollment.year_id) {
            warnings.push(format!(
                "enrollment {} references unknown academic year {}",
                enrollment.id, enrollment.year_id
            ));
        }
        if !period_ids.contains(&enrollment.period_id) {
            warnings.push(format!(
                "enrollment {} references unknown period {}",
                enrollment.id, enrollment.period_id
            ));
        }
    }
    for record in &ledger.billing_records {
        if !enrollment_ids.contains(&record.enrollment_id) {
            warnings.push(format!(
                "billing record {} references unknown enrollment {}",
                record.id, record.enrollment_id
            ));
        }
        if record.amount_paid > record.billed_amount {
            warnings.push(format!(
                "billing record {} paid amount exceeds billed amount",
                record.id
            ));
        }
    }
    warnings
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    last_ledger: Option<String>,
}

fn canonical_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' => c,
            _ => '_',
        })
        .collect();
    if sanitized.trim_matches('_').is_empty() {
        "ledger".into()
    } else {
        sanitized
    }
}

fn sanitize_backup_note(note: Option<&str>) -> Option<String> {
    let raw = note?.trim();
    if raw.is_empty() {
        return None;
    }
    let mut sanitized = String::new();
    let mut last_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if ch.is_whitespace() || matches!(ch, '-' | '.') {
            if !sanitized.is_empty() && !last_dash {
                sanitized.push('-');
                last_dash = true;
            }
        }
    }
    let trimmed = sanitized.trim_matches('-').to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_backup_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = name.split('_').collect();
    if parts.len() < 3 {
        return None;
    }
    let date_part = parts.get(parts.len() - 2)?;
    let time_part = parts.last()?;
    if !is_digits(date_part, 8) || !time_part.ends_with(".json") {
        return None;
    }
    let time_digits = &time_part[..time_part.len() - 5];
    if !is_digits(time_digits, 4) {
        return None;
    }
    let raw = format!("{}{}", date_part, time_digits);
    NaiveDateTime::parse_from_str(&raw, "%Y%m%d%H%M")
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::academic_year::AcademicYear;
    use crate::domain::billing::BillingRecord;
    use crate::domain::enrollment::Enrollment;
    use crate::domain::period::{Period, PeriodKind};
    use tempfile::TempDir;
    use uuid::Uuid;

    fn storage_with_temp_dir() -> (JsonStorage, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let storage =
            JsonStorage::new(Some(temp.path().to_path_buf()), Some(3)).expect("json storage");
        (storage, temp)
    }

    fn sample_ledger() -> TuitionLedger {
        let mut ledger = TuitionLedger::new("Campus Registry");
        ledger.add_year(AcademicYear::new("2024-2025"));
        ledger.add_period(Period::new(PeriodKind::First));
        ledger
    }

    #[test]
    fn save_and_load_roundtrip() {
        let (storage, _guard) = storage_with_temp_dir();
        let ledger = sample_ledger();
        storage.save(&ledger, "campus").expect("save ledger");
        let loaded = storage.load("campus").expect("load ledger");
        assert_eq!(loaded.name, "Campus Registry");
        assert_eq!(loaded.years.len(), 1);
    }

    #[test]
    fn backup_writes_timestamped_files() {
        let (storage, _guard) = storage_with_temp_dir();
        let ledger = sample_ledger();
        storage.save(&ledger, "campus").expect("save ledger");
        storage
            .backup(&ledger, "campus", Some("term close"))
            .expect("create backup");
        let backups = storage.list_backups("campus").expect("list backups");
        assert_eq!(backups.len(), 1);
        assert!(backups[0].starts_with("campus_"));
        assert!(backups[0].contains("term-close"));
    }

    #[test]
    fn last_ledger_state_round_trips() {
        let (storage, _guard) = storage_with_temp_dir();
        assert_eq!(storage.last_ledger().unwrap(), None);
        storage.record_last_ledger(Some("Campus East")).unwrap();
        assert_eq!(storage.last_ledger().unwrap().as_deref(), Some("campus_east"));
    }

    #[test]
    fn warnings_flag_dangling_references() {
        let mut ledger = sample_ledger();
        let orphan = Enrollment::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let orphan_id = orphan.id;
        ledger.enrollments.push(orphan);
        ledger
            .billing_records
            .push(BillingRecord::new(Uuid::new_v4(), 100.0, None));

        let warnings = ledger_warnings(&ledger);
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.contains(&orphan_id.to_string())));
    }
}
