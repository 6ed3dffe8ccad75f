use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::cipher::BalanceCipher;
use crate::core::exec::{self, NoProcedures, ProcedurePort};
use crate::core::services::{
    AllocationOutcome, AllocationService, BalanceLine, BillingService, EnrollmentService,
    NoticeCandidate, NoticeService, PeriodService, ServiceError, ServiceResult,
};
use crate::domain::academic_year::AcademicYear;
use crate::domain::period::PeriodKind;
use crate::errors::LedgerError;
use crate::ledger::{TuitionLedger, CURRENT_SCHEMA_VERSION};
use crate::storage::{ledger_warnings, StorageBackend};

/// Facade that coordinates ledger state, the dual execution path, and
/// persistence.
///
/// Every mutating operation runs against a cloned aggregate that replaces
/// the current one only on success, so a failure mid-sequence leaves no
/// partial writes. Concurrent callers serialize on the exclusive borrow.
pub struct LedgerManager {
    pub current: Option<TuitionLedger>,
    current_name: Option<String>,
    storage: Box<dyn StorageBackend>,
    procedures: Box<dyn ProcedurePort>,
}

impl LedgerManager {
    pub fn new(storage: Box<dyn StorageBackend>) -> Self {
        Self::with_procedures(storage, Box::new(NoProcedures))
    }

    pub fn with_procedures(
        storage: Box<dyn StorageBackend>,
        procedures: Box<dyn ProcedurePort>,
    ) -> Self {
        Self {
            current: None,
            current_name: None,
            storage,
            procedures,
        }
    }

    pub fn storage(&self) -> &dyn StorageBackend {
        self.storage.as_ref()
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current_name.as_deref()
    }

    pub fn set_current(&mut self, ledger: TuitionLedger, name: Option<String>) {
        self.current = Some(ledger);
        self.current_name = name;
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.current_name = None;
    }

    /// Loads a named ledger, returning referential-integrity warnings.
    pub fn load(&mut self, name: &str) -> Result<Vec<String>, LedgerError> {
        let ledger = self.storage.load(name)?;
        if ledger.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(LedgerError::Storage(format!(
                "ledger schema v{} is newer than supported v{}",
                ledger.schema_version, CURRENT_SCHEMA_VERSION
            )));
        }
        let warnings = ledger_warnings(&ledger);
        for warning in &warnings {
            tracing::warn!(ledger = name, %warning, "integrity warning on load");
        }
        self.current = Some(ledger);
        self.current_name = Some(name.to_string());
        Ok(warnings)
    }

    pub fn save(&mut self) -> Result<(), LedgerError> {
        let name = self
            .current_name
            .clone()
            .ok_or_else(|| LedgerError::Storage("current ledger is unnamed".into()))?;
        let ledger = self
            .current
            .as_ref()
            .ok_or_else(|| LedgerError::Storage("no ledger loaded".into()))?;
        self.storage.save(ledger, &name)
    }

    pub fn save_as(&mut self, name: &str) -> Result<(), LedgerError> {
        let ledger = self
            .current
            .as_ref()
            .ok_or_else(|| LedgerError::Storage("no ledger loaded".into()))?;
        self.storage.save(ledger, name)?;
        self.current_name = Some(name.to_string());
        Ok(())
    }

    pub fn backup(&self, note: Option<&str>) -> Result<(), LedgerError> {
        let name = self
            .current_name
            .as_deref()
            .ok_or_else(|| LedgerError::Storage("current ledger is unnamed".into()))?;
        let ledger = self
            .current
            .as_ref()
            .ok_or_else(|| LedgerError::Storage("no ledger loaded".into()))?;
        self.storage.backup(ledger, name, note)
    }

    pub fn last_opened(&self) -> Result<Option<String>, LedgerError> {
        self.storage.last_ledger()
    }

    pub fn record_last_opened(&self, name: Option<&str>) -> Result<(), LedgerError> {
        self.storage.record_last_ledger(name)
    }

    /// Registers a new academic year in the catalog.
    pub fn add_academic_year(&mut self, label: impl Into<String>) -> ServiceResult<Uuid> {
        let year = AcademicYear::new(label);
        self.transaction(|ledger| Ok(ledger.add_year(year)))
    }

    /// Enrolls the student in the year and period, reusing or reactivating
    /// an existing enrollment row when one exists.
    pub fn enroll_student(
        &mut self,
        student_id: Uuid,
        year_id: Uuid,
        period: PeriodKind,
    ) -> ServiceResult<Uuid> {
        let attempt = self.procedures.save_enrollment(student_id, year_id, period);
        exec::with_fallback("save_enrollment", attempt, || {
            self.transaction(|ledger| {
                let period_id = PeriodService::resolve(ledger, period);
                EnrollmentService::get_or_create(ledger, student_id, year_id, period_id)
            })
        })
    }

    /// Moves the student's period assignment for the year, leaving exactly
    /// one Active enrollment.
    pub fn reassign_period(
        &mut self,
        student_id: Uuid,
        year_id: Uuid,
        period: PeriodKind,
    ) -> ServiceResult<Uuid> {
        let attempt = self.procedures.reassign_period(student_id, year_id, period);
        exec::with_fallback("reassign_period", attempt, || {
            self.transaction(|ledger| {
                let period_id = PeriodService::resolve(ledger, period);
                EnrollmentService::reassign_period(ledger, student_id, year_id, period_id)
            })
        })
    }

    /// Saves the billed amount for the student's enrollment in the period,
    /// enrolling them first when needed. The due date is stamped at today
    /// plus the grace interval while the record stays unpaid.
    pub fn save_billing(
        &mut self,
        student_id: Uuid,
        year_id: Uuid,
        period: PeriodKind,
        amount: f64,
    ) -> ServiceResult<Uuid> {
        let attempt = self
            .procedures
            .save_billing(student_id, year_id, period, amount);
        exec::with_fallback("save_billing", attempt, || {
            let today = Utc::now().date_naive();
            self.transaction(|ledger| {
                let period_id = PeriodService::resolve(ledger, period);
                let enrollment_id =
                    EnrollmentService::get_or_create(ledger, student_id, year_id, period_id)?;
                BillingService::save_billing(ledger, enrollment_id, amount, today)
            })
        })
    }

    /// Deletes the student's billing records for the year, narrowed to one
    /// period when given. Absence reports `false`, not an error.
    pub fn delete_billing(
        &mut self,
        student_id: Uuid,
        year_id: Uuid,
        period: Option<PeriodKind>,
    ) -> ServiceResult<bool> {
        let attempt = self.procedures.delete_billing(student_id, year_id, period);
        exec::with_fallback("delete_billing", attempt, || {
            self.transaction(|ledger| {
                let period_id = match period {
                    Some(kind) => match ledger.period_of_kind(kind) {
                        Some(row) => Some(row.id),
                        None => return Ok(false),
                    },
                    None => None,
                };
                Ok(BillingService::delete_billing_for_student(
                    ledger, student_id, year_id, period_id,
                ))
            })
        })
    }

    /// Applies the student's cumulative paid total for the year,
    /// redistributing it proportionally across their billing records.
    pub fn apply_payment(
        &mut self,
        student_id: Uuid,
        year_id: Uuid,
        cumulative_paid: f64,
        due_date: Option<NaiveDate>,
    ) -> ServiceResult<AllocationOutcome> {
        let attempt = self
            .procedures
            .apply_payment(student_id, year_id, cumulative_paid, due_date);
        exec::with_fallback("apply_payment", attempt, || {
            self.transaction(|ledger| {
                AllocationService::apply_payment(
                    ledger,
                    student_id,
                    year_id,
                    cumulative_paid,
                    due_date,
                )
            })
        })
    }

    /// Clears payments on the student's records for the year. `false` when
    /// there is nothing to reset.
    pub fn reset_payments(&mut self, student_id: Uuid, year_id: Uuid) -> ServiceResult<bool> {
        let attempt = self.procedures.reset_payments(student_id, year_id);
        exec::with_fallback("reset_payments", attempt, || {
            self.transaction(|ledger| {
                Ok(AllocationService::reset_payments(
                    ledger, student_id, year_id,
                ))
            })
        })
    }

    /// Billing records due for a promissory notice as of `today`.
    pub fn eligible_for_notice(
        &self,
        year_id: Uuid,
        period: Option<PeriodKind>,
        today: NaiveDate,
    ) -> ServiceResult<Vec<NoticeCandidate>> {
        let attempt = self.procedures.eligible_for_notice(year_id, period, today);
        exec::with_fallback("eligible_for_notice", attempt, || {
            let ledger = self.ledger()?;
            Ok(NoticeService::eligible_for_notice(
                ledger, year_id, period, today,
            ))
        })
    }

    /// Per-(year, period) unpaid amounts for the student.
    pub fn unpaid_balance_breakdown(&self, student_id: Uuid) -> ServiceResult<Vec<BalanceLine>> {
        let attempt = self.procedures.unpaid_balance_breakdown(student_id);
        exec::with_fallback("unpaid_balance_breakdown", attempt, || {
            let ledger = self.ledger()?;
            Ok(NoticeService::unpaid_balance_breakdown(ledger, student_id))
        })
    }

    /// Issues a promissory note snapshotting the student's outstanding
    /// balance through the cipher.
    pub fn create_promissory_note(
        &mut self,
        student_id: Uuid,
        extended_due_date: NaiveDate,
        text: impl Into<String>,
        cipher: &dyn BalanceCipher,
    ) -> ServiceResult<Uuid> {
        let today = Utc::now().date_naive();
        let text = text.into();
        self.transaction(|ledger| {
            NoticeService::create_note(ledger, student_id, today, extended_due_date, text, cipher)
        })
    }

    /// Total of the student's promissory balance snapshots; undecodable
    /// payloads are skipped.
    pub fn promissory_balance_total(
        &self,
        student_id: Uuid,
        cipher: &dyn BalanceCipher,
    ) -> ServiceResult<f64> {
        let ledger = self.ledger()?;
        Ok(NoticeService::promissory_balance_total(
            ledger, student_id, cipher,
        ))
    }

    fn ledger(&self) -> ServiceResult<&TuitionLedger> {
        self.current
            .as_ref()
            .ok_or_else(|| ServiceError::Invalid("no ledger loaded".into()))
    }

    /// Copy-on-write transaction: the closure mutates a clone that only
    /// replaces the current aggregate when it returns `Ok`.
    fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut TuitionLedger) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let current = self
            .current
            .as_mut()
            .ok_or_else(|| ServiceError::Invalid("no ledger loaded".into()))?;
        let mut draft = current.clone();
        let value = f(&mut draft)?;
        *current = draft;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::exec::{ProcedureError, ProcedureResult};
    use crate::storage::JsonStorage;
    use tempfile::tempdir;

    fn manager() -> LedgerManager {
        let temp = tempdir().unwrap();
        let store = JsonStorage::new(Some(temp.path().to_path_buf()), Some(3)).unwrap();
        // The tempdir guard is dropped; these tests never touch storage
        // again after construction.
        let mut manager = LedgerManager::new(Box::new(store));
        manager.set_current(TuitionLedger::new("Registry"), None);
        manager
    }

    #[test]
    fn failed_transactions_leave_no_partial_writes() {
        let mut manager = manager();
        let year = manager.add_academic_year("2024-2025").unwrap();
        let student = Uuid::new_v4();

        // The billing write fails after the enrollment write succeeded;
        // both must be rolled back together.
        let err = manager
            .transaction(|ledger| {
                let period_id = PeriodService::resolve(ledger, PeriodKind::First);
                EnrollmentService::get_or_create(ledger, student, year, period_id)?;
                Err::<(), _>(ServiceError::Invalid("billing rejected".into()))
            })
            .expect_err("sequence must fail");
        assert!(matches!(err, ServiceError::Invalid(_)));
        let ledger = manager.current.as_ref().unwrap();
        assert!(ledger.enrollments.is_empty());
        assert!(ledger.periods.is_empty());
    }

    #[test]
    fn save_and_load_named_roundtrip() {
        let temp = tempdir().unwrap();
        let store = JsonStorage::new(Some(temp.path().to_path_buf()), Some(3)).unwrap();
        let mut manager = LedgerManager::new(Box::new(store));
        manager.set_current(TuitionLedger::new("Registry"), None);
        let year = manager.add_academic_year("2024-2025").unwrap();
        manager.save_as("campus").expect("save ledger");

        manager.clear();
        let warnings = manager.load("campus").expect("load ledger");
        assert!(warnings.is_empty());
        assert_eq!(manager.current_name(), Some("campus"));
        assert!(manager.current.as_ref().unwrap().year(year).is_some());
    }

    #[test]
    fn rejects_future_schema_versions() {
        let temp = tempdir().unwrap();
        let store = JsonStorage::new(Some(temp.path().to_path_buf()), Some(3)).unwrap();
        let mut ledger = TuitionLedger::new("Future");
        ledger.schema_version = CURRENT_SCHEMA_VERSION + 5;
        store.save(&ledger, "future").unwrap();

        let mut manager = LedgerManager::new(Box::new(store));
        let err = manager
            .load("future")
            .expect_err("load future schema should fail");
        match err {
            LedgerError::Storage(message) => {
                assert!(message.contains("newer"), "unexpected error: {message}");
            }
            other => panic!("expected storage error, got {other:?}"),
        }
    }

    struct FlakyPort;

    impl ProcedurePort for FlakyPort {
        fn apply_payment(
            &self,
            _student_id: Uuid,
            _year_id: Uuid,
            _cumulative_paid: f64,
            _due_date: Option<NaiveDate>,
        ) -> ProcedureResult<AllocationOutcome> {
            Err(ProcedureError::Failed("connection dropped".into()))
        }
    }

    #[test]
    fn procedure_failures_fall_back_to_the_direct_path() {
        let temp = tempdir().unwrap();
        let store = JsonStorage::new(Some(temp.path().to_path_buf()), Some(3)).unwrap();
        let mut manager = LedgerManager::with_procedures(Box::new(store), Box::new(FlakyPort));
        manager.set_current(TuitionLedger::new("Registry"), None);

        let year = manager.add_academic_year("2024-2025").unwrap();
        let student = Uuid::new_v4();
        manager
            .save_billing(student, year, PeriodKind::First, 1000.0)
            .unwrap();

        let outcome = manager
            .apply_payment(student, year, 250.0, None)
            .expect("direct path must succeed");
        assert_eq!(outcome.total_allocated, 250.0);
    }

    #[test]
    fn save_billing_enrolls_the_student_when_needed() {
        let mut manager = manager();
        let year = manager.add_academic_year("2024-2025").unwrap();
        let student = Uuid::new_v4();

        let record = manager
            .save_billing(student, year, PeriodKind::First, 3000.0)
            .unwrap();
        let ledger = manager.current.as_ref().unwrap();
        assert_eq!(ledger.active_enrollments_for(student, year).len(), 1);
        assert_eq!(
            ledger.billing_record(record).unwrap().billed_amount,
            3000.0
        );
    }
}
