//! Billing record upkeep for enrollments.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::core::services::{ServiceError, ServiceResult};
use crate::domain::billing::{grace_due_date, BillingRecord};
use crate::ledger::TuitionLedger;

/// Creates and refreshes the billed amount + due date for one enrollment.
pub struct BillingService;

impl BillingService {
    /// Saves the billed amount for the enrollment.
    ///
    /// The existing record is resolved by the enrollment's (student, year,
    /// period) business key first, falling back to the foreign key, so a
    /// duplicate row left behind by an earlier save is updated instead of
    /// shadowed. Updating leaves `amount_paid` alone and restores the
    /// remaining balance to the new billed amount; the due date is stamped
    /// at `today` + grace only while the record is not fully paid.
    pub fn save_billing(
        ledger: &mut TuitionLedger,
        enrollment_id: Uuid,
        amount: f64,
        today: NaiveDate,
    ) -> ServiceResult<Uuid> {
        if amount < 0.0 {
            return Err(ServiceError::Invalid(format!(
                "billed amount {amount} is negative"
            )));
        }
        let enrollment = ledger.enrollment(enrollment_id).ok_or_else(|| {
            ServiceError::Invalid(format!("enrollment {enrollment_id} not found"))
        })?;
        let (student_id, year_id, period_id) =
            (enrollment.student_id, enrollment.year_id, enrollment.period_id);

        let record_id = Self::find_by_business_key(ledger, student_id, year_id, period_id)
            .or_else(|| {
                ledger
                    .billing_for_enrollment(enrollment_id)
                    .first()
                    .map(|rec| rec.id)
            });

        match record_id {
            Some(id) => {
                if let Some(record) = ledger.billing_record_mut(id) {
                    record.rebill(amount);
                    if record.is_settled() {
                        record.due_date = None;
                    } else {
                        record.due_date = Some(grace_due_date(today));
                    }
                }
                ledger.touch();
                tracing::debug!(record = %id, amount, "updated billing record");
                Ok(id)
            }
            None => {
                let record =
                    BillingRecord::new(enrollment_id, amount, Some(grace_due_date(today)));
                let id = ledger.add_billing_record(record);
                tracing::debug!(record = %id, amount, "created billing record");
                Ok(id)
            }
        }
    }

    /// Removes the billing records tied to one enrollment. Returns `false`
    /// when none exist; absence is a no-op, not an error.
    pub fn delete_billing(ledger: &mut TuitionLedger, enrollment_id: Uuid) -> bool {
        ledger.remove_billing_for_enrollment(enrollment_id) > 0
    }

    /// Removes billing records across the student's enrollments for the
    /// year, optionally narrowed to one period.
    pub fn delete_billing_for_student(
        ledger: &mut TuitionLedger,
        student_id: Uuid,
        year_id: Uuid,
        period_id: Option<Uuid>,
    ) -> bool {
        let targets: Vec<Uuid> = ledger
            .enrollments
            .iter()
            .filter(|enr| {
                enr.student_id == student_id
                    && enr.year_id == year_id
                    && period_id.map_or(true, |period| enr.period_id == period)
            })
            .map(|enr| enr.id)
            .collect();
        let mut removed = false;
        for enrollment_id in targets {
            removed |= ledger.remove_billing_for_enrollment(enrollment_id) > 0;
        }
        removed
    }

    /// Business-key lookup: any billing record hanging off any enrollment
    /// row for the triple, regardless of enrollment status.
    fn find_by_business_key(
        ledger: &TuitionLedger,
        student_id: Uuid,
        year_id: Uuid,
        period_id: Uuid,
    ) -> Option<Uuid> {
        let enrollment_ids: Vec<Uuid> = ledger
            .enrollments_for_triple(student_id, year_id, period_id)
            .iter()
            .map(|enr| enr.id)
            .collect();
        ledger
            .billing_records
            .iter()
            .find(|rec| enrollment_ids.contains(&rec.enrollment_id))
            .map(|rec| rec.id)
    }
}
