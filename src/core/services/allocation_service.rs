//! Proportional distribution of cumulative payments.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::core::services::{ServiceError, ServiceResult};
use crate::domain::billing::{derive_status, BillingRecord, PaymentStatus};
use crate::ledger::TuitionLedger;

/// Result of one allocation pass over a student's billing records.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationOutcome {
    pub record_ids: Vec<Uuid>,
    pub total_billed: f64,
    pub total_allocated: f64,
    pub settled: bool,
}

/// Distributes a single cumulative "amount paid" figure across every
/// billing record a student holds for a school year.
///
/// The input is the student's cumulative total for the year, not a
/// per-period payment: each record receives its billed-weighted share, so
/// re-applying the same figure is idempotent.
pub struct AllocationService;

impl AllocationService {
    /// Allocates `cumulative_paid` across the billing records of the
    /// student's Active enrollments for the year.
    ///
    /// The figure is capped at the total billed amount. A zero billed
    /// total splits equally; otherwise each record's share is frozen at
    /// `billed_i / total_billed`. When no record exists yet but an
    /// enrollment does, exactly one record is created (billed at the sum
    /// of the enrollment periods' nominal amounts) so the payment is not
    /// silently dropped. With neither records nor enrollments the call
    /// fails with [`ServiceError::NoBillingRecords`].
    ///
    /// Due dates: while the aggregate stays unsettled and a `due_date` is
    /// supplied, it is stamped on the first gathered record; once the
    /// aggregate settles, that record's due date is cleared.
    pub fn apply_payment(
        ledger: &mut TuitionLedger,
        student_id: Uuid,
        year_id: Uuid,
        cumulative_paid: f64,
        due_date: Option<NaiveDate>,
    ) -> ServiceResult<AllocationOutcome> {
        if cumulative_paid < 0.0 {
            return Err(ServiceError::Invalid(format!(
                "paid amount {cumulative_paid} is negative"
            )));
        }

        let mut record_ids = Self::gather(ledger, student_id, year_id);
        if record_ids.is_empty() {
            record_ids = vec![Self::create_fallback_record(ledger, student_id, year_id)?];
        }

        let total_billed: f64 = record_ids
            .iter()
            .filter_map(|id| ledger.billing_record(*id))
            .map(|rec| rec.billed_amount)
            .sum();
        let capped = cumulative_paid.min(total_billed);

        // Weights are frozen before any record is touched.
        let shares: Vec<f64> = record_ids
            .iter()
            .filter_map(|id| ledger.billing_record(*id))
            .map(|rec| {
                if total_billed > 0.0 {
                    rec.billed_amount / total_billed * capped
                } else {
                    capped / record_ids.len() as f64
                }
            })
            .collect();

        for (id, share) in record_ids.iter().zip(shares) {
            if let Some(record) = ledger.billing_record_mut(*id) {
                record.apply_allocation(share);
            }
        }

        let settled = derive_status(capped, total_billed) == PaymentStatus::Paid;
        if let Some(first) = record_ids.first() {
            if let Some(record) = ledger.billing_record_mut(*first) {
                if settled {
                    record.due_date = None;
                } else if let Some(due) = due_date {
                    record.due_date = Some(due);
                }
            }
        }
        ledger.touch();

        tracing::debug!(
            student = %student_id,
            allocated = capped,
            records = record_ids.len(),
            settled,
            "allocated cumulative payment"
        );
        Ok(AllocationOutcome {
            record_ids,
            total_billed,
            total_allocated: capped,
            settled,
        })
    }

    /// Zeroes payments on every gathered record: paid 0, balance restored,
    /// status Unpaid, due date cleared. Billed amounts stay as they are.
    /// Soft-fails with `false` when the student has no records.
    pub fn reset_payments(ledger: &mut TuitionLedger, student_id: Uuid, year_id: Uuid) -> bool {
        let record_ids = Self::gather(ledger, student_id, year_id);
        if record_ids.is_empty() {
            return false;
        }
        for id in &record_ids {
            if let Some(record) = ledger.billing_record_mut(*id) {
                record.reset();
            }
        }
        ledger.touch();
        tracing::debug!(student = %student_id, records = record_ids.len(), "reset payments");
        true
    }

    /// Billing records of the student's Active enrollments for the year,
    /// in enrollment insertion order.
    fn gather(ledger: &TuitionLedger, student_id: Uuid, year_id: Uuid) -> Vec<Uuid> {
        ledger
            .active_enrollments_for(student_id, year_id)
            .iter()
            .flat_map(|enr| ledger.billing_for_enrollment(enr.id))
            .map(|rec| rec.id)
            .collect()
    }

    fn create_fallback_record(
        ledger: &mut TuitionLedger,
        student_id: Uuid,
        year_id: Uuid,
    ) -> ServiceResult<Uuid> {
        let enrollments = ledger.active_enrollments_for(student_id, year_id);
        let Some(first) = enrollments.first().map(|enr| enr.id) else {
            return Err(ServiceError::NoBillingRecords);
        };
        let billed: f64 = enrollments
            .iter()
            .filter_map(|enr| ledger.period(enr.period_id))
            .map(|period| period.nominal_amount)
            .sum();
        tracing::debug!(student = %student_id, billed, "creating fallback billing record");
        Ok(ledger.add_billing_record(BillingRecord::new(first, billed, None)))
    }
}
