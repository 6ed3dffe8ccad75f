//! Idempotent enrollment registry.

use uuid::Uuid;

use crate::core::services::{ServiceError, ServiceResult};
use crate::domain::enrollment::Enrollment;
use crate::ledger::TuitionLedger;

/// Binds students to (year, period) pairs without ever duplicating an
/// active row.
pub struct EnrollmentService;

impl EnrollmentService {
    /// Returns the enrollment for the triple, preferring an existing Active
    /// row, then reactivating a Deactivated one, and only then inserting.
    pub fn get_or_create(
        ledger: &mut TuitionLedger,
        student_id: Uuid,
        year_id: Uuid,
        period_id: Uuid,
    ) -> ServiceResult<Uuid> {
        if ledger.year(year_id).is_none() {
            return Err(ServiceError::Invalid(format!(
                "academic year {year_id} not found"
            )));
        }
        if ledger.period(period_id).is_none() {
            return Err(ServiceError::Invalid(format!(
                "period {period_id} not found"
            )));
        }

        let existing = ledger.enrollments_for_triple(student_id, year_id, period_id);
        if let Some(active) = existing.iter().find(|enr| enr.is_active()) {
            return Ok(active.id);
        }
        if let Some(dormant) = existing.first() {
            let id = dormant.id;
            if let Some(enrollment) = ledger.enrollment_mut(id) {
                enrollment.reactivate();
            }
            ledger.touch();
            tracing::debug!(enrollment = %id, "reactivated dormant enrollment");
            return Ok(id);
        }

        let id = ledger.add_enrollment(Enrollment::new(student_id, year_id, period_id));
        tracing::debug!(enrollment = %id, "created enrollment");
        Ok(id)
    }

    /// Moves the student's period assignment for the year: upserts the
    /// enrollment for the new period, then deactivates every other Active
    /// enrollment for the (student, year) pair so exactly one assignment
    /// survives.
    pub fn reassign_period(
        ledger: &mut TuitionLedger,
        student_id: Uuid,
        year_id: Uuid,
        new_period_id: Uuid,
    ) -> ServiceResult<Uuid> {
        let kept = Self::get_or_create(ledger, student_id, year_id, new_period_id)?;
        let to_deactivate: Vec<Uuid> = ledger
            .active_enrollments_for(student_id, year_id)
            .iter()
            .filter(|enr| enr.id != kept)
            .map(|enr| enr.id)
            .collect();
        for id in to_deactivate {
            if let Some(enrollment) = ledger.enrollment_mut(id) {
                enrollment.deactivate();
            }
        }
        ledger.touch();
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::services::PeriodService;
    use crate::domain::academic_year::AcademicYear;
    use crate::domain::enrollment::EnrollmentStatus;
    use crate::domain::period::PeriodKind;

    fn registry() -> (TuitionLedger, Uuid, Uuid) {
        let mut ledger = TuitionLedger::new("Registry");
        let year = ledger.add_year(AcademicYear::new("2024-2025"));
        let period = PeriodService::resolve(&mut ledger, PeriodKind::First);
        (ledger, year, period)
    }

    #[test]
    fn repeated_saves_converge_on_one_row() {
        let (mut ledger, year, period) = registry();
        let student = Uuid::new_v4();
        let first = EnrollmentService::get_or_create(&mut ledger, student, year, period).unwrap();
        let second = EnrollmentService::get_or_create(&mut ledger, student, year, period).unwrap();
        assert_eq!(first, second);
        assert_eq!(ledger.enrollments.len(), 1);
    }

    #[test]
    fn dormant_rows_are_reactivated_not_duplicated() {
        let (mut ledger, year, period) = registry();
        let student = Uuid::new_v4();
        let id = EnrollmentService::get_or_create(&mut ledger, student, year, period).unwrap();
        ledger.enrollment_mut(id).unwrap().deactivate();

        let revived = EnrollmentService::get_or_create(&mut ledger, student, year, period).unwrap();
        assert_eq!(id, revived);
        assert_eq!(ledger.enrollments.len(), 1);
        assert!(ledger.enrollment(id).unwrap().is_active());
    }

    #[test]
    fn reassignment_leaves_exactly_one_active_row() {
        let (mut ledger, year, first_period) = registry();
        let second_period = PeriodService::resolve(&mut ledger, PeriodKind::Second);
        let student = Uuid::new_v4();

        let original =
            EnrollmentService::get_or_create(&mut ledger, student, year, first_period).unwrap();
        let moved =
            EnrollmentService::reassign_period(&mut ledger, student, year, second_period).unwrap();

        assert_ne!(original, moved);
        assert_eq!(
            ledger.enrollment(original).unwrap().status,
            EnrollmentStatus::Deactivated
        );
        assert!(ledger.enrollment(moved).unwrap().is_active());
        assert_eq!(ledger.active_enrollments_for(student, year).len(), 1);
    }

    #[test]
    fn unknown_year_is_rejected_before_any_write() {
        let (mut ledger, _year, period) = registry();
        let err =
            EnrollmentService::get_or_create(&mut ledger, Uuid::new_v4(), Uuid::new_v4(), period)
                .expect_err("unknown year must fail");
        assert!(matches!(err, ServiceError::Invalid(_)));
        assert!(ledger.enrollments.is_empty());
    }
}
