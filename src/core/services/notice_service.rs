//! Read-side queries feeding the promissory-note workflow.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::cipher::BalanceCipher;
use crate::core::services::{PeriodService, ServiceResult};
use crate::domain::billing::{derive_status, display_status, PaymentStatus};
use crate::domain::period::PeriodKind;
use crate::domain::promissory::PromissoryNote;
use crate::ledger::TuitionLedger;

/// One billing record due for a promissory notice.
#[derive(Debug, Clone, PartialEq)]
pub struct NoticeCandidate {
    pub record_id: Uuid,
    pub enrollment_id: Uuid,
    pub student_id: Uuid,
    pub period: PeriodKind,
    pub due_date: NaiveDate,
    pub remaining_balance: f64,
    pub status: PaymentStatus,
}

/// One line of a student's unpaid balance breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceLine {
    pub year_label: String,
    pub period: PeriodKind,
    pub amount: f64,
}

/// Selects records eligible for notices and issues promissory notes.
///
/// Status is always recomputed from amounts here; the stored status field
/// is never consulted.
pub struct NoticeService;

impl NoticeService {
    /// Billing records whose enrollment is Active, whose due date has
    /// arrived, whose recomputed status is not Paid, and whose student
    /// still owes across the whole year (cross-record check). Ordered by
    /// due date, ties broken by student id.
    pub fn eligible_for_notice(
        ledger: &TuitionLedger,
        year_id: Uuid,
        period_filter: Option<PeriodKind>,
        today: NaiveDate,
    ) -> Vec<NoticeCandidate> {
        let mut candidates: Vec<NoticeCandidate> = ledger
            .enrollments
            .iter()
            .filter(|enr| enr.year_id == year_id && enr.is_active())
            .filter(|enr| {
                period_filter
                    .map_or(true, |kind| PeriodService::label_of(ledger, enr.period_id) == kind)
            })
            .flat_map(|enr| {
                ledger
                    .billing_for_enrollment(enr.id)
                    .into_iter()
                    .filter_map(|rec| {
                        let due = rec.due_date?;
                        if due > today {
                            return None;
                        }
                        if derive_status(rec.amount_paid, rec.billed_amount) == PaymentStatus::Paid
                        {
                            return None;
                        }
                        if Self::outstanding_for_year(ledger, enr.student_id, year_id) <= 0.0 {
                            return None;
                        }
                        Some(NoticeCandidate {
                            record_id: rec.id,
                            enrollment_id: enr.id,
                            student_id: enr.student_id,
                            period: PeriodService::label_of(ledger, enr.period_id),
                            due_date: due,
                            remaining_balance: (rec.billed_amount - rec.amount_paid).max(0.0),
                            status: display_status(rec, today),
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.due_date
                .cmp(&b.due_date)
                .then(a.student_id.cmp(&b.student_id))
        });
        candidates
    }

    /// Per-(year, period) unpaid amounts for one student, skipping settled
    /// enrollments and zero or negative residues.
    pub fn unpaid_balance_breakdown(ledger: &TuitionLedger, student_id: Uuid) -> Vec<BalanceLine> {
        ledger
            .enrollments_of_student(student_id)
            .iter()
            .flat_map(|enr| {
                let year_label = ledger
                    .year(enr.year_id)
                    .map(|year| year.label.clone())
                    .unwrap_or_default();
                let period = PeriodService::label_of(ledger, enr.period_id);
                ledger
                    .billing_for_enrollment(enr.id)
                    .into_iter()
                    .filter(|rec| {
                        derive_status(rec.amount_paid, rec.billed_amount) != PaymentStatus::Paid
                    })
                    .filter_map(|rec| {
                        let amount = rec.billed_amount - rec.amount_paid;
                        (amount > 0.0).then(|| BalanceLine {
                            year_label: year_label.clone(),
                            period,
                            amount,
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Issues a promissory note snapshotting the student's outstanding
    /// balance through the cipher. Explicit administrative action; the
    /// note is immutable afterwards.
    pub fn create_note(
        ledger: &mut TuitionLedger,
        student_id: Uuid,
        created_on: NaiveDate,
        extended_due_date: NaiveDate,
        text: impl Into<String>,
        cipher: &dyn BalanceCipher,
    ) -> ServiceResult<Uuid> {
        let outstanding = Self::outstanding_total(ledger, student_id);
        let snapshot = cipher.encrypt_amount(outstanding, student_id);
        let note = PromissoryNote::new(student_id, created_on, extended_due_date, snapshot, text);
        let id = ledger.add_promissory_note(note);
        tracing::info!(student = %student_id, outstanding, "issued promissory note");
        Ok(id)
    }

    /// Sums the balance snapshots of a student's promissory notes,
    /// skipping payloads the cipher cannot decode.
    pub fn promissory_balance_total(
        ledger: &TuitionLedger,
        student_id: Uuid,
        cipher: &dyn BalanceCipher,
    ) -> f64 {
        ledger
            .notes_for_student(student_id)
            .iter()
            .filter_map(|note| {
                match cipher.decrypt_amount(&note.balance_snapshot, student_id) {
                    Ok(amount) => Some(amount),
                    Err(err) => {
                        tracing::warn!(note = %note.id, %err, "skipping undecodable balance snapshot");
                        None
                    }
                }
            })
            .sum()
    }

    /// Outstanding balance across all of the student's records for one
    /// year.
    fn outstanding_for_year(ledger: &TuitionLedger, student_id: Uuid, year_id: Uuid) -> f64 {
        ledger
            .enrollments
            .iter()
            .filter(|enr| enr.student_id == student_id && enr.year_id == year_id)
            .flat_map(|enr| ledger.billing_for_enrollment(enr.id))
            .map(|rec| (rec.billed_amount - rec.amount_paid).max(0.0))
            .sum()
    }

    /// Outstanding balance across every year the student appears in.
    fn outstanding_total(ledger: &TuitionLedger, student_id: Uuid) -> f64 {
        ledger
            .enrollments_of_student(student_id)
            .iter()
            .flat_map(|enr| ledger.billing_for_enrollment(enr.id))
            .map(|rec| (rec.billed_amount - rec.amount_paid).max(0.0))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::PlainCipher;
    use crate::core::services::{
        AllocationService, BillingService, EnrollmentService, PeriodService,
    };
    use crate::domain::academic_year::AcademicYear;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        ledger: TuitionLedger,
        year: Uuid,
        student: Uuid,
        record: Uuid,
    }

    fn overdue_partial_fixture() -> Fixture {
        let mut ledger = TuitionLedger::new("Registry");
        let year = ledger.add_year(AcademicYear::new("2024-2025"));
        let period = PeriodService::resolve(&mut ledger, PeriodKind::First);
        let student = Uuid::new_v4();
        let enrollment =
            EnrollmentService::get_or_create(&mut ledger, student, year, period).unwrap();
        let record =
            BillingService::save_billing(&mut ledger, enrollment, 1000.0, date(2024, 11, 1))
                .unwrap();
        AllocationService::apply_payment(&mut ledger, student, year, 500.0, Some(date(2025, 1, 9)))
            .unwrap();
        Fixture {
            ledger,
            year,
            student,
            record,
        }
    }

    #[test]
    fn overdue_partial_records_are_eligible() {
        let fixture = overdue_partial_fixture();
        let today = date(2025, 1, 10);
        let eligible =
            NoticeService::eligible_for_notice(&fixture.ledger, fixture.year, None, today);
        assert_eq!(eligible.len(), 1);
        let candidate = &eligible[0];
        assert_eq!(candidate.record_id, fixture.record);
        assert_eq!(candidate.student_id, fixture.student);
        assert_eq!(candidate.remaining_balance, 500.0);
        assert_eq!(candidate.status, PaymentStatus::Overdue);
    }

    #[test]
    fn settling_the_record_clears_eligibility_and_due_date() {
        let mut fixture = overdue_partial_fixture();
        AllocationService::apply_payment(
            &mut fixture.ledger,
            fixture.student,
            fixture.year,
            1000.0,
            None,
        )
        .unwrap();
        let eligible = NoticeService::eligible_for_notice(
            &fixture.ledger,
            fixture.year,
            None,
            date(2025, 1, 10),
        );
        assert!(eligible.is_empty());
        assert!(fixture
            .ledger
            .billing_record(fixture.record)
            .unwrap()
            .due_date
            .is_none());
    }

    #[test]
    fn eligibility_orders_by_due_date_then_student() {
        let mut ledger = TuitionLedger::new("Registry");
        let year = ledger.add_year(AcademicYear::new("2024-2025"));
        let period = PeriodService::resolve(&mut ledger, PeriodKind::First);
        let mut students: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        students.sort();

        // Same due date for the last two so the student-id tiebreak shows.
        let dues = [date(2025, 1, 3), date(2025, 1, 5), date(2025, 1, 5)];
        for (student, due) in students.iter().zip(dues) {
            let enrollment =
                EnrollmentService::get_or_create(&mut ledger, *student, year, period).unwrap();
            BillingService::save_billing(&mut ledger, enrollment, 800.0, date(2024, 11, 1))
                .unwrap();
            AllocationService::apply_payment(&mut ledger, *student, year, 100.0, Some(due))
                .unwrap();
        }

        let eligible =
            NoticeService::eligible_for_notice(&ledger, year, None, date(2025, 2, 1));
        assert_eq!(eligible.len(), 3);
        assert_eq!(eligible[0].due_date, date(2025, 1, 3));
        assert_eq!(eligible[1].student_id, students[1]);
        assert_eq!(eligible[2].student_id, students[2]);
    }

    #[test]
    fn period_filter_narrows_the_selection() {
        let fixture = overdue_partial_fixture();
        let today = date(2025, 1, 10);
        assert_eq!(
            NoticeService::eligible_for_notice(
                &fixture.ledger,
                fixture.year,
                Some(PeriodKind::Second),
                today
            )
            .len(),
            0
        );
        assert_eq!(
            NoticeService::eligible_for_notice(
                &fixture.ledger,
                fixture.year,
                Some(PeriodKind::First),
                today
            )
            .len(),
            1
        );
    }

    #[test]
    fn breakdown_lists_open_balances_and_skips_settled_ones() {
        let fixture = overdue_partial_fixture();
        let lines = NoticeService::unpaid_balance_breakdown(&fixture.ledger, fixture.student);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].year_label, "2024-2025");
        assert_eq!(lines[0].period, PeriodKind::First);
        assert_eq!(lines[0].amount, 500.0);

        let mut settled = fixture;
        AllocationService::apply_payment(
            &mut settled.ledger,
            settled.student,
            settled.year,
            1000.0,
            None,
        )
        .unwrap();
        assert!(NoticeService::unpaid_balance_breakdown(&settled.ledger, settled.student)
            .is_empty());
    }

    #[test]
    fn notes_snapshot_the_outstanding_balance_through_the_cipher() {
        let mut fixture = overdue_partial_fixture();
        let cipher = PlainCipher;
        NoticeService::create_note(
            &mut fixture.ledger,
            fixture.student,
            date(2025, 1, 10),
            date(2025, 3, 10),
            "balance carried to March",
            &cipher,
        )
        .unwrap();

        let total =
            NoticeService::promissory_balance_total(&fixture.ledger, fixture.student, &cipher);
        assert_eq!(total, 500.0);
    }

    #[test]
    fn undecodable_snapshots_are_skipped_not_fatal() {
        let mut fixture = overdue_partial_fixture();
        let cipher = PlainCipher;
        fixture.ledger.add_promissory_note(PromissoryNote::new(
            fixture.student,
            date(2025, 1, 1),
            date(2025, 2, 1),
            "###corrupt###".to_string(),
            "unreadable",
        ));
        NoticeService::create_note(
            &mut fixture.ledger,
            fixture.student,
            date(2025, 1, 10),
            date(2025, 3, 10),
            "second note",
            &cipher,
        )
        .unwrap();

        let total =
            NoticeService::promissory_balance_total(&fixture.ledger, fixture.student, &cipher);
        assert_eq!(total, 500.0);
    }
}
