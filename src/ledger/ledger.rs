use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    academic_year::AcademicYear,
    billing::BillingRecord,
    enrollment::Enrollment,
    period::{Period, PeriodKind},
    promissory::PromissoryNote,
};

pub const CURRENT_SCHEMA_VERSION: u8 = 1;

/// In-memory aggregate holding the whole tuition registry: academic years,
/// the period catalog, enrollments, billing records, and promissory notes.
///
/// Services mutate the aggregate directly; the manager façade wraps each
/// mutating sequence in a copy-on-write transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuitionLedger {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub years: Vec<AcademicYear>,
    #[serde(default)]
    pub periods: Vec<Period>,
    #[serde(default)]
    pub enrollments: Vec<Enrollment>,
    #[serde(default)]
    pub billing_records: Vec<BillingRecord>,
    #[serde(default)]
    pub promissory_notes: Vec<PromissoryNote>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "TuitionLedger::schema_version_default")]
    pub schema_version: u8,
}

impl TuitionLedger {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            years: Vec::new(),
            periods: Vec::new(),
            enrollments: Vec::new(),
            billing_records: Vec::new(),
            promissory_notes: Vec::new(),
            created_at: now,
            updated_at: now,
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }

    pub fn add_year(&mut self, year: AcademicYear) -> Uuid {
        let id = year.id;
        self.years.push(year);
        self.touch();
        id
    }

    pub fn year(&self, id: Uuid) -> Option<&AcademicYear> {
        self.years.iter().find(|year| year.id == id)
    }

    pub fn year_by_label(&self, label: &str) -> Option<&AcademicYear> {
        self.years.iter().find(|year| year.label == label)
    }

    pub fn add_period(&mut self, period: Period) -> Uuid {
        let id = period.id;
        self.periods.push(period);
        self.touch();
        id
    }

    pub fn period(&self, id: Uuid) -> Option<&Period> {
        self.periods.iter().find(|period| period.id == id)
    }

    /// First period row of the given kind. Rows of the same kind are
    /// interchangeable, so first-match is enough.
    pub fn period_of_kind(&self, kind: PeriodKind) -> Option<&Period> {
        self.periods.iter().find(|period| period.kind == kind)
    }

    pub fn add_enrollment(&mut self, enrollment: Enrollment) -> Uuid {
        let id = enrollment.id;
        self.enrollments.push(enrollment);
        self.touch();
        id
    }

    pub fn enrollment(&self, id: Uuid) -> Option<&Enrollment> {
        self.enrollments.iter().find(|enr| enr.id == id)
    }

    pub fn enrollment_mut(&mut self, id: Uuid) -> Option<&mut Enrollment> {
        self.enrollments.iter_mut().find(|enr| enr.id == id)
    }

    /// Every enrollment for the (student, year, period) triple, any status.
    pub fn enrollments_for_triple(
        &self,
        student_id: Uuid,
        year_id: Uuid,
        period_id: Uuid,
    ) -> Vec<&Enrollment> {
        self.enrollments
            .iter()
            .filter(|enr| {
                enr.student_id == student_id
                    && enr.year_id == year_id
                    && enr.period_id == period_id
            })
            .collect()
    }

    pub fn active_enrollments_for(&self, student_id: Uuid, year_id: Uuid) -> Vec<&Enrollment> {
        self.enrollments
            .iter()
            .filter(|enr| enr.student_id == student_id && enr.year_id == year_id && enr.is_active())
            .collect()
    }

    pub fn enrollments_of_student(&self, student_id: Uuid) -> Vec<&Enrollment> {
        self.enrollments
            .iter()
            .filter(|enr| enr.student_id == student_id)
            .collect()
    }

    pub fn add_billing_record(&mut self, record: BillingRecord) -> Uuid {
        let id = record.id;
        self.billing_records.push(record);
        self.touch();
        id
    }

    pub fn billing_record(&self, id: Uuid) -> Option<&BillingRecord> {
        self.billing_records.iter().find(|rec| rec.id == id)
    }

    pub fn billing_record_mut(&mut self, id: Uuid) -> Option<&mut BillingRecord> {
        self.billing_records.iter_mut().find(|rec| rec.id == id)
    }

    pub fn billing_for_enrollment(&self, enrollment_id: Uuid) -> Vec<&BillingRecord> {
        self.billing_records
            .iter()
            .filter(|rec| rec.enrollment_id == enrollment_id)
            .collect()
    }

    /// Removes every billing record tied to the enrollment, returning how
    /// many were dropped.
    pub fn remove_billing_for_enrollment(&mut self, enrollment_id: Uuid) -> usize {
        let before = self.billing_records.len();
        self.billing_records
            .retain(|rec| rec.enrollment_id != enrollment_id);
        let removed = before - self.billing_records.len();
        if removed > 0 {
            self.touch();
        }
        removed
    }

    pub fn add_promissory_note(&mut self, note: PromissoryNote) -> Uuid {
        let id = note.id;
        self.promissory_notes.push(note);
        self.touch();
        id
    }

    pub fn notes_for_student(&self, student_id: Uuid) -> Vec<&PromissoryNote> {
        self.promissory_notes
            .iter()
            .filter(|note| note.student_id == student_id)
            .collect()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn schema_version_default() -> u8 {
        CURRENT_SCHEMA_VERSION
    }
}
