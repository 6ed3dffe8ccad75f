use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::{Displayable, Identifiable};

/// Binds a student to one academic year and one period.
///
/// At most one `Active` enrollment may exist per (student, year, period)
/// triple. Enrollments are deactivated when the student's period assignment
/// changes, never hard-deleted, so billing history stays reachable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub year_id: Uuid,
    pub period_id: Uuid,
    pub status: EnrollmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(student_id: Uuid, year_id: Uuid, period_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            student_id,
            year_id,
            period_id,
            status: EnrollmentStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, EnrollmentStatus::Active)
    }

    pub fn reactivate(&mut self) {
        self.status = EnrollmentStatus::Active;
        self.updated_at = Utc::now();
    }

    pub fn deactivate(&mut self) {
        self.status = EnrollmentStatus::Deactivated;
        self.updated_at = Utc::now();
    }
}

impl Identifiable for Enrollment {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Displayable for Enrollment {
    fn display_label(&self) -> String {
        format!("{} ({:?})", self.student_id, self.status)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EnrollmentStatus {
    Active,
    Deactivated,
}
