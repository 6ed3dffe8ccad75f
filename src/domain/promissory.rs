use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::Identifiable;

/// Snapshot issued when a student with an overdue balance is granted an
/// extended due date. Immutable once created.
///
/// `balance_snapshot` holds the remaining balance as serialized by the
/// configured [`crate::cipher::BalanceCipher`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromissoryNote {
    pub id: Uuid,
    pub student_id: Uuid,
    pub created_on: NaiveDate,
    pub extended_due_date: NaiveDate,
    pub balance_snapshot: String,
    pub text: String,
}

impl PromissoryNote {
    pub fn new(
        student_id: Uuid,
        created_on: NaiveDate,
        extended_due_date: NaiveDate,
        balance_snapshot: String,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            created_on,
            extended_due_date,
            balance_snapshot,
            text: text.into(),
        }
    }
}

impl Identifiable for PromissoryNote {
    fn id(&self) -> Uuid {
        self.id
    }
}
