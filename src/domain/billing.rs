use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::Identifiable;

/// Two amounts closer than this are considered settled.
pub const SETTLEMENT_TOLERANCE: f64 = 0.01;

/// Months added to "today" when a fresh due date is stamped on an unpaid
/// record.
pub const GRACE_MONTHS: u32 = 2;

/// The billed/paid/balance ledger entry for one enrollment.
///
/// `amount_paid` is cumulative and never exceeds `billed_amount`; the
/// stored `status` is a cache of [`derive_status`] and must be recomputed
/// on every read path that reports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillingRecord {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub billed_amount: f64,
    pub amount_paid: f64,
    pub remaining_balance: f64,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl BillingRecord {
    pub fn new(enrollment_id: Uuid, billed_amount: f64, due_date: Option<NaiveDate>) -> Self {
        Self {
            id: Uuid::new_v4(),
            enrollment_id,
            billed_amount,
            amount_paid: 0.0,
            remaining_balance: billed_amount,
            status: PaymentStatus::Unpaid,
            due_date,
        }
    }

    /// Applies an allocated paid amount, capping at the billed amount and
    /// recomputing balance and status. Clears the due date once settled.
    pub fn apply_allocation(&mut self, paid: f64) {
        self.amount_paid = paid.min(self.billed_amount).max(0.0);
        self.remaining_balance = (self.billed_amount - self.amount_paid).max(0.0);
        self.status = derive_status(self.amount_paid, self.billed_amount);
        if self.status == PaymentStatus::Paid {
            self.due_date = None;
        }
    }

    /// Rebills the record. Paid amounts are left alone; the balance is
    /// restored to the full billed amount per the save contract.
    pub fn rebill(&mut self, billed_amount: f64) {
        self.billed_amount = billed_amount;
        self.remaining_balance = billed_amount;
        self.status = derive_status(self.amount_paid, self.billed_amount);
    }

    /// Bulk reset: zeroes payments, restores the balance, clears the due
    /// date. The billed amount is untouched.
    pub fn reset(&mut self) {
        self.amount_paid = 0.0;
        self.remaining_balance = self.billed_amount;
        self.status = PaymentStatus::Unpaid;
        self.due_date = None;
    }

    pub fn is_settled(&self) -> bool {
        derive_status(self.amount_paid, self.billed_amount) == PaymentStatus::Paid
    }
}

impl Identifiable for BillingRecord {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
    Overdue,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "Unpaid",
            PaymentStatus::Partial => "Partial",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Overdue => "Overdue",
        }
    }
}

/// Single source of truth for payment status. Never returns `Overdue`;
/// that label is applied at read time by [`display_status`].
pub fn derive_status(paid: f64, billed: f64) -> PaymentStatus {
    if (paid - billed).abs() < SETTLEMENT_TOLERANCE || paid >= billed {
        PaymentStatus::Paid
    } else if paid > 0.0 {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Unpaid
    }
}

/// Read-time status: recomputes from amounts and overlays `Overdue` when
/// the record is not settled and its due date lies in the past. Display
/// and eligibility filtering only; never persisted.
pub fn display_status(record: &BillingRecord, today: NaiveDate) -> PaymentStatus {
    let derived = derive_status(record.amount_paid, record.billed_amount);
    if derived != PaymentStatus::Paid && record.due_date.is_some_and(|due| due < today) {
        PaymentStatus::Overdue
    } else {
        derived
    }
}

/// Due date stamped on unpaid records when a billing amount is (re)saved.
pub fn grace_due_date(today: NaiveDate) -> NaiveDate {
    today
        .checked_add_months(Months::new(GRACE_MONTHS))
        .unwrap_or(NaiveDate::MAX)
}
