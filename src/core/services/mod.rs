pub mod allocation_service;
pub mod billing_service;
pub mod enrollment_service;
pub mod notice_service;
pub mod period_service;

pub use allocation_service::{AllocationOutcome, AllocationService};
pub use billing_service::BillingService;
pub use enrollment_service::EnrollmentService;
pub use notice_service::{BalanceLine, NoticeCandidate, NoticeService};
pub use period_service::PeriodService;

use crate::errors::LedgerError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("{0}")]
    Invalid(String),
    #[error("no billing records exist for the student and year")]
    NoBillingRecords,
}
