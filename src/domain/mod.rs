//! Domain entities for the tuition ledger.

pub mod academic_year;
pub mod billing;
pub mod common;
pub mod enrollment;
pub mod period;
pub mod promissory;

pub use academic_year::AcademicYear;
pub use billing::{
    derive_status, display_status, grace_due_date, BillingRecord, PaymentStatus, GRACE_MONTHS,
    SETTLEMENT_TOLERANCE,
};
pub use common::{Displayable, Identifiable};
pub use enrollment::{Enrollment, EnrollmentStatus};
pub use period::{Period, PeriodKind, PeriodMarkers, PLACEHOLDER_NOMINAL_AMOUNT};
pub use promissory::PromissoryNote;
