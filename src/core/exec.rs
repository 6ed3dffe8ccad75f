//! Dual-path execution: prefer the server-side procedure port, fall back
//! to the direct in-ledger transaction.
//!
//! Every facade operation runs through [`with_fallback`]. A failing or
//! absent procedure is logged and absorbed; the caller only ever sees the
//! direct path's result, so both paths must share one observable contract.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::core::services::{AllocationOutcome, BalanceLine, NoticeCandidate, ServiceResult};
use crate::domain::period::PeriodKind;

pub type ProcedureResult<T> = Result<T, ProcedureError>;

/// Internal-only failure of the procedure path. Never surfaces to
/// callers; it triggers the direct fallback instead.
#[derive(Debug, thiserror::Error)]
pub enum ProcedureError {
    #[error("procedure path not available")]
    Unavailable,
    #[error("procedure failed: {0}")]
    Failed(String),
}

/// Optional server-side implementation of the ledger operations.
///
/// Every method defaults to [`ProcedureError::Unavailable`], so a port
/// only overrides the operations its backend actually provides.
#[allow(unused_variables)]
pub trait ProcedurePort: Send + Sync {
    fn save_enrollment(
        &self,
        student_id: Uuid,
        year_id: Uuid,
        period: PeriodKind,
    ) -> ProcedureResult<Uuid> {
        Err(ProcedureError::Unavailable)
    }

    fn reassign_period(
        &self,
        student_id: Uuid,
        year_id: Uuid,
        period: PeriodKind,
    ) -> ProcedureResult<Uuid> {
        Err(ProcedureError::Unavailable)
    }

    fn save_billing(
        &self,
        student_id: Uuid,
        year_id: Uuid,
        period: PeriodKind,
        amount: f64,
    ) -> ProcedureResult<Uuid> {
        Err(ProcedureError::Unavailable)
    }

    fn delete_billing(
        &self,
        student_id: Uuid,
        year_id: Uuid,
        period: Option<PeriodKind>,
    ) -> ProcedureResult<bool> {
        Err(ProcedureError::Unavailable)
    }

    fn apply_payment(
        &self,
        student_id: Uuid,
        year_id: Uuid,
        cumulative_paid: f64,
        due_date: Option<NaiveDate>,
    ) -> ProcedureResult<AllocationOutcome> {
        Err(ProcedureError::Unavailable)
    }

    fn reset_payments(&self, student_id: Uuid, year_id: Uuid) -> ProcedureResult<bool> {
        Err(ProcedureError::Unavailable)
    }

    fn eligible_for_notice(
        &self,
        year_id: Uuid,
        period: Option<PeriodKind>,
        today: NaiveDate,
    ) -> ProcedureResult<Vec<NoticeCandidate>> {
        Err(ProcedureError::Unavailable)
    }

    fn unpaid_balance_breakdown(&self, student_id: Uuid) -> ProcedureResult<Vec<BalanceLine>> {
        Err(ProcedureError::Unavailable)
    }
}

/// Port with no procedure backend; every operation takes the direct path.
#[derive(Debug, Default, Clone)]
pub struct NoProcedures;

impl ProcedurePort for NoProcedures {}

/// Fallback combinator: keep the procedure result when it succeeded,
/// otherwise log the failure and run the direct transaction. The
/// procedure error is consumed here and never reported upward.
pub fn with_fallback<T>(
    operation: &'static str,
    attempt: ProcedureResult<T>,
    direct: impl FnOnce() -> ServiceResult<T>,
) -> ServiceResult<T> {
    match attempt {
        Ok(value) => Ok(value),
        Err(ProcedureError::Unavailable) => {
            tracing::debug!(operation, "no procedure path, taking direct path");
            direct()
        }
        Err(err) => {
            tracing::warn!(operation, %err, "procedure path failed, taking direct path");
            direct()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::services::ServiceError;

    #[test]
    fn successful_procedures_short_circuit() {
        let result: ServiceResult<u32> = with_fallback("op", Ok(7), || {
            panic!("direct path must not run");
        });
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn failures_fall_back_to_the_direct_path() {
        let result = with_fallback(
            "op",
            Err::<u32, _>(ProcedureError::Failed("boom".into())),
            || Ok(41),
        );
        assert_eq!(result.unwrap(), 41);
    }

    #[test]
    fn unavailable_ports_fall_back_silently() {
        let port = NoProcedures;
        let attempt = port.reset_payments(Uuid::new_v4(), Uuid::new_v4());
        let result = with_fallback("reset_payments", attempt, || Ok(true));
        assert!(result.unwrap());
    }

    #[test]
    fn direct_path_errors_surface_unchanged() {
        let result: ServiceResult<u32> =
            with_fallback("op", Err(ProcedureError::Unavailable), || {
                Err(ServiceError::NoBillingRecords)
            });
        assert!(matches!(result, Err(ServiceError::NoBillingRecords)));
    }
}
