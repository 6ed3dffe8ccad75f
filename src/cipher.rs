//! Balance serialization collaborator.
//!
//! Promissory notes snapshot a student's remaining balance through an
//! external cipher; the core only sees the trait. Unparseable payloads are
//! skipped by callers, never fatal.

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("malformed balance payload: {0}")]
    Malformed(String),
}

/// Encodes and decodes the balance snapshots carried by promissory notes.
pub trait BalanceCipher: Send + Sync {
    fn encrypt_amount(&self, amount: f64, student_id: Uuid) -> String;
    fn decrypt_amount(&self, payload: &str, student_id: Uuid) -> Result<f64, CipherError>;
}

/// Pass-through cipher storing amounts as plain decimal strings. Default
/// for embedders that keep encryption outside the ledger.
#[derive(Debug, Default, Clone)]
pub struct PlainCipher;

impl BalanceCipher for PlainCipher {
    fn encrypt_amount(&self, amount: f64, _student_id: Uuid) -> String {
        format!("{amount:.2}")
    }

    fn decrypt_amount(&self, payload: &str, _student_id: Uuid) -> Result<f64, CipherError> {
        payload
            .trim()
            .parse::<f64>()
            .map_err(|_| CipherError::Malformed(payload.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_cipher_round_trips_amounts() {
        let cipher = PlainCipher;
        let student = Uuid::new_v4();
        let payload = cipher.encrypt_amount(1234.5, student);
        assert_eq!(cipher.decrypt_amount(&payload, student).unwrap(), 1234.5);
    }

    #[test]
    fn garbage_payloads_are_reported_not_panicked() {
        let err = PlainCipher
            .decrypt_amount("not-a-number", Uuid::new_v4())
            .expect_err("garbage must fail");
        assert!(matches!(err, CipherError::Malformed(_)));
    }
}
