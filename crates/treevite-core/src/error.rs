//! Error taxonomy for the core operations.
//!
//! Nothing in this subsystem auto-retries; every failure is surfaced to the
//! caller layer, which decides whether to prompt the user again. The
//! `http_status` mapping is the contract with those layers.

use thiserror::Error;

use treevite_crypto::CryptoError;
use treevite_storage::StoreError;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Missing or malformed input. Never retried automatically.
    #[error("{0}")]
    Validation(String),

    /// The code doesn't resolve to an unconsumed invite; the user must
    /// request a new one.
    #[error("invite code is invalid or has already been used")]
    InvalidOrUsedInvite,

    /// The code was valid at lookup but a concurrent request consumed it
    /// first. Distinct from `InvalidOrUsedInvite` so the caller can explain
    /// the collision rather than implying the code was always dead.
    #[error("someone else already redeemed this invite code")]
    InviteRaceLost,

    /// Wrong, unknown, or revoked login code. Deliberately
    /// indistinguishable across the three causes.
    #[error("login code invalid")]
    LoginCodeInvalid,

    /// The bounded generate-and-insert loop ran out of attempts.
    #[error("could not generate a unique invite code")]
    CodeGenerationExhausted,

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("token error: {0}")]
    Token(String),
}

impl CoreError {
    /// HTTP status the outer layer should map this failure to.
    pub fn http_status(&self) -> u16 {
        match self {
            CoreError::Validation(_)
            | CoreError::InvalidOrUsedInvite
            | CoreError::InviteRaceLost => 400,
            CoreError::LoginCodeInvalid => 401,
            CoreError::CodeGenerationExhausted
            | CoreError::Store(_)
            | CoreError::Crypto(_)
            | CoreError::Token(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(CoreError::Validation("x".into()).http_status(), 400);
        assert_eq!(CoreError::InvalidOrUsedInvite.http_status(), 400);
        assert_eq!(CoreError::InviteRaceLost.http_status(), 400);
        assert_eq!(CoreError::LoginCodeInvalid.http_status(), 401);
        assert_eq!(CoreError::CodeGenerationExhausted.http_status(), 500);
        assert_eq!(CoreError::Store(StoreError::NotFound).http_status(), 500);
    }

    #[test]
    fn test_race_lost_message_differs_from_invalid() {
        // The UI relies on these being distinguishable.
        assert_ne!(
            CoreError::InviteRaceLost.to_string(),
            CoreError::InvalidOrUsedInvite.to_string()
        );
    }
}
