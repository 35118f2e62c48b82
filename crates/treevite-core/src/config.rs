//! Service configuration: the server-side secrets and token policy the
//! operations depend on. Values come from the deployment environment; none
//! of them are stored alongside the data they protect.

use serde::Deserialize;

use crate::CoreError;

/// Default bearer-token lifetime: one year, in seconds. Low-friction
/// anonymous participants are not expected to re-authenticate on every
/// visit.
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Clone, Debug, Deserialize)]
pub struct CoreConfig {
    /// Server-side pepper for the deterministic login-code lookup hash.
    pub login_pepper: String,
    /// Keying secret for the audit fingerprint.
    pub fingerprint_key: String,
    /// Key id recorded with each fingerprint so the secret can rotate
    /// without losing historical linkage.
    pub fingerprint_key_id: String,
    /// HMAC secret for bearer-token signing.
    pub token_secret: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,
}

fn default_token_ttl() -> u64 {
    DEFAULT_TOKEN_TTL_SECONDS
}

impl CoreConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.login_pepper.is_empty() {
            return Err(CoreError::Validation("login_pepper is required".into()));
        }
        if self.fingerprint_key.is_empty() {
            return Err(CoreError::Validation("fingerprint_key is required".into()));
        }
        if self.fingerprint_key_id.is_empty() {
            return Err(CoreError::Validation(
                "fingerprint_key_id is required".into(),
            ));
        }
        if self.token_ttl_seconds == 0 {
            return Err(CoreError::Validation(
                "token_ttl_seconds must be positive".into(),
            ));
        }
        // Token secret length is enforced by TokenSigner::new.
        Ok(())
    }
}
