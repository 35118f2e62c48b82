//! Bearer token issuance and verification.
//!
//! Tokens are signed with HS256 and assert the conversation, account, and
//! participant a redemption or login resolved to. The lifetime is long
//! (a year by default) but finite; see `CoreConfig::token_ttl_seconds`.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use treevite_storage::{AccountId, ConversationId, ParticipantId};

use crate::CoreError;

/// Payload stored in a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub conversation_id: String,
    pub account_id: String,
    pub participant_id: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// An issued token, ready for direct use as an `Authorization` header by
/// the calling client layer.
#[derive(Debug, Clone)]
pub struct BearerToken {
    pub token: String,
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

/// Token signer and verifier.
#[derive(Clone)]
pub struct TokenSigner {
    secret: String,
    ttl_seconds: u64,
}

impl TokenSigner {
    /// Returns an error if the secret is empty or too short.
    pub fn new(secret: &str, ttl_seconds: u64) -> Result<Self, CoreError> {
        if secret.len() < 32 {
            return Err(CoreError::Validation(
                "token_secret must be at least 32 characters".into(),
            ));
        }
        Ok(Self {
            secret: secret.to_string(),
            ttl_seconds,
        })
    }

    /// Issue a token bound to a conversation and participant.
    pub fn issue(
        &self,
        conversation_id: &ConversationId,
        account_id: &AccountId,
        participant_id: &ParticipantId,
    ) -> Result<BearerToken, CoreError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| CoreError::Token(format!("system time error: {e}")))?
            .as_secs();

        let claims = Claims {
            conversation_id: conversation_id.0.to_string(),
            account_id: account_id.0.to_string(),
            participant_id: participant_id.0.to_string(),
            iat: now,
            exp: now + self.ttl_seconds,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| CoreError::Token(format!("failed to sign token: {e}")))?;

        Ok(BearerToken {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.ttl_seconds,
        })
    }

    /// Verify and decode a token.
    pub fn verify(&self, token: &str) -> Result<Claims, CoreError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| CoreError::Token(e.to_string()))
    }
}
