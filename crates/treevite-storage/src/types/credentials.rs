//! Login credential types.
//!
//! A participant's reusable login code is never stored in plaintext. Three
//! derivations are kept instead: a slow salted verification hash (the only
//! value consulted for verification), a deterministic peppered lookup hash
//! (index-only, because the salted hash cannot be queried by equality), and
//! a keyed fingerprint tagged with its key id (audit/linkage only, survives
//! key rotation).

use chrono::{DateTime, Utc};

use super::{ConversationId, ParticipantId};

/// Login credential record. At most one live row per
/// `(conversation_id, participant_id)` pair.
#[derive(Clone, Debug)]
pub struct LoginCredential {
    pub conversation_id: ConversationId,
    pub participant_id: ParticipantId,
    /// Hex-encoded Argon2id hash of the login code.
    pub verification_hash: String,
    /// Salt for the verification hash.
    pub verification_salt: Vec<u8>,
    /// Deterministic keyed hash used only to index candidate rows.
    pub lookup_hash: String,
    /// Keyed audit fingerprint, rendered `"{key_id}:{hex}"`.
    pub fingerprint: String,
    pub revoked: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating or replacing a login credential. The upsert is
/// keyed on `(conversation_id, participant_id)`: a new issuance silently
/// supersedes the previous one and clears any revocation.
#[derive(Clone, Debug)]
pub struct UpsertLoginCredentialParams {
    pub conversation_id: ConversationId,
    pub participant_id: ParticipantId,
    pub verification_hash: String,
    pub verification_salt: Vec<u8>,
    pub lookup_hash: String,
    pub fingerprint: String,
}
