//! The Store trait that backends implement.

use chrono::{DateTime, Utc};

use crate::types::*;
use crate::StoreError;

/// The storage trait treevite-core depends on.
///
/// All methods are **scoped by conversation** where a conversation id is
/// taken. The backing store is the only cross-request coordination point:
/// exactly-once invite consumption is a conditional update here, not an
/// in-process lock in the caller.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Waves ──────────────────────────────────────────

    /// Persist a wave row. Wave numbers are unique per conversation;
    /// a duplicate maps to `AlreadyExists`.
    async fn create_wave(&self, params: &CreateWaveParams) -> Result<Wave, StoreError>;

    /// Get a wave by conversation and wave number.
    async fn get_wave(
        &self,
        conversation_id: &ConversationId,
        wave_number: i64,
    ) -> Result<Wave, StoreError>;

    /// Get a wave by ID.
    async fn get_wave_by_id(&self, wave_id: &WaveId) -> Result<Wave, StoreError>;

    /// Highest wave number declared for the conversation, if any.
    async fn max_wave_number(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<i64>, StoreError>;

    /// All waves whose declared parent is `parent_wave`, ordered by wave number.
    async fn child_waves(
        &self,
        conversation_id: &ConversationId,
        parent_wave: i64,
    ) -> Result<Vec<Wave>, StoreError>;

    /// List waves, optionally filtered to one wave number.
    async fn list_waves(
        &self,
        conversation_id: &ConversationId,
        wave_number: Option<i64>,
        page: &PageRequest,
    ) -> Result<Page<Wave>, StoreError>;

    // ───────────────────────────────────── Invites ────────────────────────────────────────

    /// Insert an invite row. Codes are unique per conversation; a collision
    /// maps to `AlreadyExists` so the caller can retry with a fresh code.
    async fn create_invite(&self, params: &CreateInviteParams) -> Result<Invite, StoreError>;

    /// Find the unconsumed invite matching `(conversation, code)`.
    /// Consumed or unknown codes both map to `NotFound`.
    async fn find_unconsumed_invite(
        &self,
        conversation_id: &ConversationId,
        code: &str,
    ) -> Result<Invite, StoreError>;

    /// Atomically transition an invite from unconsumed to consumed,
    /// recording the consuming participant and timestamp. The update is
    /// conditional on the row still being unconsumed; when another request
    /// won the race, zero rows are affected and this returns `Conflict`.
    async fn consume_invite(
        &self,
        invite_id: &InviteId,
        participant_id: &ParticipantId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// All consumed invites in a wave, one per member who joined through it.
    async fn consumed_invites_in_wave(&self, wave_id: &WaveId) -> Result<Vec<Invite>, StoreError>;

    /// The consumed invite that admitted this participant to the
    /// conversation. A participant redeeming with a reused identity can
    /// consume several invites; the earliest consumption (ties broken by
    /// invite id) is the canonical join.
    async fn find_joining_invite(
        &self,
        conversation_id: &ConversationId,
        participant_id: &ParticipantId,
    ) -> Result<Invite, StoreError>;

    /// List invites matching the filter, newest first.
    async fn list_invites(
        &self,
        conversation_id: &ConversationId,
        filter: &InviteFilter,
        page: &PageRequest,
    ) -> Result<Page<Invite>, StoreError>;

    // ───────────────────────────── Accounts & participants ────────────────────────────────

    /// Create an anonymous account.
    async fn create_account(&self) -> Result<AccountId, StoreError>;

    /// Create a participant record scoping an account to a conversation.
    /// Duplicate `(conversation, account)` pairs map to `AlreadyExists`.
    async fn create_participant(
        &self,
        conversation_id: &ConversationId,
        account_id: &AccountId,
    ) -> Result<ParticipantId, StoreError>;

    /// Get a participant by ID.
    async fn get_participant(
        &self,
        participant_id: &ParticipantId,
    ) -> Result<Participant, StoreError>;

    // ───────────────────────────────── Login credentials ──────────────────────────────────

    /// Create or replace the credential for `(conversation, participant)`.
    /// Replacement clears any revocation.
    async fn upsert_login_credential(
        &self,
        params: &UpsertLoginCredentialParams,
    ) -> Result<(), StoreError>;

    /// Find the non-revoked credential with this lookup hash. Revoked rows
    /// are invisible here, so a revoked credential and an unknown code are
    /// indistinguishable to the caller.
    async fn find_credential_by_lookup(
        &self,
        conversation_id: &ConversationId,
        lookup_hash: &str,
    ) -> Result<LoginCredential, StoreError>;

    /// Record a successful login.
    async fn touch_credential(
        &self,
        conversation_id: &ConversationId,
        participant_id: &ParticipantId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Revoke the credential. The row is kept; only reissuance clears the flag.
    async fn revoke_credential(
        &self,
        conversation_id: &ConversationId,
        participant_id: &ParticipantId,
    ) -> Result<(), StoreError>;
}
