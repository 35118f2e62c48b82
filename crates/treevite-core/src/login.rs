//! Login-code issuance, verification, regeneration, and revocation.

use chrono::Utc;

use treevite_crypto::{
    fingerprint, generate_login_code, generate_salt, hash_login_code, lookup_hash,
    verify_login_code,
};
use treevite_storage::{
    AccountId, ConversationId, ParticipantId, Store, StoreError, UpsertLoginCredentialParams,
};

use crate::{BearerToken, CoreError, Treevite};

/// Result of a successful login.
#[derive(Clone, Debug)]
pub struct LoggedIn {
    pub account_id: AccountId,
    pub participant_id: ParticipantId,
    pub token: BearerToken,
}

impl<S: Store> Treevite<S> {
    /// Derive and store the three representations of a fresh login code,
    /// returning the plaintext. The upsert supersedes any previous
    /// credential for the pair and clears revocation.
    pub(crate) async fn issue_login_credential(
        &self,
        conversation_id: ConversationId,
        participant_id: ParticipantId,
    ) -> Result<String, CoreError> {
        let code = generate_login_code();
        let salt = generate_salt();
        let verification_hash = hash_login_code(&code, &salt)?;
        let lookup = lookup_hash(&code, self.config.login_pepper.as_bytes())?;
        let fp = fingerprint(
            &code,
            self.config.fingerprint_key.as_bytes(),
            &self.config.fingerprint_key_id,
        )?;

        self.store
            .upsert_login_credential(&UpsertLoginCredentialParams {
                conversation_id,
                participant_id,
                verification_hash,
                verification_salt: salt,
                lookup_hash: lookup,
                fingerprint: fp,
            })
            .await?;

        Ok(code)
    }

    /// Verify a submitted login code and issue a fresh bearer token.
    ///
    /// A missing row, a revoked row, and a failed verification all produce
    /// the same `LoginCodeInvalid`; the distinction must not be observable
    /// externally. The verification hash is deliberately slow.
    pub async fn login(
        &self,
        conversation_id: ConversationId,
        code: &str,
    ) -> Result<LoggedIn, CoreError> {
        self.require_conversation(&conversation_id)?;
        if code.is_empty() {
            return Err(CoreError::LoginCodeInvalid);
        }

        let lookup = lookup_hash(code, self.config.login_pepper.as_bytes())?;
        let credential = match self
            .store
            .find_credential_by_lookup(&conversation_id, &lookup)
            .await
        {
            Ok(credential) => credential,
            Err(StoreError::NotFound) => return Err(CoreError::LoginCodeInvalid),
            Err(e) => return Err(e.into()),
        };

        if !verify_login_code(
            code,
            &credential.verification_salt,
            &credential.verification_hash,
        )? {
            return Err(CoreError::LoginCodeInvalid);
        }

        self.store
            .touch_credential(&conversation_id, &credential.participant_id, Utc::now())
            .await?;

        let participant = self.store.get_participant(&credential.participant_id).await?;
        let token = self
            .signer
            .issue(&conversation_id, &participant.account_id, &participant.id)?;

        tracing::debug!(
            conversation = %conversation_id.0,
            participant = %participant.id.0,
            "login code accepted"
        );

        Ok(LoggedIn {
            account_id: participant.account_id,
            participant_id: participant.id,
            token,
        })
    }

    /// Replace a participant's login code. The previous plaintext stops
    /// verifying immediately; the new one is returned exactly once,
    /// together with a fresh bearer token.
    pub async fn regenerate_login_code(
        &self,
        conversation_id: ConversationId,
        participant_id: ParticipantId,
    ) -> Result<(String, BearerToken), CoreError> {
        self.require_conversation(&conversation_id)?;

        let participant = match self.store.get_participant(&participant_id).await {
            Ok(p) if p.conversation_id == conversation_id => p,
            Ok(_) | Err(StoreError::NotFound) => {
                return Err(CoreError::Validation(
                    "participant does not belong to this conversation".into(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let code = self
            .issue_login_credential(conversation_id, participant_id)
            .await?;
        let token = self
            .signer
            .issue(&conversation_id, &participant.account_id, &participant.id)?;

        Ok((code, token))
    }

    /// Revoke a participant's login code. The row is kept for audit; only a
    /// reissue brings the credential back.
    pub async fn revoke_login_code(
        &self,
        conversation_id: ConversationId,
        participant_id: ParticipantId,
    ) -> Result<(), CoreError> {
        self.require_conversation(&conversation_id)?;

        match self
            .store
            .revoke_credential(&conversation_id, &participant_id)
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound) => Err(CoreError::Validation(
                "participant has no login credential".into(),
            )),
            Err(e) => Err(e.into()),
        }
    }
}
