//! Invite redemption and the member-first grant path.

use chrono::Utc;

use treevite_storage::{
    AccountId, ConversationId, InviteId, ParticipantId, Store, StoreError, Wave, WaveId,
};

use crate::{BearerToken, CoreError, Treevite};

/// An already-authenticated identity the caller carries into redemption.
#[derive(Clone, Copy, Debug)]
pub struct RedeemIdentity {
    pub account_id: AccountId,
    pub participant_id: ParticipantId,
}

/// Result of a successful redemption. `login_code` is plaintext and is
/// never retrievable again.
#[derive(Clone, Debug)]
pub struct Redeemed {
    pub wave_id: WaveId,
    pub invite_id: InviteId,
    pub account_id: AccountId,
    pub participant_id: ParticipantId,
    pub login_code: String,
    pub token: BearerToken,
}

impl<S: Store> Treevite<S> {
    /// Exchange a valid invite code for participant identity and
    /// credentials.
    ///
    /// The initial lookup only filters obviously-dead codes; exactly-once
    /// consumption is enforced by the store's conditional update. When two
    /// requests race on the same code, the loser gets `InviteRaceLost` and
    /// any identity provisioned for it is left in place unused; no lock is
    /// held across the lookup, provisioning, and consumption steps.
    pub async fn redeem(
        &self,
        conversation_id: ConversationId,
        code: &str,
        existing: Option<RedeemIdentity>,
    ) -> Result<Redeemed, CoreError> {
        self.require_conversation(&conversation_id)?;
        if code.is_empty() {
            return Err(CoreError::Validation("invite code is required".into()));
        }

        let invite = match self.store.find_unconsumed_invite(&conversation_id, code).await {
            Ok(invite) => invite,
            Err(StoreError::NotFound) => return Err(CoreError::InvalidOrUsedInvite),
            Err(e) => return Err(e.into()),
        };

        let (account_id, participant_id) = match existing {
            Some(identity) => {
                let participant = match self.store.get_participant(&identity.participant_id).await
                {
                    Ok(p) => p,
                    Err(StoreError::NotFound) => {
                        return Err(CoreError::Validation(
                            "identity does not belong to this conversation".into(),
                        ));
                    }
                    Err(e) => return Err(e.into()),
                };
                if participant.conversation_id != conversation_id
                    || participant.account_id != identity.account_id
                {
                    return Err(CoreError::Validation(
                        "identity does not belong to this conversation".into(),
                    ));
                }
                (identity.account_id, identity.participant_id)
            }
            None => {
                let account_id = self.store.create_account().await?;
                let participant_id = self
                    .store
                    .create_participant(&conversation_id, &account_id)
                    .await?;
                (account_id, participant_id)
            }
        };

        match self
            .store
            .consume_invite(&invite.id, &participant_id, Utc::now())
            .await
        {
            Ok(()) => {}
            Err(StoreError::Conflict) => {
                tracing::info!(
                    conversation = %conversation_id.0,
                    invite = %invite.id.0,
                    "lost redemption race"
                );
                return Err(CoreError::InviteRaceLost);
            }
            Err(e) => return Err(e.into()),
        }

        let login_code = self
            .issue_login_credential(conversation_id, participant_id)
            .await?;

        let wave = self.store.get_wave_by_id(&invite.wave_id).await?;
        let granted = self
            .grant_child_wave_invites(conversation_id, &wave, invite.id, participant_id)
            .await?;

        let token = self
            .signer
            .issue(&conversation_id, &account_id, &participant_id)?;

        tracing::info!(
            conversation = %conversation_id.0,
            wave = wave.wave_number,
            participant = %participant_id.0,
            child_invites_granted = granted,
            "invite redeemed"
        );

        Ok(Redeemed {
            wave_id: invite.wave_id,
            invite_id: invite.id,
            account_id,
            participant_id,
            login_code,
            token,
        })
    }

    /// Member-first grant: mint the new member's allotment for every child
    /// wave that already exists. The wave-first path in `create_wave`
    /// produces the same allotment when the orders are reversed.
    pub(crate) async fn grant_child_wave_invites(
        &self,
        conversation_id: ConversationId,
        joined_wave: &Wave,
        joining_invite_id: InviteId,
        participant_id: ParticipantId,
    ) -> Result<u64, CoreError> {
        let children = self
            .store
            .child_waves(&conversation_id, joined_wave.wave_number)
            .await?;

        let mut granted = 0u64;
        for child in &children {
            for _ in 0..child.invites_per_user {
                self.mint_invite(
                    conversation_id,
                    child.id,
                    Some(joining_invite_id),
                    Some(participant_id),
                )
                .await?;
                granted += 1;
            }
        }
        Ok(granted)
    }
}
