//! Read-only, paginated query paths.

use chrono::{DateTime, Utc};

use treevite_storage::{
    ConversationId, Invite, InviteFilter, InviteId, Page, PageRequest, ParticipantId, Store,
    StoreError, Wave,
};

use crate::{CoreError, Treevite};

/// A participant's wave-joining context: which wave admitted them, when,
/// and that wave's declared fan-out.
#[derive(Clone, Debug)]
pub struct WaveContext {
    pub wave: Wave,
    pub invite_id: InviteId,
    pub joined_at: DateTime<Utc>,
}

impl<S: Store> Treevite<S> {
    /// List a conversation's waves, optionally filtered to one wave number.
    pub async fn list_waves(
        &self,
        conversation_id: ConversationId,
        wave_number: Option<i64>,
        page: &PageRequest,
    ) -> Result<Page<Wave>, CoreError> {
        self.require_conversation(&conversation_id)?;
        Ok(self
            .store
            .list_waves(&conversation_id, wave_number, page)
            .await?)
    }

    /// Administrator roster of invites, filterable by status, wave, owner,
    /// or to owner-seeded rows only.
    pub async fn list_invites_admin(
        &self,
        conversation_id: ConversationId,
        filter: &InviteFilter,
        page: &PageRequest,
    ) -> Result<Page<Invite>, CoreError> {
        self.require_conversation(&conversation_id)?;
        Ok(self.store.list_invites(&conversation_id, filter, page).await?)
    }

    /// A participant's view of the invites granted to them.
    pub async fn list_my_invites(
        &self,
        conversation_id: ConversationId,
        participant_id: ParticipantId,
        page: &PageRequest,
    ) -> Result<Page<Invite>, CoreError> {
        self.require_conversation(&conversation_id)?;
        let filter = InviteFilter::new().owner_participant_id(participant_id);
        Ok(self.store.list_invites(&conversation_id, &filter, page).await?)
    }

    /// The wave a participant joined through, when they joined, and the
    /// wave's declared fan-out.
    pub async fn my_wave_context(
        &self,
        conversation_id: ConversationId,
        participant_id: ParticipantId,
    ) -> Result<WaveContext, CoreError> {
        self.require_conversation(&conversation_id)?;

        let invite = match self
            .store
            .find_joining_invite(&conversation_id, &participant_id)
            .await
        {
            Ok(invite) => invite,
            Err(StoreError::NotFound) => {
                return Err(CoreError::Validation(
                    "participant did not join through an invite".into(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let wave = self.store.get_wave_by_id(&invite.wave_id).await?;
        let joined_at = invite.consumed_at.ok_or_else(|| {
            CoreError::Store(StoreError::Backend(
                "consumed invite missing consumed_at".into(),
            ))
        })?;

        Ok(WaveContext {
            wave,
            invite_id: invite.id,
            joined_at,
        })
    }
}
