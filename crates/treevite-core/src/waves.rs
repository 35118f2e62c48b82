//! Wave creation and the wave-first backfill path.

use treevite_storage::{ConversationId, CreateWaveParams, Store, StoreError, Wave};

use crate::{CoreError, Treevite};

/// Result of a wave creation: the wave row plus how many invite rows were
/// actually written (owner seeds plus backfill for existing parent members).
#[derive(Clone, Debug)]
pub struct WaveCreated {
    pub wave: Wave,
    pub invites_created: u64,
}

impl<S: Store> Treevite<S> {
    /// Declare the next wave of the conversation's invitation tree.
    ///
    /// The wave number is one greater than the current maximum (1 when no
    /// waves exist). When no explicit parent is given, the parent defaults
    /// to the current maximum wave (or the root, wave 0). Capacity is
    /// computed once here and cached on the row:
    /// `size(parent) * invites_per_user + owner_invites`, with the parent
    /// treated as size 1 when it is the root or its cached size is
    /// non-positive.
    ///
    /// Owner seeds are inserted with no recruiting parent; then every
    /// already-joined member of the parent wave is granted
    /// `invites_per_user` codes, with the member's own consumed invite
    /// recorded as lineage. The root counts as its own single member (the
    /// conversation owner), so a wave declared on the root mints
    /// `invites_per_user` root-owned codes and can be joined even with no
    /// owner seeds. The member-first path in `redeem` produces the same
    /// allotment when the declaration order is reversed.
    pub async fn create_wave(
        &self,
        conversation_id: ConversationId,
        invites_per_user: i64,
        owner_invites: i64,
        explicit_parent: Option<i64>,
    ) -> Result<WaveCreated, CoreError> {
        self.require_conversation(&conversation_id)?;
        if invites_per_user < 0 || owner_invites < 0 {
            return Err(CoreError::Validation(
                "invite counts must not be negative".into(),
            ));
        }
        if invites_per_user == 0 && owner_invites == 0 {
            return Err(CoreError::Validation(
                "at least one of invites_per_user or owner_invites must be positive".into(),
            ));
        }

        let max = self.store.max_wave_number(&conversation_id).await?;
        let wave_number = max.map_or(1, |m| m + 1);

        let parent_wave = match explicit_parent {
            Some(p) if p < 0 => {
                return Err(CoreError::Validation(
                    "parent wave must not be negative".into(),
                ));
            }
            Some(p) => p,
            None => max.unwrap_or(0),
        };

        // All validation happens before any write. Wave 0 is the conceptual
        // root; any other parent must already be declared.
        let parent = if parent_wave == 0 {
            None
        } else {
            match self.store.get_wave(&conversation_id, parent_wave).await {
                Ok(w) => Some(w),
                Err(StoreError::NotFound) => {
                    return Err(CoreError::Validation(format!(
                        "parent wave {parent_wave} does not exist"
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        };

        // Fail-open: a missing or non-positive cached parent size counts as
        // 1 rather than blocking wave creation.
        let parent_size = parent
            .as_ref()
            .map_or(1, |w| if w.size > 0 { w.size } else { 1 });
        let size = parent_size * invites_per_user + owner_invites;

        let wave = self
            .store
            .create_wave(&CreateWaveParams {
                conversation_id,
                wave_number,
                parent_wave,
                invites_per_user,
                owner_invites,
                size,
            })
            .await?;

        let mut invites_created = 0u64;

        for _ in 0..owner_invites {
            self.mint_invite(conversation_id, wave.id, None, None).await?;
            invites_created += 1;
        }

        // Wave-first backfill: members who joined the parent wave before
        // this wave existed get their allotment now. Each row is
        // independent, so partial completion on failure is safe to re-run.
        if invites_per_user > 0 {
            match &parent {
                // The root's one member is the conversation owner, who has
                // no participant row; their codes are root-owned.
                None => {
                    for _ in 0..invites_per_user {
                        self.mint_invite(conversation_id, wave.id, None, None).await?;
                        invites_created += 1;
                    }
                }
                Some(parent) => {
                    let members = self.store.consumed_invites_in_wave(&parent.id).await?;
                    for member_invite in &members {
                        let owner = member_invite.consumed_by;
                        for _ in 0..invites_per_user {
                            self.mint_invite(
                                conversation_id,
                                wave.id,
                                Some(member_invite.id),
                                owner,
                            )
                            .await?;
                            invites_created += 1;
                        }
                    }
                }
            }
        }

        tracing::info!(
            conversation = %conversation_id.0,
            wave = wave.wave_number,
            parent = wave.parent_wave,
            size = wave.size,
            invites_created,
            "wave created"
        );

        Ok(WaveCreated {
            wave,
            invites_created,
        })
    }
}
