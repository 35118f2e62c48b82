//! Core operations of the invitation-tree credential system.
//!
//! A conversation grows through cascades of invitations: each wave declares
//! how many invites its members may hand out and how many the conversation
//! owner seeds directly. Redeeming a code provisions an anonymous identity,
//! consumes the code exactly once, grants the new member their own outbound
//! codes for any child waves that already exist, and issues a reusable
//! login code plus a bearer token.
//!
//! This crate is the outward surface of the subsystem; rendering and
//! transport layers call these operations and present their results.

mod config;
mod error;
mod login;
mod query;
mod redeem;
mod token;
mod waves;

pub use config::CoreConfig;
pub use error::CoreError;
pub use login::LoggedIn;
pub use query::WaveContext;
pub use redeem::{RedeemIdentity, Redeemed};
pub use token::{BearerToken, Claims, TokenSigner};
pub use waves::WaveCreated;

use treevite_storage::{
    ConversationId, CreateInviteParams, Invite, InviteId, ParticipantId, Store, StoreError, WaveId,
};

/// How many fresh codes the insert path will try before giving up.
/// Collisions are birthday-bound rare; persistent collision is treated as a
/// systemic fault, not a normal-path outcome.
const CODE_INSERT_ATTEMPTS: usize = 5;

/// The invitation-tree service. All cross-request coordination is pushed
/// into the backing store; this type holds no mutable state.
pub struct Treevite<S> {
    store: S,
    config: CoreConfig,
    signer: TokenSigner,
}

impl<S: Store> Treevite<S> {
    pub fn new(store: S, config: CoreConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let signer = TokenSigner::new(&config.token_secret, config.token_ttl_seconds)?;
        Ok(Self {
            store,
            config,
            signer,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    pub(crate) fn require_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<(), CoreError> {
        if conversation_id.0.is_nil() {
            return Err(CoreError::Validation("conversation id is required".into()));
        }
        Ok(())
    }

    /// Insert one invite, regenerating the code on a uniqueness collision,
    /// up to a bounded attempt count.
    pub(crate) async fn mint_invite(
        &self,
        conversation_id: ConversationId,
        wave_id: WaveId,
        parent_invite_id: Option<InviteId>,
        owner_participant_id: Option<ParticipantId>,
    ) -> Result<Invite, CoreError> {
        for _ in 0..CODE_INSERT_ATTEMPTS {
            let code = treevite_crypto::generate_invite_code();
            match self
                .store
                .create_invite(&CreateInviteParams {
                    conversation_id,
                    wave_id,
                    parent_invite_id,
                    code,
                    owner_participant_id,
                })
                .await
            {
                Ok(invite) => return Ok(invite),
                Err(StoreError::AlreadyExists) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(CoreError::CodeGenerationExhausted)
    }
}
