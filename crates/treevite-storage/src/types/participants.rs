//! Account and participant types.
//!
//! Redemption provisions anonymous identities: an account plus a participant
//! record scoped to one conversation. The same account may hold participant
//! records in several conversations.

use chrono::{DateTime, Utc};

use super::{AccountId, ConversationId, ParticipantId};

/// Participant record (an account's membership in one conversation).
#[derive(Clone, Debug)]
pub struct Participant {
    pub id: ParticipantId,
    pub conversation_id: ConversationId,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
}
