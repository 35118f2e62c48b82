//! Invite types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ConversationId, InviteId, ParticipantId, WaveId};

/// Consumption state of an invite. The `Unconsumed -> Consumed` transition
/// happens at most once, enforced by the store's conditional update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Unconsumed,
    Consumed,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Unconsumed => "unconsumed",
            InviteStatus::Consumed => "consumed",
        }
    }
}

impl std::str::FromStr for InviteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unconsumed" => Ok(InviteStatus::Unconsumed),
            "consumed" => Ok(InviteStatus::Consumed),
            other => Err(format!("unknown invite status: {other}")),
        }
    }
}

/// Invite record.
#[derive(Clone, Debug)]
pub struct Invite {
    pub id: InviteId,
    pub conversation_id: ConversationId,
    pub wave_id: WaveId,
    /// The consumed parent-wave invite this code descends from.
    /// None marks an owner-seeded invite with no recruiting parent.
    pub parent_invite_id: Option<InviteId>,
    /// Opaque code, unique within the conversation.
    pub code: String,
    /// The parent-wave member this code was granted to.
    /// None marks an owner-seeded invite.
    pub owner_participant_id: Option<ParticipantId>,
    pub status: InviteStatus,
    /// Set exactly once, at consumption.
    pub consumed_by: Option<ParticipantId>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating an invite.
#[derive(Clone, Debug)]
pub struct CreateInviteParams {
    pub conversation_id: ConversationId,
    pub wave_id: WaveId,
    pub parent_invite_id: Option<InviteId>,
    pub code: String,
    pub owner_participant_id: Option<ParticipantId>,
}

/// Filter for invite listings.
#[derive(Clone, Debug, Default)]
pub struct InviteFilter {
    /// Filter by consumption status.
    pub status: Option<InviteStatus>,
    /// Filter by wave number.
    pub wave_number: Option<i64>,
    /// Filter by the participant the invite was granted to.
    pub owner_participant_id: Option<ParticipantId>,
    /// When true, only owner-seeded invites (no recruiting parent).
    pub owner_seeded: bool,
}

impl InviteFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: InviteStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn wave_number(mut self, wave_number: i64) -> Self {
        self.wave_number = Some(wave_number);
        self
    }

    pub fn owner_participant_id(mut self, participant_id: ParticipantId) -> Self {
        self.owner_participant_id = Some(participant_id);
        self
    }

    pub fn owner_seeded(mut self) -> Self {
        self.owner_seeded = true;
        self
    }
}
