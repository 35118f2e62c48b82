//! Wave types.
//!
//! A wave is one generation of a conversation's invitation tree. Wave 0 is
//! the conceptual root (the conversation owner, size 1); no row is stored
//! for it. Every stored wave points at its parent by wave number, and
//! `parent_wave` is always strictly less than `wave_number`, so the tree
//! cannot contain cycles.

use chrono::{DateTime, Utc};

use super::{ConversationId, WaveId};

/// Wave record.
#[derive(Clone, Debug)]
pub struct Wave {
    pub id: WaveId,
    pub conversation_id: ConversationId,
    /// Positive, unique per conversation, monotonically assigned.
    pub wave_number: i64,
    /// Wave number of the parent generation; 0 means the root.
    pub parent_wave: i64,
    /// Invites each member of this wave may hand out to recruit the next wave.
    pub invites_per_user: i64,
    /// Invites the conversation owner seeds directly into this wave.
    pub owner_invites: i64,
    /// Capacity, computed once at creation:
    /// `size(parent) * invites_per_user + owner_invites`. Not membership.
    pub size: i64,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a wave.
#[derive(Clone, Debug)]
pub struct CreateWaveParams {
    pub conversation_id: ConversationId,
    pub wave_number: i64,
    pub parent_wave: i64,
    pub invites_per_user: i64,
    pub owner_invites: i64,
    pub size: i64,
}
