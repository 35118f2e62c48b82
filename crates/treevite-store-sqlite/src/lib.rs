//! SQLite backend for treevite.
//!
//! All cross-request coordination lives here: code uniqueness is a UNIQUE
//! constraint surfaced as `AlreadyExists`, and exactly-once invite
//! consumption is a single conditional UPDATE whose affected-row count
//! distinguishes the winner of a redemption race from the loser.

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use uuid::Uuid;

use treevite_storage::{
    AccountId, ConversationId, CreateInviteParams, CreateWaveParams, Invite, InviteFilter,
    InviteId, InviteStatus, LoginCredential, Page, PageRequest, Participant, ParticipantId, Store,
    StoreError, UpsertLoginCredentialParams, Wave, WaveId,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(|e| StoreError::Backend(e.to_string()))
}

fn ts(secs: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StoreError::Backend(format!("bad timestamp: {secs}")))
}

fn map_insert_err(e: sqlx::Error) -> StoreError {
    let s = e.to_string();
    if s.contains("UNIQUE") {
        StoreError::AlreadyExists
    } else {
        StoreError::Backend(s)
    }
}

// Column order shared by every wave SELECT.
const WAVE_COLS: &str =
    "id,conversation_id,wave_number,parent_wave,invites_per_user,owner_invites,size,created_at";

type WaveRow = (String, String, i64, i64, i64, i64, i64, i64);

fn wave_from_row(row: WaveRow) -> Result<Wave, StoreError> {
    let (id, conversation_id, wave_number, parent_wave, invites_per_user, owner_invites, size, created_at) =
        row;
    Ok(Wave {
        id: WaveId(parse_uuid(&id)?),
        conversation_id: ConversationId(parse_uuid(&conversation_id)?),
        wave_number,
        parent_wave,
        invites_per_user,
        owner_invites,
        size,
        created_at: ts(created_at)?,
    })
}

// Column order shared by every invite SELECT.
const INVITE_COLS: &str = "id,conversation_id,wave_id,parent_invite_id,code,\
     owner_participant_id,status,consumed_by,consumed_at,created_at";

type InviteRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<i64>,
    i64,
);

fn invite_from_row(row: InviteRow) -> Result<Invite, StoreError> {
    let (id, conversation_id, wave_id, parent_invite_id, code, owner, status, consumed_by, consumed_at, created_at) =
        row;
    Ok(Invite {
        id: InviteId(parse_uuid(&id)?),
        conversation_id: ConversationId(parse_uuid(&conversation_id)?),
        wave_id: WaveId(parse_uuid(&wave_id)?),
        parent_invite_id: parent_invite_id
            .as_deref()
            .map(parse_uuid)
            .transpose()?
            .map(InviteId),
        code,
        owner_participant_id: owner.as_deref().map(parse_uuid).transpose()?.map(ParticipantId),
        status: status.parse::<InviteStatus>().map_err(StoreError::Backend)?,
        consumed_by: consumed_by.as_deref().map(parse_uuid).transpose()?.map(ParticipantId),
        consumed_at: consumed_at.map(ts).transpose()?,
        created_at: ts(created_at)?,
    })
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────────────── Waves ──────────────────────────────────────────

    async fn create_wave(&self, params: &CreateWaveParams) -> Result<Wave, StoreError> {
        let id = Uuid::now_v7();
        let created_at = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO waves(id,conversation_id,wave_number,parent_wave,invites_per_user,owner_invites,size,created_at)
             VALUES(?,?,?,?,?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(params.conversation_id.0.to_string())
        .bind(params.wave_number)
        .bind(params.parent_wave)
        .bind(params.invites_per_user)
        .bind(params.owner_invites)
        .bind(params.size)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(map_insert_err)?;

        Ok(Wave {
            id: WaveId(id),
            conversation_id: params.conversation_id,
            wave_number: params.wave_number,
            parent_wave: params.parent_wave,
            invites_per_user: params.invites_per_user,
            owner_invites: params.owner_invites,
            size: params.size,
            created_at: ts(created_at)?,
        })
    }

    async fn get_wave(
        &self,
        conversation_id: &ConversationId,
        wave_number: i64,
    ) -> Result<Wave, StoreError> {
        let row = sqlx::query_as::<_, WaveRow>(&format!(
            "SELECT {WAVE_COLS} FROM waves WHERE conversation_id=? AND wave_number=?"
        ))
        .bind(conversation_id.0.to_string())
        .bind(wave_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        match row {
            None => Err(StoreError::NotFound),
            Some(row) => wave_from_row(row),
        }
    }

    async fn get_wave_by_id(&self, wave_id: &WaveId) -> Result<Wave, StoreError> {
        let row = sqlx::query_as::<_, WaveRow>(&format!(
            "SELECT {WAVE_COLS} FROM waves WHERE id=?"
        ))
        .bind(wave_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        match row {
            None => Err(StoreError::NotFound),
            Some(row) => wave_from_row(row),
        }
    }

    async fn max_wave_number(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<i64>, StoreError> {
        let row = sqlx::query_as::<_, (Option<i64>,)>(
            "SELECT MAX(wave_number) FROM waves WHERE conversation_id=?",
        )
        .bind(conversation_id.0.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(row.0)
    }

    async fn child_waves(
        &self,
        conversation_id: &ConversationId,
        parent_wave: i64,
    ) -> Result<Vec<Wave>, StoreError> {
        let rows = sqlx::query_as::<_, WaveRow>(&format!(
            "SELECT {WAVE_COLS} FROM waves
             WHERE conversation_id=? AND parent_wave=?
             ORDER BY wave_number"
        ))
        .bind(conversation_id.0.to_string())
        .bind(parent_wave)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.into_iter().map(wave_from_row).collect()
    }

    async fn list_waves(
        &self,
        conversation_id: &ConversationId,
        wave_number: Option<i64>,
        page: &PageRequest,
    ) -> Result<Page<Wave>, StoreError> {
        let filter_sql = if wave_number.is_some() {
            " AND wave_number=?"
        } else {
            ""
        };

        let count_sql = format!("SELECT COUNT(*) FROM waves WHERE conversation_id=?{filter_sql}");
        let mut count_q =
            sqlx::query_as::<_, (i64,)>(&count_sql).bind(conversation_id.0.to_string());
        if let Some(n) = wave_number {
            count_q = count_q.bind(n);
        }
        let (total,) = count_q
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let list_sql = format!(
            "SELECT {WAVE_COLS} FROM waves WHERE conversation_id=?{filter_sql}
             ORDER BY wave_number LIMIT ? OFFSET ?"
        );
        let mut q = sqlx::query_as::<_, WaveRow>(&list_sql).bind(conversation_id.0.to_string());
        if let Some(n) = wave_number {
            q = q.bind(n);
        }
        let rows = q
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Page {
            items: rows.into_iter().map(wave_from_row).collect::<Result<_, _>>()?,
            total: total as u64,
            limit: page.limit,
            offset: page.offset,
        })
    }

    // ───────────────────────────────────── Invites ────────────────────────────────────────

    async fn create_invite(&self, params: &CreateInviteParams) -> Result<Invite, StoreError> {
        let id = Uuid::now_v7();
        let created_at = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO invites(id,conversation_id,wave_id,parent_invite_id,code,owner_participant_id,status,created_at)
             VALUES(?,?,?,?,?,?,'unconsumed',?)",
        )
        .bind(id.to_string())
        .bind(params.conversation_id.0.to_string())
        .bind(params.wave_id.0.to_string())
        .bind(params.parent_invite_id.map(|p| p.0.to_string()))
        .bind(&params.code)
        .bind(params.owner_participant_id.map(|p| p.0.to_string()))
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(map_insert_err)?;

        Ok(Invite {
            id: InviteId(id),
            conversation_id: params.conversation_id,
            wave_id: params.wave_id,
            parent_invite_id: params.parent_invite_id,
            code: params.code.clone(),
            owner_participant_id: params.owner_participant_id,
            status: InviteStatus::Unconsumed,
            consumed_by: None,
            consumed_at: None,
            created_at: ts(created_at)?,
        })
    }

    async fn find_unconsumed_invite(
        &self,
        conversation_id: &ConversationId,
        code: &str,
    ) -> Result<Invite, StoreError> {
        let row = sqlx::query_as::<_, InviteRow>(&format!(
            "SELECT {INVITE_COLS} FROM invites
             WHERE conversation_id=? AND code=? AND status='unconsumed'"
        ))
        .bind(conversation_id.0.to_string())
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        match row {
            None => Err(StoreError::NotFound),
            Some(row) => invite_from_row(row),
        }
    }

    async fn consume_invite(
        &self,
        invite_id: &InviteId,
        participant_id: &ParticipantId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        // Conditional update: only the first concurrent redeemer observes an
        // affected row. No read-then-write pair anywhere on this path.
        let affected = sqlx::query(
            "UPDATE invites SET status='consumed', consumed_by=?, consumed_at=?
             WHERE id=? AND status='unconsumed'",
        )
        .bind(participant_id.0.to_string())
        .bind(at.timestamp())
        .bind(invite_id.0.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
        .rows_affected();

        if affected == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn consumed_invites_in_wave(&self, wave_id: &WaveId) -> Result<Vec<Invite>, StoreError> {
        let rows = sqlx::query_as::<_, InviteRow>(&format!(
            "SELECT {INVITE_COLS} FROM invites
             WHERE wave_id=? AND status='consumed'
             ORDER BY consumed_at, id"
        ))
        .bind(wave_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.into_iter().map(invite_from_row).collect()
    }

    async fn find_joining_invite(
        &self,
        conversation_id: &ConversationId,
        participant_id: &ParticipantId,
    ) -> Result<Invite, StoreError> {
        // A reused identity can consume several invites; the earliest
        // consumption is the canonical join.
        let row = sqlx::query_as::<_, InviteRow>(&format!(
            "SELECT {INVITE_COLS} FROM invites
             WHERE conversation_id=? AND consumed_by=?
             ORDER BY consumed_at, id LIMIT 1"
        ))
        .bind(conversation_id.0.to_string())
        .bind(participant_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        match row {
            None => Err(StoreError::NotFound),
            Some(row) => invite_from_row(row),
        }
    }

    async fn list_invites(
        &self,
        conversation_id: &ConversationId,
        filter: &InviteFilter,
        page: &PageRequest,
    ) -> Result<Page<Invite>, StoreError> {
        let mut where_sql = String::from(" WHERE conversation_id=?");
        if filter.status.is_some() {
            where_sql.push_str(" AND status=?");
        }
        if filter.wave_number.is_some() {
            where_sql.push_str(
                " AND wave_id IN (SELECT id FROM waves WHERE conversation_id=? AND wave_number=?)",
            );
        }
        if filter.owner_participant_id.is_some() {
            where_sql.push_str(" AND owner_participant_id=?");
        }
        if filter.owner_seeded {
            where_sql.push_str(" AND owner_participant_id IS NULL");
        }

        // Bind order must mirror the clause order above.
        macro_rules! bind_filter {
            ($q:expr) => {{
                let mut q = $q.bind(conversation_id.0.to_string());
                if let Some(status) = filter.status {
                    q = q.bind(status.as_str());
                }
                if let Some(n) = filter.wave_number {
                    q = q.bind(conversation_id.0.to_string()).bind(n);
                }
                if let Some(owner) = filter.owner_participant_id {
                    q = q.bind(owner.0.to_string());
                }
                q
            }};
        }

        let count_sql = format!("SELECT COUNT(*) FROM invites{where_sql}");
        let (total,) = bind_filter!(sqlx::query_as::<_, (i64,)>(&count_sql))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let list_sql = format!(
            "SELECT {INVITE_COLS} FROM invites{where_sql}
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        let rows = bind_filter!(sqlx::query_as::<_, InviteRow>(&list_sql))
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(invite_from_row)
                .collect::<Result<_, _>>()?,
            total: total as u64,
            limit: page.limit,
            offset: page.offset,
        })
    }

    // ───────────────────────────── Accounts & participants ────────────────────────────────

    async fn create_account(&self) -> Result<AccountId, StoreError> {
        let id = Uuid::now_v7();
        sqlx::query("INSERT INTO accounts(id,created_at) VALUES(?,?)")
            .bind(id.to_string())
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(AccountId(id))
    }

    async fn create_participant(
        &self,
        conversation_id: &ConversationId,
        account_id: &AccountId,
    ) -> Result<ParticipantId, StoreError> {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO participants(id,conversation_id,account_id,created_at) VALUES(?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(conversation_id.0.to_string())
        .bind(account_id.0.to_string())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(map_insert_err)?;
        Ok(ParticipantId(id))
    }

    async fn get_participant(
        &self,
        participant_id: &ParticipantId,
    ) -> Result<Participant, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, i64)>(
            "SELECT id,conversation_id,account_id,created_at FROM participants WHERE id=?",
        )
        .bind(participant_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        match row {
            None => Err(StoreError::NotFound),
            Some((id, conversation_id, account_id, created_at)) => Ok(Participant {
                id: ParticipantId(parse_uuid(&id)?),
                conversation_id: ConversationId(parse_uuid(&conversation_id)?),
                account_id: AccountId(parse_uuid(&account_id)?),
                created_at: ts(created_at)?,
            }),
        }
    }

    // ───────────────────────────────── Login credentials ──────────────────────────────────

    async fn upsert_login_credential(
        &self,
        params: &UpsertLoginCredentialParams,
    ) -> Result<(), StoreError> {
        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO login_credentials(conversation_id,participant_id,verification_hash,verification_salt,lookup_hash,fingerprint,revoked,created_at,updated_at)
             VALUES(?,?,?,?,?,?,0,?,?)
             ON CONFLICT(conversation_id,participant_id)
             DO UPDATE SET verification_hash=excluded.verification_hash,
                           verification_salt=excluded.verification_salt,
                           lookup_hash=excluded.lookup_hash,
                           fingerprint=excluded.fingerprint,
                           revoked=0,
                           updated_at=excluded.updated_at",
        )
        .bind(params.conversation_id.0.to_string())
        .bind(params.participant_id.0.to_string())
        .bind(&params.verification_hash)
        .bind(&params.verification_salt)
        .bind(&params.lookup_hash)
        .bind(&params.fingerprint)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn find_credential_by_lookup(
        &self,
        conversation_id: &ConversationId,
        lookup_hash: &str,
    ) -> Result<LoginCredential, StoreError> {
        let row = sqlx::query_as::<
            _,
            (
                String,
                String,
                String,
                Vec<u8>,
                String,
                String,
                i64,
                Option<i64>,
                i64,
                i64,
            ),
        >(
            "SELECT conversation_id,participant_id,verification_hash,verification_salt,lookup_hash,fingerprint,revoked,last_used_at,created_at,updated_at
             FROM login_credentials
             WHERE conversation_id=? AND lookup_hash=? AND revoked=0",
        )
        .bind(conversation_id.0.to_string())
        .bind(lookup_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        match row {
            None => Err(StoreError::NotFound),
            Some((conv, participant, hash, salt, lookup, fingerprint, revoked, last_used_at, created_at, updated_at)) => {
                Ok(LoginCredential {
                    conversation_id: ConversationId(parse_uuid(&conv)?),
                    participant_id: ParticipantId(parse_uuid(&participant)?),
                    verification_hash: hash,
                    verification_salt: salt,
                    lookup_hash: lookup,
                    fingerprint,
                    revoked: revoked != 0,
                    last_used_at: last_used_at.map(ts).transpose()?,
                    created_at: ts(created_at)?,
                    updated_at: ts(updated_at)?,
                })
            }
        }
    }

    async fn touch_credential(
        &self,
        conversation_id: &ConversationId,
        participant_id: &ParticipantId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let affected = sqlx::query(
            "UPDATE login_credentials SET last_used_at=?
             WHERE conversation_id=? AND participant_id=?",
        )
        .bind(at.timestamp())
        .bind(conversation_id.0.to_string())
        .bind(participant_id.0.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
        .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn revoke_credential(
        &self,
        conversation_id: &ConversationId,
        participant_id: &ParticipantId,
    ) -> Result<(), StoreError> {
        let affected = sqlx::query(
            "UPDATE login_credentials SET revoked=1, updated_at=?
             WHERE conversation_id=? AND participant_id=?",
        )
        .bind(Utc::now().timestamp())
        .bind(conversation_id.0.to_string())
        .bind(participant_id.0.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
        .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treevite_storage::InviteFilter;

    fn conv() -> ConversationId {
        ConversationId(Uuid::new_v4())
    }

    fn wave_params(conversation_id: ConversationId, wave_number: i64) -> CreateWaveParams {
        CreateWaveParams {
            conversation_id,
            wave_number,
            parent_wave: wave_number - 1,
            invites_per_user: 2,
            owner_invites: 1,
            size: 3,
        }
    }

    fn invite_params(wave: &Wave, code: &str) -> CreateInviteParams {
        CreateInviteParams {
            conversation_id: wave.conversation_id,
            wave_id: wave.id,
            parent_invite_id: None,
            code: code.to_string(),
            owner_participant_id: None,
        }
    }

    async fn participant(s: &SqliteStore, conversation_id: &ConversationId) -> ParticipantId {
        let account = s.create_account().await.unwrap();
        s.create_participant(conversation_id, &account).await.unwrap()
    }

    #[tokio::test]
    async fn wave_roundtrip() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let c = conv();
        let created = s.create_wave(&wave_params(c, 1)).await.unwrap();

        let got = s.get_wave(&c, 1).await.unwrap();
        assert_eq!(got.id, created.id);
        assert_eq!(got.invites_per_user, 2);
        assert_eq!(got.owner_invites, 1);
        assert_eq!(got.size, 3);

        let by_id = s.get_wave_by_id(&created.id).await.unwrap();
        assert_eq!(by_id.wave_number, 1);
    }

    #[tokio::test]
    async fn duplicate_wave_number_maps_to_alreadyexists() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let c = conv();
        s.create_wave(&wave_params(c, 1)).await.unwrap();
        let err = s.create_wave(&wave_params(c, 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));
    }

    #[tokio::test]
    async fn max_wave_number_tracks_inserts() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let c = conv();
        assert_eq!(s.max_wave_number(&c).await.unwrap(), None);
        s.create_wave(&wave_params(c, 1)).await.unwrap();
        s.create_wave(&wave_params(c, 2)).await.unwrap();
        assert_eq!(s.max_wave_number(&c).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn duplicate_code_maps_to_alreadyexists() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let c = conv();
        let wave = s.create_wave(&wave_params(c, 1)).await.unwrap();

        s.create_invite(&invite_params(&wave, "xQ2m4p7r9s")).await.unwrap();
        let err = s
            .create_invite(&invite_params(&wave, "xQ2m4p7r9s"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));
    }

    #[tokio::test]
    async fn consume_is_exactly_once() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let c = conv();
        let wave = s.create_wave(&wave_params(c, 1)).await.unwrap();
        let invite = s.create_invite(&invite_params(&wave, "xQ2m4p7r9s")).await.unwrap();

        let p1 = participant(&s, &c).await;
        let p2 = participant(&s, &c).await;

        s.consume_invite(&invite.id, &p1, Utc::now()).await.unwrap();
        let err = s.consume_invite(&invite.id, &p2, Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));

        // The winner's identity sticks.
        let joined = s.find_joining_invite(&c, &p1).await.unwrap();
        assert_eq!(joined.id, invite.id);
        assert_eq!(joined.consumed_by, Some(p1));
        assert!(s.find_joining_invite(&c, &p2).await.is_err());
    }

    #[tokio::test]
    async fn consumed_invite_is_invisible_to_find_unconsumed() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let c = conv();
        let wave = s.create_wave(&wave_params(c, 1)).await.unwrap();
        let invite = s.create_invite(&invite_params(&wave, "xQ2m4p7r9s")).await.unwrap();

        let found = s.find_unconsumed_invite(&c, "xQ2m4p7r9s").await.unwrap();
        assert_eq!(found.id, invite.id);

        let p = participant(&s, &c).await;
        s.consume_invite(&invite.id, &p, Utc::now()).await.unwrap();

        let err = s.find_unconsumed_invite(&c, "xQ2m4p7r9s").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn joining_invite_is_the_earliest_consumed() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let c = conv();
        let wave = s.create_wave(&wave_params(c, 1)).await.unwrap();
        let a = s.create_invite(&invite_params(&wave, "aK2m4p7r9s")).await.unwrap();
        let b = s.create_invite(&invite_params(&wave, "bK2m4p7r9s")).await.unwrap();

        // One participant consumes two invites.
        let p = participant(&s, &c).await;
        s.consume_invite(&a.id, &p, Utc::now()).await.unwrap();
        s.consume_invite(&b.id, &p, Utc::now()).await.unwrap();

        let joined = s.find_joining_invite(&c, &p).await.unwrap();
        assert_eq!(joined.id, a.id);
    }

    #[tokio::test]
    async fn consumed_invites_in_wave_lists_members_only() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let c = conv();
        let wave = s.create_wave(&wave_params(c, 1)).await.unwrap();
        let a = s.create_invite(&invite_params(&wave, "aK2m4p7r9s")).await.unwrap();
        s.create_invite(&invite_params(&wave, "bK2m4p7r9s")).await.unwrap();

        let p = participant(&s, &c).await;
        s.consume_invite(&a.id, &p, Utc::now()).await.unwrap();

        let members = s.consumed_invites_in_wave(&wave.id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, a.id);
    }

    #[tokio::test]
    async fn duplicate_participant_per_conversation_rejected() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let c = conv();
        let account = s.create_account().await.unwrap();
        s.create_participant(&c, &account).await.unwrap();
        let err = s.create_participant(&c, &account).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));

        // Same account may join a different conversation.
        s.create_participant(&conv(), &account).await.unwrap();
    }

    #[tokio::test]
    async fn list_invites_filters_and_totals() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let c = conv();
        let wave = s.create_wave(&wave_params(c, 1)).await.unwrap();
        let p = participant(&s, &c).await;

        for (i, owner) in [None, Some(p), Some(p)].into_iter().enumerate() {
            s.create_invite(&CreateInviteParams {
                conversation_id: c,
                wave_id: wave.id,
                parent_invite_id: None,
                code: format!("cQ2m4p7r9s{i}"),
                owner_participant_id: owner,
            })
            .await
            .unwrap();
        }

        let owned = s
            .list_invites(
                &c,
                &InviteFilter::new().owner_participant_id(p),
                &PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(owned.total, 2);
        assert_eq!(owned.items.len(), 2);

        let seeded = s
            .list_invites(&c, &InviteFilter::new().owner_seeded(), &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(seeded.total, 1);

        let by_wave = s
            .list_invites(
                &c,
                &InviteFilter::new().wave_number(1),
                &PageRequest::new(2, 0),
            )
            .await
            .unwrap();
        assert_eq!(by_wave.total, 3);
        assert_eq!(by_wave.items.len(), 2);

        let next = s
            .list_invites(
                &c,
                &InviteFilter::new().wave_number(1),
                &PageRequest::new(2, 2),
            )
            .await
            .unwrap();
        assert_eq!(next.items.len(), 1);
    }

    #[tokio::test]
    async fn credential_upsert_overwrites_and_clears_revocation() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let c = conv();
        let p = participant(&s, &c).await;

        let params = UpsertLoginCredentialParams {
            conversation_id: c,
            participant_id: p,
            verification_hash: "aa".into(),
            verification_salt: vec![1; 16],
            lookup_hash: "lookup-one".into(),
            fingerprint: "k1:aa".into(),
        };
        s.upsert_login_credential(&params).await.unwrap();

        let cred = s.find_credential_by_lookup(&c, "lookup-one").await.unwrap();
        assert_eq!(cred.participant_id, p);
        assert!(!cred.revoked);

        // Revoked rows vanish from the lookup path.
        s.revoke_credential(&c, &p).await.unwrap();
        assert!(s.find_credential_by_lookup(&c, "lookup-one").await.is_err());

        // Reissue supersedes in place and clears the revocation.
        s.upsert_login_credential(&UpsertLoginCredentialParams {
            verification_hash: "bb".into(),
            lookup_hash: "lookup-two".into(),
            fingerprint: "k1:bb".into(),
            ..params
        })
        .await
        .unwrap();

        assert!(s.find_credential_by_lookup(&c, "lookup-one").await.is_err());
        let cred = s.find_credential_by_lookup(&c, "lookup-two").await.unwrap();
        assert_eq!(cred.verification_hash, "bb");
        assert!(!cred.revoked);
    }

    #[tokio::test]
    async fn touch_credential_sets_last_used() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let c = conv();
        let p = participant(&s, &c).await;

        s.upsert_login_credential(&UpsertLoginCredentialParams {
            conversation_id: c,
            participant_id: p,
            verification_hash: "aa".into(),
            verification_salt: vec![1; 16],
            lookup_hash: "lookup-one".into(),
            fingerprint: "k1:aa".into(),
        })
        .await
        .unwrap();

        let cred = s.find_credential_by_lookup(&c, "lookup-one").await.unwrap();
        assert!(cred.last_used_at.is_none());

        s.touch_credential(&c, &p, Utc::now()).await.unwrap();
        let cred = s.find_credential_by_lookup(&c, "lookup-one").await.unwrap();
        assert!(cred.last_used_at.is_some());

        let err = s
            .touch_credential(&c, &ParticipantId(Uuid::new_v4()), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn list_waves_optionally_filters_to_one_number() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let c = conv();
        s.create_wave(&wave_params(c, 1)).await.unwrap();
        s.create_wave(&wave_params(c, 2)).await.unwrap();
        s.create_wave(&wave_params(c, 3)).await.unwrap();

        let all = s.list_waves(&c, None, &PageRequest::default()).await.unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(
            all.items.iter().map(|w| w.wave_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        let one = s.list_waves(&c, Some(2), &PageRequest::default()).await.unwrap();
        assert_eq!(one.total, 1);
        assert_eq!(one.items[0].wave_number, 2);
    }

    #[tokio::test]
    async fn child_waves_ordered_by_number() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let c = conv();
        s.create_wave(&wave_params(c, 1)).await.unwrap();
        // Two children of wave 1.
        for n in [2, 3] {
            s.create_wave(&CreateWaveParams {
                conversation_id: c,
                wave_number: n,
                parent_wave: 1,
                invites_per_user: 1,
                owner_invites: 0,
                size: 1,
            })
            .await
            .unwrap();
        }

        let children = s.child_waves(&c, 1).await.unwrap();
        assert_eq!(
            children.iter().map(|w| w.wave_number).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert!(s.child_waves(&c, 3).await.unwrap().is_empty());
    }
}
