use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use tracing::{debug, warn};

use super::{GroupStore, Replaced, StoreError, StoreResult};
use crate::core::{ContactInfo, GroupFields, GroupRecord};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const SELECT_GROUP_SQL: &str = r#"
SELECT
    id,
    created_at,
    updated_at,
    name,
    country,
    state,
    city,
    activity_type,
    meeting_interval,
    wifi_policy,
    ethernet_policy,
    hardware_policy,
    contact_person,
    contact_email,
    contact_phone,
    contact_social,
    public_token
FROM lug_groups
WHERE id = ?
"#;

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteGroupStore {
    pool: SqlitePool,
}

impl SqliteGroupStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `url`, e.g.
    /// `sqlite://lug_directory.db`.
    pub async fn open(url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|err| StoreError::backend(format!("invalid database url: {err}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(2));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database. The connection is never
    /// recycled, because recycling it would drop every row.
    pub async fn open_in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|err| StoreError::backend(err.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Takes the database write lock up front, so concurrent writers wait
    /// out `busy_timeout` instead of failing on a stale WAL snapshot.
    async fn write_transaction(&self) -> StoreResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }
}

#[async_trait]
impl GroupStore for SqliteGroupStore {
    async fn init(&self) -> StoreResult<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|err| StoreError::backend(format!("migration failed: {err}")))
    }

    async fn get(&self, id: &str) -> StoreResult<Option<GroupRecord>> {
        let row = sqlx::query_as::<_, GroupRow>(SELECT_GROUP_SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(GroupRecord::try_from).transpose()
    }

    async fn insert(&self, record: &GroupRecord) -> StoreResult<()> {
        let fields = &record.fields;

        sqlx::query(
            r#"
            INSERT INTO lug_groups (
                id, created_at, updated_at,
                name, country, state, city,
                activity_type, meeting_interval,
                wifi_policy, ethernet_policy, hardware_policy,
                contact_person, contact_email, contact_phone, contact_social,
                public_token
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(&fields.name)
        .bind(&fields.country)
        .bind(&fields.state)
        .bind(&fields.city)
        .bind(fields.activity_type.as_str())
        .bind(fields.meeting_interval.as_str())
        .bind(fields.wifi_policy.as_str())
        .bind(fields.ethernet_policy.as_str())
        .bind(fields.hardware_policy.as_str())
        .bind(&record.contact.person)
        .bind(&record.contact.email)
        .bind(&record.contact.phone)
        .bind(&record.contact.social)
        .bind(&record.public_token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn replace(
        &self,
        id: &str,
        fields: GroupFields,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Replaced>> {
        let mut tx = self.write_transaction().await?;

        let Some(row) = sqlx::query_as::<_, GroupRow>(SELECT_GROUP_SQL)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        let previous = GroupRecord::try_from(row)?;
        let current = previous.replaced_with(fields, now);
        let next = &current.fields;

        // public_token is part of the key so the write only lands on the row
        // that was just read.
        let result = sqlx::query(
            r#"
            UPDATE lug_groups
            SET
                updated_at = ?,
                name = ?,
                country = ?,
                state = ?,
                city = ?,
                activity_type = ?,
                meeting_interval = ?,
                wifi_policy = ?,
                ethernet_policy = ?,
                hardware_policy = ?,
                contact_person = '',
                contact_email = '',
                contact_phone = '',
                contact_social = ''
            WHERE id = ? AND public_token = ?
            "#,
        )
        .bind(current.updated_at)
        .bind(&next.name)
        .bind(&next.country)
        .bind(&next.state)
        .bind(&next.city)
        .bind(next.activity_type.as_str())
        .bind(next.meeting_interval.as_str())
        .bind(next.wifi_policy.as_str())
        .bind(next.ethernet_policy.as_str())
        .bind(next.hardware_policy.as_str())
        .bind(&previous.id)
        .bind(&previous.public_token)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            // Dropping `tx` rolls back.
            return Err(StoreError::Conflict(format!("group {id} changed during update")));
        }

        tx.commit().await?;
        debug!(id, "group row replaced");

        Ok(Some(Replaced { previous, current }))
    }

    async fn delete(&self, id: &str) -> StoreResult<Option<GroupRecord>> {
        let mut tx = self.write_transaction().await?;

        let Some(row) = sqlx::query_as::<_, GroupRow>(SELECT_GROUP_SQL)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };
        let previous = GroupRecord::try_from(row)?;

        let result = sqlx::query("DELETE FROM lug_groups WHERE id = ? AND public_token = ?")
            .bind(&previous.id)
            .bind(&previous.public_token)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Conflict(format!("group {id} changed during delete")));
        }

        tx.commit().await?;
        debug!(id, "group row deleted");

        Ok(Some(previous))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::Duplicate(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref().is_some_and(is_lock_contention) =>
            {
                warn!(error = %db_err, "sqlite write contention");
                Self::Conflict("group is being modified by another request".to_string())
            }
            _ => Self::Backend(err.to_string()),
        }
    }
}

/// SQLITE_BUSY or SQLITE_LOCKED, including their extended codes
/// (e.g. 517 BUSY_SNAPSHOT, 262 LOCKED_SHAREDCACHE).
fn is_lock_contention(code: &str) -> bool {
    const SQLITE_BUSY: i32 = 5;
    const SQLITE_LOCKED: i32 = 6;

    code.parse::<i32>()
        .is_ok_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
}

#[derive(Debug, FromRow)]
struct GroupRow {
    id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    name: String,
    country: String,
    state: String,
    city: String,
    activity_type: String,
    meeting_interval: String,
    wifi_policy: String,
    ethernet_policy: String,
    hardware_policy: String,
    contact_person: String,
    contact_email: String,
    contact_phone: String,
    contact_social: String,
    public_token: String,
}

impl TryFrom<GroupRow> for GroupRecord {
    type Error = StoreError;

    fn try_from(row: GroupRow) -> Result<Self, Self::Error> {
        let corrupt = |err: crate::core::UnknownTerm| {
            StoreError::backend(format!("group {} has a corrupt column: {err}", row.id))
        };

        let fields = GroupFields {
            activity_type: row.activity_type.parse().map_err(corrupt)?,
            meeting_interval: row.meeting_interval.parse().map_err(corrupt)?,
            wifi_policy: row.wifi_policy.parse().map_err(corrupt)?,
            ethernet_policy: row.ethernet_policy.parse().map_err(corrupt)?,
            hardware_policy: row.hardware_policy.parse().map_err(corrupt)?,
            name: row.name,
            country: row.country,
            state: row.state,
            city: row.city,
        };

        Ok(Self {
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            fields,
            contact: ContactInfo {
                person: row.contact_person,
                email: row.contact_email,
                phone: row.contact_phone,
                social: row.contact_social,
            },
            public_token: row.public_token,
        })
    }
}
