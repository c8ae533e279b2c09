//! Persistence collaborator for group records.
//!
//! Every method that reads and then writes does both inside one atomic unit
//! (a held write lock or a database transaction), so a concurrent mutation of
//! the same id can never interleave between the lookup and the write.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::{GroupFields, GroupRecord};

pub use memory::InMemoryGroupStore;
pub use sqlite::SqliteGroupStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The id or public token is already taken.
    #[error("duplicate key: {0}")]
    Duplicate(String),
    /// The row changed underneath an in-flight mutation.
    #[error("concurrent modification: {0}")]
    Conflict(String),
    #[error("store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Result of a full-row replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replaced {
    pub previous: GroupRecord,
    pub current: GroupRecord,
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Creates the backing table if it does not exist yet.
    async fn init(&self) -> StoreResult<()>;

    async fn get(&self, id: &str) -> StoreResult<Option<GroupRecord>>;

    /// Inserts a new row.
    ///
    /// Fails with [`StoreError::Duplicate`] if either `id` or `public_token`
    /// is already present; nothing is written in that case.
    async fn insert(&self, record: &GroupRecord) -> StoreResult<()>;

    /// Looks up `id` and replaces it with
    /// [`GroupRecord::replaced_with`]`(fields, now)` in one atomic step.
    ///
    /// Returns `None` (and writes nothing) when `id` does not exist.
    async fn replace(
        &self,
        id: &str,
        fields: GroupFields,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Replaced>>;

    /// Looks up `id` and removes it in one atomic step, returning the row as
    /// it was just before deletion.
    async fn delete(&self, id: &str) -> StoreResult<Option<GroupRecord>>;
}
