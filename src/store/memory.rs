use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{GroupStore, Replaced, StoreError, StoreResult};
use crate::core::{GroupFields, GroupRecord};

/// Process-local store. Rows live as long as the store value.
#[derive(Default)]
pub struct InMemoryGroupStore {
    groups: RwLock<HashMap<String, GroupRecord>>,
}

impl InMemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.groups.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.groups.read().await.is_empty()
    }
}

#[async_trait]
impl GroupStore for InMemoryGroupStore {
    async fn init(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<GroupRecord>> {
        Ok(self.groups.read().await.get(id).cloned())
    }

    async fn insert(&self, record: &GroupRecord) -> StoreResult<()> {
        let mut groups = self.groups.write().await;

        if groups.contains_key(&record.id) {
            return Err(StoreError::Duplicate(format!("id {}", record.id)));
        }
        if groups
            .values()
            .any(|existing| existing.public_token == record.public_token)
        {
            return Err(StoreError::Duplicate(format!(
                "public_token {}",
                record.public_token
            )));
        }

        groups.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn replace(
        &self,
        id: &str,
        fields: GroupFields,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Replaced>> {
        // Write lock is held across lookup and write.
        let mut groups = self.groups.write().await;
        let Some(slot) = groups.get_mut(id) else {
            return Ok(None);
        };

        let current = slot.replaced_with(fields, now);
        let previous = std::mem::replace(slot, current.clone());
        Ok(Some(Replaced { previous, current }))
    }

    async fn delete(&self, id: &str) -> StoreResult<Option<GroupRecord>> {
        Ok(self.groups.write().await.remove(id))
    }
}
