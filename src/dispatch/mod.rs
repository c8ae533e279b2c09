//! Record lifecycle dispatcher.
//!
//! Classifies a request into create / update / delete and performs exactly
//! one store mutation for it. Lookup-then-write pairs are delegated to the
//! store as single atomic calls, and every store call is bounded by a
//! timeout.

pub mod request;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::core::{Clock, GroupFields, GroupRecord, SystemClock};
use crate::error::{AppError, AppResult};
use crate::store::{GroupStore, StoreError, StoreResult};
use crate::token::TokenGenerator;

pub use request::{DispatchRequest, GroupForm, Operation};

/// Token draws per create before a collision is reported as a conflict.
pub const MAX_CREATE_ATTEMPTS: usize = 5;

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// What a dispatched request did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Outcome {
    Created { token: String },
    Updated { old_name: String, new_name: String },
    Deleted { name: String },
}

impl Outcome {
    /// Plaintext body understood by the legacy form wizard.
    pub fn legacy_text(&self) -> String {
        match self {
            Self::Created { token } => token.clone(),
            Self::Updated { old_name, new_name } => format!("UPDATED {old_name} to {new_name}"),
            Self::Deleted { name } => format!("DELETED {name}"),
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn GroupStore>,
    tokens: TokenGenerator,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn GroupStore>) -> Self {
        Self {
            store,
            tokens: TokenGenerator::system(),
            clock: Arc::new(SystemClock),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_tokens(mut self, tokens: TokenGenerator) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn GroupStore> {
        &self.store
    }

    /// Parses flat form fields and dispatches them.
    pub async fn handle_fields(&self, fields: &HashMap<String, String>) -> AppResult<Outcome> {
        self.handle(DispatchRequest::from_fields(fields)?).await
    }

    /// Dispatches one request.
    #[instrument(skip_all, fields(target_id = %request.target_id, delete = request.delete_requested))]
    pub async fn handle(&self, request: DispatchRequest) -> AppResult<Outcome> {
        let operation = request.classify()?;
        debug!(operation = operation.name(), "dispatching");

        match operation {
            Operation::Create(fields) => self.create(fields).await,
            Operation::Update { target_id, fields } => self.update(&target_id, fields).await,
            Operation::Delete { target_id } => self.delete(&target_id).await,
        }
    }

    /// Like [`Dispatcher::handle`], but gives up as soon as `cancel` fires.
    ///
    /// The in-flight store future is dropped on cancellation, which rolls back
    /// any open transaction.
    pub async fn handle_cancellable(
        &self,
        request: DispatchRequest,
        cancel: &CancellationToken,
    ) -> AppResult<Outcome> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("dispatch cancelled before completion");
                Err(AppError::Cancelled)
            }
            outcome = self.handle(request) => outcome,
        }
    }

    /// Fetches a record by its id / public token.
    pub async fn lookup(&self, token: &str) -> AppResult<GroupRecord> {
        self.bounded(self.store.get(token))
            .await??
            .ok_or_else(|| AppError::not_found(format!("group {token} does not exist")))
    }

    async fn create(&self, fields: GroupFields) -> AppResult<Outcome> {
        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let token = self.tokens.generate_default()?;
            let record = GroupRecord::create(token.clone(), fields.clone(), self.clock.now());

            match self.bounded(self.store.insert(&record)).await? {
                Ok(()) => {
                    info!(token = %token, name = %record.name(), "group created");
                    return Ok(Outcome::Created { token });
                }
                Err(StoreError::Duplicate(key)) => {
                    warn!(attempt, %key, "token collision, drawing a new one");
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(AppError::conflict(format!(
            "no free token after {MAX_CREATE_ATTEMPTS} attempts"
        )))
    }

    async fn update(&self, target_id: &str, fields: GroupFields) -> AppResult<Outcome> {
        let replaced = self
            .bounded(self.store.replace(target_id, fields, self.clock.now()))
            .await??
            .ok_or_else(|| {
                AppError::not_found(format!("cannot update group {target_id}: it does not exist"))
            })?;

        info!(
            id = %replaced.current.id,
            old_name = %replaced.previous.name(),
            new_name = %replaced.current.name(),
            "group updated"
        );

        Ok(Outcome::Updated {
            old_name: replaced.previous.fields.name,
            new_name: replaced.current.fields.name,
        })
    }

    async fn delete(&self, target_id: &str) -> AppResult<Outcome> {
        let deleted = self
            .bounded(self.store.delete(target_id))
            .await??
            .ok_or_else(|| {
                AppError::not_found(format!("cannot delete group {target_id}: it does not exist"))
            })?;

        info!(id = %deleted.id, name = %deleted.name(), "group deleted");

        Ok(Outcome::Deleted {
            name: deleted.fields.name,
        })
    }

    /// Runs a store call under the configured timeout. The outer error is
    /// the timeout, the inner one the store's own result.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = StoreResult<T>>,
    ) -> AppResult<StoreResult<T>> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| AppError::Timeout(self.store_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sample_fields;
    use crate::store::InMemoryGroupStore;
    use crate::token::SequenceEntropy;

    fn dispatcher() -> (Dispatcher, Arc<InMemoryGroupStore>) {
        let store = Arc::new(InMemoryGroupStore::new());
        let tokens = TokenGenerator::new(Arc::new(SequenceEntropy::new("test")));
        (Dispatcher::new(store.clone()).with_tokens(tokens), store)
    }

    fn form(fields: &GroupFields) -> GroupForm {
        GroupForm {
            name: fields.name.clone(),
            country: fields.country.clone(),
            state: fields.state.clone(),
            city: fields.city.clone(),
            activity_type: fields.activity_type.to_string(),
            meeting_interval: fields.meeting_interval.to_string(),
            wifi_policy: fields.wifi_policy.to_string(),
            ethernet_policy: fields.ethernet_policy.to_string(),
            hardware_policy: fields.hardware_policy.to_string(),
        }
    }

    #[test]
    fn legacy_text_formats() {
        assert_eq!(
            Outcome::Created {
                token: "ABCD1234".into()
            }
            .legacy_text(),
            "ABCD1234"
        );
        assert_eq!(
            Outcome::Updated {
                old_name: "Metro LUG".into(),
                new_name: "Metro LUG Relaunch".into()
            }
            .legacy_text(),
            "UPDATED Metro LUG to Metro LUG Relaunch"
        );
        assert_eq!(
            Outcome::Deleted {
                name: "Metro LUG".into()
            }
            .legacy_text(),
            "DELETED Metro LUG"
        );
    }

    #[test]
    fn outcome_serializes_with_operation_tag() {
        let json = serde_json::to_value(Outcome::Deleted {
            name: "Metro LUG".into(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"operation": "deleted", "name": "Metro LUG"}));
    }

    #[tokio::test]
    async fn create_uses_the_generated_token_for_id_and_link() {
        let (dispatcher, store) = dispatcher();
        let request = DispatchRequest {
            form: form(&sample_fields("Metro LUG")),
            ..DispatchRequest::default()
        };

        let outcome = dispatcher.handle(request).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Created {
                token: "4OEJYS6S".into()
            }
        );

        let stored = store.get("4OEJYS6S").await.unwrap().unwrap();
        assert_eq!(stored.public_token, "4OEJYS6S");
        assert_eq!(stored.created_at, stored.updated_at);
    }

    #[tokio::test]
    async fn create_retries_on_token_collision() {
        let (dispatcher, store) = dispatcher();
        // Occupy the first token the sequence will produce.
        let squatter = GroupRecord::create("4OEJYS6S", sample_fields("Squatter"), chrono::Utc::now());
        store.insert(&squatter).await.unwrap();

        let outcome = dispatcher
            .handle(DispatchRequest {
                form: form(&sample_fields("Metro LUG")),
                ..DispatchRequest::default()
            })
            .await
            .unwrap();

        // Second seed "test-1" -> "XHLFTHS4..."
        assert_eq!(
            outcome,
            Outcome::Created {
                token: "XHLFTHS4".into()
            }
        );
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn update_and_delete_on_missing_target_are_not_found() {
        let (dispatcher, store) = dispatcher();

        let err = dispatcher
            .handle(DispatchRequest {
                target_id: "MISSING1".into(),
                form: form(&sample_fields("Ghost")),
                ..DispatchRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = dispatcher
            .handle(DispatchRequest {
                target_id: "MISSING1".into(),
                delete_requested: true,
                ..DispatchRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn lookup_reports_missing_records() {
        let (dispatcher, _) = dispatcher();
        let err = dispatcher.lookup("NOSUCH01").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn pre_cancelled_request_never_reaches_the_store() {
        let (dispatcher, store) = dispatcher();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = dispatcher
            .handle_cancellable(
                DispatchRequest {
                    form: form(&sample_fields("Metro LUG")),
                    ..DispatchRequest::default()
                },
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Cancelled));
        assert!(store.is_empty().await);
    }
}
