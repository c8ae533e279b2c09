use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use lug_directory::{
    core::{Clock, GroupFields, GroupRecord},
    dispatch::{DispatchRequest, Dispatcher, GroupForm, Outcome},
    error::AppError,
    store::{GroupStore, InMemoryGroupStore, Replaced, StoreResult},
    token::{SequenceEntropy, TokenGenerator},
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Clock that only moves when told to.
struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Store whose `insert` never finishes in reasonable time.
struct SlowStore;

#[async_trait]
impl GroupStore for SlowStore {
    async fn init(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get(&self, _id: &str) -> StoreResult<Option<GroupRecord>> {
        Ok(None)
    }

    async fn insert(&self, _record: &GroupRecord) -> StoreResult<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    async fn replace(
        &self,
        _id: &str,
        _fields: GroupFields,
        _now: DateTime<Utc>,
    ) -> StoreResult<Option<Replaced>> {
        Ok(None)
    }

    async fn delete(&self, _id: &str) -> StoreResult<Option<GroupRecord>> {
        Ok(None)
    }
}

/// Wraps the in-memory store and parks every `replace` until released.
struct GatedStore {
    inner: InMemoryGroupStore,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl GroupStore for GatedStore {
    async fn init(&self) -> StoreResult<()> {
        self.inner.init().await
    }

    async fn get(&self, id: &str) -> StoreResult<Option<GroupRecord>> {
        self.inner.get(id).await
    }

    async fn insert(&self, record: &GroupRecord) -> StoreResult<()> {
        self.inner.insert(record).await
    }

    async fn replace(
        &self,
        id: &str,
        fields: GroupFields,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Replaced>> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.replace(id, fields, now).await
    }

    async fn delete(&self, id: &str) -> StoreResult<Option<GroupRecord>> {
        self.inner.delete(id).await
    }
}

fn form(name: &str) -> GroupForm {
    GroupForm {
        name: name.to_string(),
        country: "United States".to_string(),
        state: "CA".to_string(),
        city: "San Jose".to_string(),
        activity_type: "Public".to_string(),
        meeting_interval: "Monthly".to_string(),
        wifi_policy: "Public".to_string(),
        ethernet_policy: "None".to_string(),
        hardware_policy: "Not Restricted".to_string(),
    }
}

fn create(name: &str) -> DispatchRequest {
    DispatchRequest {
        form: form(name),
        ..DispatchRequest::default()
    }
}

fn update(target_id: &str, name: &str) -> DispatchRequest {
    DispatchRequest {
        target_id: target_id.to_string(),
        form: form(name),
        ..DispatchRequest::default()
    }
}

fn delete(target_id: &str) -> DispatchRequest {
    DispatchRequest {
        target_id: target_id.to_string(),
        delete_requested: true,
        ..DispatchRequest::default()
    }
}

fn created_token(outcome: Outcome) -> String {
    match outcome {
        Outcome::Created { token } => token,
        other => panic!("expected a create, got {other:?}"),
    }
}

#[tokio::test]
async fn full_lifecycle_keeps_identity_and_token() {
    let store = Arc::new(InMemoryGroupStore::new());
    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::starting_at(t0));
    let dispatcher = Dispatcher::new(store.clone()).with_clock(clock.clone());

    let token = created_token(dispatcher.handle(create("Metro LUG")).await.unwrap());
    assert_eq!(token.len(), 8);
    assert!(token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

    clock.advance(chrono::Duration::days(3));
    let outcome = dispatcher
        .handle(update(&token, "Metro LUG Relaunch"))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Updated {
            old_name: "Metro LUG".into(),
            new_name: "Metro LUG Relaunch".into(),
        }
    );

    let record = store.get(&token).await.unwrap().unwrap();
    assert_eq!(record.id, token);
    assert_eq!(record.public_token, token);
    assert_eq!(record.created_at, t0);
    assert_eq!(record.updated_at, t0 + chrono::Duration::days(3));
    assert_eq!(record.name(), "Metro LUG Relaunch");
    assert!(record.contact.person.is_empty());

    let outcome = dispatcher.handle(delete(&token)).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Deleted {
            name: "Metro LUG Relaunch".into()
        }
    );
    assert!(store.is_empty().await);

    let err = dispatcher.handle(delete(&token)).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn delete_wins_over_update_and_ignores_attributes() {
    let store = Arc::new(InMemoryGroupStore::new());
    let dispatcher = Dispatcher::new(store.clone());
    let token = created_token(dispatcher.handle(create("Metro LUG")).await.unwrap());

    let mut request = update(&token, "Renamed");
    request.delete_requested = true;
    request.form.meeting_interval = "Fortnightly".to_string();

    let outcome = dispatcher.handle(request).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Deleted {
            name: "Metro LUG".into()
        }
    );
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn rejected_update_leaves_record_untouched() {
    let store = Arc::new(InMemoryGroupStore::new());
    let dispatcher = Dispatcher::new(store.clone());
    let token = created_token(dispatcher.handle(create("Metro LUG")).await.unwrap());
    let before = store.get(&token).await.unwrap().unwrap();

    let mut request = update(&token, "Metro LUG Relaunch");
    request.form.hardware_policy = "Sometimes".to_string();
    let err = dispatcher.handle(request).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert_eq!(store.get(&token).await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn flat_fields_ignore_unknown_keys() {
    let store = Arc::new(InMemoryGroupStore::new());
    let tokens = TokenGenerator::new(Arc::new(SequenceEntropy::new("test")));
    let dispatcher = Dispatcher::new(store).with_tokens(tokens);

    let mut fields: HashMap<String, String> = [
        ("name", "Metro LUG"),
        ("country", "United States"),
        ("state", "CA"),
        ("city", "San Jose"),
        ("activity_type", "Public/Online"),
        ("meeting_interval", "Bi-Weekly"),
        ("wifi_policy", "Pay"),
        ("ethernet_policy", "Private"),
        ("hardware_policy", "Restricted"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    fields.insert("submit_button".to_string(), "Send".to_string());

    let outcome = dispatcher.handle_fields(&fields).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Created {
            token: "4OEJYS6S".into()
        }
    );
}

#[tokio::test]
async fn concurrent_creates_never_share_a_token() {
    let store = Arc::new(InMemoryGroupStore::new());
    let dispatcher = Dispatcher::new(store.clone());

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.handle(create(&format!("LUG {i}"))).await })
        })
        .collect();

    let mut tokens = Vec::new();
    for handle in handles {
        tokens.push(created_token(handle.await.unwrap().unwrap()));
    }
    tokens.sort();
    tokens.dedup();

    assert_eq!(tokens.len(), 32);
    assert_eq!(store.len().await, 32);
}

#[tokio::test]
async fn racing_update_and_delete_never_resurrect_a_record() {
    let store = Arc::new(InMemoryGroupStore::new());
    let dispatcher = Dispatcher::new(store.clone());
    let token = created_token(dispatcher.handle(create("Metro LUG")).await.unwrap());

    let updater = {
        let dispatcher = dispatcher.clone();
        let token = token.clone();
        tokio::spawn(async move { dispatcher.handle(update(&token, "Metro LUG Relaunch")).await })
    };
    let deleter = {
        let dispatcher = dispatcher.clone();
        let token = token.clone();
        tokio::spawn(async move { dispatcher.handle(delete(&token)).await })
    };

    let updated = updater.await.unwrap();
    let deleted = deleter.await.unwrap();

    assert!(matches!(deleted, Ok(Outcome::Deleted { .. })));
    match updated {
        Ok(Outcome::Updated { .. }) | Err(AppError::NotFound(_)) => {}
        other => panic!("unexpected update result: {other:?}"),
    }
    assert!(store.get(&token).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn slow_store_times_out() {
    let dispatcher =
        Dispatcher::new(Arc::new(SlowStore)).with_store_timeout(Duration::from_millis(250));

    let err = dispatcher.handle(create("Metro LUG")).await.unwrap_err();
    assert!(matches!(err, AppError::Timeout(limit) if limit == Duration::from_millis(250)));
    assert_eq!(err.code(), "timeout");
}

#[tokio::test]
async fn cancellation_mid_update_writes_nothing() {
    let store = Arc::new(GatedStore {
        inner: InMemoryGroupStore::new(),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let dispatcher = Dispatcher::new(store.clone());
    let token = created_token(dispatcher.handle(create("Metro LUG")).await.unwrap());
    let before = store.get(&token).await.unwrap().unwrap();

    let cancel = CancellationToken::new();
    let (result, ()) = tokio::join!(
        dispatcher.handle_cancellable(update(&token, "Metro LUG Relaunch"), &cancel),
        async {
            store.entered.notified().await;
            cancel.cancel();
        }
    );

    assert!(matches!(result, Err(AppError::Cancelled)));
    assert_eq!(store.get(&token).await.unwrap().unwrap(), before);
}
