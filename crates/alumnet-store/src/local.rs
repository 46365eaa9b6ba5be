//! [`Backend`] implementation over a local SQLite database and storage
//! directory.
//!
//! Writes are published on an in-process change feed; each subscription
//! gets a forwarder task that applies its equality filter.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::backend::{AuthEvent, AuthSession, Backend, ChangeEvent, ChangeFilter, ChangeKind, Subscription};
use crate::config::LocalBackendConfig;
use crate::database::Database;
use crate::error::{BackendError, Result};
use crate::query::{Filter, Patch, Query, Row, Table};
use crate::storage::ObjectStorage;

/// Capacity of the shared change feed before slow subscribers lag.
const CHANGE_FEED_CAPACITY: usize = 1024;

/// Per-subscription buffer between the forwarder and the consumer.
const SUBSCRIPTION_BUFFER: usize = 256;

const AUTH_EVENT_CAPACITY: usize = 16;

pub struct LocalBackend {
    db: Mutex<Database>,
    storage: ObjectStorage,
    changes: broadcast::Sender<ChangeEvent>,
    auth: broadcast::Sender<AuthEvent>,
}

impl LocalBackend {
    pub fn open(config: &LocalBackendConfig) -> Result<Self> {
        let db = Database::open_at(&config.database_path())?;
        info!(data_dir = %config.data_dir.display(), "Local backend opened");
        Ok(Self::with_database(db, config))
    }

    /// A backend whose tables live in memory; storage still goes to
    /// `config.storage_dir()`.
    pub fn in_memory(config: &LocalBackendConfig) -> Result<Self> {
        Ok(Self::with_database(Database::open_in_memory()?, config))
    }

    fn with_database(db: Database, config: &LocalBackendConfig) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        let (auth, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            db: Mutex::new(db),
            storage: ObjectStorage::new(config.storage_dir(), &config.public_url, config.max_upload_size),
            changes,
            auth,
        }
    }

    pub fn storage(&self) -> &ObjectStorage {
        &self.storage
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|e| BackendError::Unavailable(format!("Lock poisoned: {e}")))
    }

    fn publish(&self, table: Table, kind: ChangeKind, row: &Row) {
        // No receivers is fine: nobody is subscribed yet.
        let _ = self.changes.send(ChangeEvent {
            table,
            kind,
            row: row.clone(),
        });
    }

    fn announce(&self, event: AuthEvent) {
        let _ = self.auth.send(event);
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Row>> {
        self.db()?.select_rows(query)
    }

    async fn count(&self, table: Table, filter: Option<&Filter>) -> Result<u64> {
        self.db()?.count_rows(table, filter)
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row> {
        let inserted = self.db()?.insert_row(table, row)?;
        self.publish(table, ChangeKind::Insert, &inserted);
        Ok(inserted)
    }

    async fn update(&self, table: Table, filter: &Filter, patch: &Patch) -> Result<Vec<Row>> {
        let updated = self.db()?.update_rows(table, filter, patch)?;
        for row in &updated {
            self.publish(table, ChangeKind::Update, row);
        }
        Ok(updated)
    }

    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription> {
        crate::query::validate_column(&filter.column)?;

        // Register on the feed before returning so no later write is missed.
        let mut feed = self.changes.subscribe();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let topic = filter.topic();
        let task_topic = topic.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    received = feed.recv() => match received {
                        Ok(event) => {
                            if filter.matches(&event) && tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(topic = %task_topic, skipped, "Change subscription lagged, events dropped");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!(topic = %task_topic, "Change subscription closed");
        });

        debug!(topic = %topic, "Change subscription opened");
        Ok(Subscription::new(topic, rx))
    }

    async fn upload(&self, bucket: &str, path: &str, data: Bytes) -> Result<String> {
        self.storage.put(bucket, path, &data).await
    }

    async fn current_session(&self) -> Result<Option<AuthSession>> {
        self.db()?.persisted_session(Utc::now())
    }

    async fn sign_up(&self, email: &str, password: &str, mut profile: Row) -> Result<AuthSession> {
        let (session, profile_row) = {
            let db = self.db()?;
            let user_id = db.create_account(email, password)?;
            profile.insert("id".into(), Value::String(user_id.to_string()));
            profile.insert("email".into(), Value::String(email.trim().to_lowercase()));
            let profile_row = db.insert_row(Table::Profiles, profile)?;
            (db.create_session(user_id, Utc::now())?, profile_row)
        };

        self.publish(Table::Profiles, ChangeKind::Insert, &profile_row);
        info!(user = %session.user_id, "Account created");
        self.announce(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let session = {
            let db = self.db()?;
            let user_id = db.verify_credentials(email, password)?;
            db.create_session(user_id, Utc::now())?
        };
        info!(user = %session.user_id, "Signed in");
        self.announce(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        self.db()?.clear_session()?;
        info!("Signed out");
        self.announce(AuthEvent::SignedOut);
        Ok(())
    }

    async fn refresh_session(&self) -> Result<AuthSession> {
        let session = self.db()?.refresh_session(Utc::now())?;
        debug!(user = %session.user_id, "Session refreshed");
        self.announce(AuthEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn backend() -> (LocalBackend, TempDir) {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::open(&LocalBackendConfig::at(dir.path())).unwrap();
        (backend, dir)
    }

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    async fn next(sub: &mut Subscription) -> ChangeEvent {
        tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("event in time")
            .expect("subscription open")
    }

    #[tokio::test]
    async fn subscription_receives_only_matching_changes() {
        let (backend, _dir) = backend();
        let mut sub = backend
            .subscribe(ChangeFilter::new(Table::Messages, "receiver_id", "me"))
            .await
            .unwrap();

        backend
            .insert(Table::Messages, row(json!({ "receiver_id": "other", "content": "skip" })))
            .await
            .unwrap();
        backend
            .insert(Table::Notifications, row(json!({ "receiver_id": "me", "content": "skip" })))
            .await
            .unwrap();
        let inserted = backend
            .insert(Table::Messages, row(json!({ "receiver_id": "me", "content": "hi", "read": false })))
            .await
            .unwrap();

        let event = next(&mut sub).await;
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.row["content"], json!("hi"));

        backend
            .update(
                Table::Messages,
                &Filter::eq("id", inserted["id"].clone()),
                &Patch::new().set("read", true),
            )
            .await
            .unwrap();
        let event = next(&mut sub).await;
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.row["read"], json!(true));
    }

    #[tokio::test]
    async fn auth_lifecycle_emits_events() {
        let (backend, _dir) = backend();
        let mut events = backend.auth_events();

        let session = backend
            .sign_up(
                "grace@example.org",
                "hopper1906",
                row(json!({ "display_name": "Grace", "role": "alumni" })),
            )
            .await
            .unwrap();
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedIn(session.clone()));
        assert_eq!(backend.current_session().await.unwrap(), Some(session.clone()));

        let profile = backend
            .select(&Query::from(Table::Profiles).filter(Filter::eq("id", session.user_id)))
            .await
            .unwrap();
        assert_eq!(profile.len(), 1);
        assert_eq!(profile[0]["email"], json!("grace@example.org"));

        let refreshed = backend.refresh_session().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), AuthEvent::TokenRefreshed(refreshed));

        backend.sign_out().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedOut);
        assert_eq!(backend.current_session().await.unwrap(), None);

        let again = backend.sign_in("grace@example.org", "hopper1906").await.unwrap();
        assert_eq!(again.user_id, session.user_id);
    }

    #[tokio::test]
    async fn session_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let config = LocalBackendConfig::at(dir.path());
        let session = {
            let backend = LocalBackend::open(&config).unwrap();
            backend
                .sign_up("ada@example.org", "analytical", row(json!({ "display_name": "Ada", "role": "faculty" })))
                .await
                .unwrap()
        };
        let reopened = LocalBackend::open(&config).unwrap();
        assert_eq!(reopened.current_session().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn upload_returns_public_url() {
        let (backend, _dir) = backend();
        let url = backend
            .upload("avatars", "u1/a.png", Bytes::from_static(b"png"))
            .await
            .unwrap();
        assert_eq!(url, "http://127.0.0.1:8080/storage/avatars/u1/a.png");
        assert_eq!(backend.storage().get("avatars", "u1/a.png").await.unwrap(), b"png");
    }
}
