#![allow(dead_code)]

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::broadcast;

use alumnet_client::session::Viewer;
use alumnet_shared::models::{ConnectionStatus, Message};
use alumnet_shared::types::{Identity, Role, UserId};
use alumnet_store::{
    to_row, AuthEvent, AuthSession, Backend, BackendError, ChangeFilter, Filter, LocalBackend,
    LocalBackendConfig, Patch, Query, Result, Row, Subscription, Table,
};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: &'static str,
    pub table: Option<Table>,
}

#[derive(Default)]
struct Recorded {
    calls: Vec<Call>,
    updated_ids: Vec<(Table, BTreeSet<String>)>,
    fail_updates: bool,
}

/// [`LocalBackend`] wrapper that records calls and can be told to fail
/// updates.
pub struct RecordingBackend {
    inner: LocalBackend,
    recorded: Mutex<Recorded>,
}

impl RecordingBackend {
    pub fn new(dir: &TempDir) -> Self {
        Self {
            inner: LocalBackend::open(&LocalBackendConfig::at(dir.path())).unwrap(),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    fn record(&self, op: &'static str, table: Option<Table>) {
        self.recorded.lock().unwrap().calls.push(Call { op, table });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.recorded.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, op: &str, table: Table) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.op == op && c.table == Some(table))
            .count()
    }

    /// The id sets of every update that filtered on `id`, in call order.
    pub fn updated_ids(&self, table: Table) -> Vec<BTreeSet<String>> {
        self.recorded
            .lock()
            .unwrap()
            .updated_ids
            .iter()
            .filter(|(t, _)| *t == table)
            .map(|(_, ids)| ids.clone())
            .collect()
    }

    pub fn clear(&self) {
        let mut recorded = self.recorded.lock().unwrap();
        recorded.calls.clear();
        recorded.updated_ids.clear();
    }

    pub fn fail_updates(&self, fail: bool) {
        self.recorded.lock().unwrap().fail_updates = fail;
    }
}

fn id_set(filter: &Filter) -> Option<BTreeSet<String>> {
    match filter {
        Filter::In(column, values) if column == "id" => Some(
            values
                .iter()
                .map(|v| v.as_str().unwrap_or_default().to_string())
                .collect(),
        ),
        Filter::Eq(column, value) if column == "id" => {
            Some(BTreeSet::from([value.as_str().unwrap_or_default().to_string()]))
        }
        Filter::And(parts) | Filter::Or(parts) => parts.iter().find_map(id_set),
        _ => None,
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Row>> {
        self.record("select", Some(query.table));
        self.inner.select(query).await
    }

    async fn count(&self, table: Table, filter: Option<&Filter>) -> Result<u64> {
        self.record("count", Some(table));
        self.inner.count(table, filter).await
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row> {
        self.record("insert", Some(table));
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: Table, filter: &Filter, patch: &Patch) -> Result<Vec<Row>> {
        self.record("update", Some(table));
        let fail = {
            let mut recorded = self.recorded.lock().unwrap();
            if let Some(ids) = id_set(filter) {
                recorded.updated_ids.push((table, ids));
            }
            recorded.fail_updates
        };
        if fail {
            return Err(BackendError::Unavailable("injected failure".into()));
        }
        self.inner.update(table, filter, patch).await
    }

    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription> {
        self.record("subscribe", Some(filter.table));
        self.inner.subscribe(filter).await
    }

    async fn upload(&self, bucket: &str, path: &str, data: Bytes) -> Result<String> {
        self.record("upload", None);
        self.inner.upload(bucket, path, data).await
    }

    async fn current_session(&self) -> Result<Option<AuthSession>> {
        self.inner.current_session().await
    }

    async fn sign_up(&self, email: &str, password: &str, profile: Row) -> Result<AuthSession> {
        self.inner.sign_up(email, password, profile).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        self.inner.sign_in(email, password).await
    }

    async fn sign_out(&self) -> Result<()> {
        self.inner.sign_out().await
    }

    async fn refresh_session(&self) -> Result<AuthSession> {
        self.inner.refresh_session().await
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.auth_events()
    }
}

/// A test world: a recording backend over a temp dir.
pub struct World {
    pub backend: Arc<RecordingBackend>,
    _dir: TempDir,
}

impl World {
    pub fn new() -> Self {
        alumnet_client::init_tracing();
        let dir = TempDir::new().unwrap();
        Self {
            backend: Arc::new(RecordingBackend::new(&dir)),
            _dir: dir,
        }
    }

    pub fn dyn_backend(&self) -> Arc<dyn Backend> {
        self.backend.clone()
    }

    /// Create an account and return its authenticated viewer. The backend's
    /// persisted session ends up belonging to the last user created.
    pub async fn user(&self, name: &str, role: Role) -> Viewer {
        let email = format!("{}@example.org", name.to_lowercase());
        let profile = to_row(&json!({ "display_name": name, "role": role })).unwrap();
        let session = self
            .backend
            .sign_up(&email, "correct horse", profile)
            .await
            .unwrap();
        Viewer::Authenticated(Identity {
            id: session.user_id,
            display_name: name.to_string(),
            role,
        })
    }

    pub async fn connect(&self, a: &Viewer, b: &Viewer) {
        let row = to_row(&json!({
            "requester_id": a.identity().id,
            "addressee_id": b.identity().id,
            "status": ConnectionStatus::Accepted,
        }))
        .unwrap();
        self.backend.insert(Table::Connections, row).await.unwrap();
    }

    /// Insert a message row directly, as another client would.
    pub async fn message(&self, from: &Viewer, to: &Viewer, content: &str) -> Message {
        let row = to_row(&json!({
            "sender_id": from.identity().id,
            "receiver_id": to.identity().id,
            "content": content,
            "read": false,
        }))
        .unwrap();
        let row = self.backend.insert(Table::Messages, row).await.unwrap();
        alumnet_store::from_row(row).unwrap()
    }

    /// Unread messages `from` sent to `to`, straight from the backend.
    pub async fn unread_between(&self, from: &Viewer, to: &Viewer) -> usize {
        let filter = Filter::eq("sender_id", from.identity().id)
            .and(Filter::eq("receiver_id", to.identity().id))
            .and(Filter::eq("read", false));
        self.backend
            .select(&Query::from(Table::Messages).filter(filter))
            .await
            .unwrap()
            .len()
    }
}

pub fn ids(messages: &[&Message]) -> BTreeSet<String> {
    messages.iter().map(|m| m.id.to_string()).collect()
}

pub fn guest() -> Viewer {
    Viewer::Guest(Identity::guest())
}

pub fn user_id(viewer: &Viewer) -> UserId {
    viewer.identity().id
}

/// Poll `check` until it returns true or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if check().await {
            return;
        }
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
