//! The backend collaborator as seen by the client.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use alumnet_shared::timefmt;
use alumnet_shared::types::UserId;

use crate::error::Result;
use crate::query::{Filter, Patch, Query, Row, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
}

/// A row change pushed by the backend. `row` is the row as it is after the
/// change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub row: Row,
}

/// Which changes a subscription receives: one table, equality on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeFilter {
    pub table: Table,
    pub column: String,
    pub value: Value,
}

impl ChangeFilter {
    pub fn new(table: Table, column: &str, value: impl Serialize) -> Self {
        Self {
            table,
            column: column.to_string(),
            value: serde_json::to_value(value).unwrap_or(Value::Null),
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.table == self.table
            && Filter::Eq(self.column.clone(), self.value.clone()).matches(&event.row)
    }

    /// Channel name, used in logs.
    pub fn topic(&self) -> String {
        format!("{}:{}=eq.{}", self.table, self.column, self.value)
    }
}

/// A live change subscription. Dropping it unsubscribes.
pub struct Subscription {
    topic: String,
    rx: mpsc::Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn new(topic: String, rx: mpsc::Receiver<ChangeEvent>) -> Self {
        Self { topic, rx }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next event, or `None` once the backend closed the channel.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// An event that is already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("topic", &self.topic).finish()
    }
}

/// An authenticated backend session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user_id: UserId,
    pub access_token: String,
    #[serde(with = "timefmt")]
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    SignedOut,
    TokenRefreshed(AuthSession),
}

/// Everything the application asks of its managed backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Select rows matching the query.
    async fn select(&self, query: &Query) -> Result<Vec<Row>>;

    /// Count rows matching the filter.
    async fn count(&self, table: Table, filter: Option<&Filter>) -> Result<u64>;

    /// Insert one row; returns it with the server-assigned `id` and
    /// `created_at`.
    async fn insert(&self, table: Table, row: Row) -> Result<Row>;

    /// Set the patch fields on every row matching the filter; returns the
    /// updated rows.
    async fn update(&self, table: Table, filter: &Filter, patch: &Patch) -> Result<Vec<Row>>;

    /// Subscribe to insert/update events on a table.
    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription>;

    /// Store a blob under `bucket/path`; returns its public URL.
    async fn upload(&self, bucket: &str, path: &str, data: Bytes) -> Result<String>;

    /// The persisted session, if one exists and has not expired.
    async fn current_session(&self) -> Result<Option<AuthSession>>;

    /// Create an account and its `profiles` row, then sign in.
    async fn sign_up(&self, email: &str, password: &str, profile: Row) -> Result<AuthSession>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;

    async fn sign_out(&self) -> Result<()>;

    /// Exchange the current session for a fresh one.
    async fn refresh_session(&self) -> Result<AuthSession>;

    /// Auth state changes, in the order they happened.
    fn auth_events(&self) -> broadcast::Receiver<AuthEvent>;
}
