//! The task that owns the signed-in user's views.
//!
//! It subscribes to the user's message and notification changes, loads the
//! views, then serves one loop that handles change events, mark-read
//! receipts and UI commands in arrival order. Commands are processed one at
//! a time, so sends complete in the order they were issued.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use alumnet_shared::models::{Event, Message, Notification};
use alumnet_shared::types::UserId;
use alumnet_store::{from_row, Backend, ChangeEvent, ChangeFilter, ChangeKind, Subscription, Table};

use super::badges::DashboardBadges;
use super::chat::ChatView;
use super::conversation::Conversation;
use super::notifications::NotificationFeed;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::ToastSink;
use crate::fetchers::dashboard::DashboardStats;
use crate::session::Viewer;

const COMMAND_BUFFER: usize = 64;

/// Requests from the UI to the bridge task.
#[derive(Debug)]
pub enum ChatCommand {
    Open(UserId),
    Send {
        peer: UserId,
        text: String,
        reply: oneshot::Sender<Result<Message, ClientError>>,
    },
    MarkAllNotificationsRead,
    MarkNotificationRead(Uuid),
    Reload,
    Snapshot(oneshot::Sender<BridgeSnapshot>),
}

/// A copy of the view state for rendering.
#[derive(Debug, Clone)]
pub struct BridgeSnapshot {
    pub conversations: Vec<Conversation>,
    pub focused: Option<UserId>,
    pub thread: Vec<Message>,
    pub notifications: Vec<Notification>,
    pub unread_notifications: usize,
    pub stats: DashboardStats,
    pub upcoming_events: Vec<Event>,
}

impl BridgeSnapshot {
    pub fn conversation(&self, peer: UserId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.peer.id == peer)
    }
}

pub struct SyncBridge {
    chat: ChatView,
    feed: NotificationFeed,
    badges: DashboardBadges,
    messages: Subscription,
    notifications: Subscription,
    commands: mpsc::Receiver<ChatCommand>,
}

impl SyncBridge {
    /// Subscribe, load the views and spawn the bridge task for an
    /// authenticated viewer.
    pub async fn start(
        backend: Arc<dyn Backend>,
        viewer: Viewer,
        toasts: ToastSink,
        config: &ClientConfig,
    ) -> Result<BridgeHandle, ClientError> {
        let me = viewer.require_user()?.id;

        // Subscribe before the initial fetch so nothing inserted in between
        // is missed. Duplicates are folded by id.
        let messages = backend
            .subscribe(ChangeFilter::new(Table::Messages, "receiver_id", me))
            .await?;
        let notifications = backend
            .subscribe(ChangeFilter::new(Table::Notifications, "user_id", me))
            .await?;

        let mut chat = ChatView::new(
            backend.clone(),
            viewer.clone(),
            toasts.clone(),
            config.synthesize_unknown_peers,
        );
        let mut feed = NotificationFeed::new(
            backend.clone(),
            viewer.clone(),
            toasts.clone(),
            config.notification_limit,
        );
        let mut badges = DashboardBadges::new(backend, viewer, toasts, config.upcoming_events_limit);
        chat.load().await;
        feed.load().await;
        badges.load().await;

        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let bridge = SyncBridge {
            chat,
            feed,
            badges,
            messages,
            notifications,
            commands: rx,
        };
        let task = tokio::spawn(bridge.run());
        info!(user = %me, "Sync bridge started");

        Ok(BridgeHandle { user: me, commands: tx, task })
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                event = self.messages.recv() => match event {
                    Some(event) => self.on_message_event(event).await,
                    None => {
                        warn!("Message change feed closed");
                        break;
                    }
                },
                event = self.notifications.recv() => match event {
                    Some(event) => self.on_notification_event(event).await,
                    None => {
                        warn!("Notification change feed closed");
                        break;
                    }
                },
                Some(receipt) = self.chat.next_receipt() => self.chat.apply_receipt(receipt),
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => {
                        debug!("Bridge handle dropped");
                        break;
                    }
                },
            }
        }
        info!("Sync bridge stopped");
    }

    async fn on_message_event(&mut self, event: ChangeEvent) {
        if !self.apply_message_event(event).await {
            return;
        }
        // A batched mark-read arrives as one update per row. Fold the ones
        // already queued into a single recount.
        let mut folded = 0usize;
        while let Some(event) = self.messages.try_recv() {
            self.apply_message_event(event).await;
            folded += 1;
        }
        if folded > 0 {
            debug!(folded, "Coalesced message updates");
        }
        self.badges.recount_messages().await;
    }

    /// Route one message event to the views. Returns true for read-state
    /// updates, which leave the unread badge to be recounted.
    async fn apply_message_event(&mut self, event: ChangeEvent) -> bool {
        let Some(message) = decode::<Message>(event.clone()) else {
            return false;
        };
        match event.kind {
            ChangeKind::Insert => {
                self.badges.on_message_insert(&message);
                self.chat.on_remote_insert(message).await;
                false
            }
            ChangeKind::Update => {
                self.chat.on_remote_update(message);
                true
            }
        }
    }

    async fn on_notification_event(&mut self, event: ChangeEvent) {
        let Some(notification) = decode::<Notification>(event.clone()) else {
            return;
        };
        match event.kind {
            ChangeKind::Insert => {
                self.badges.on_notification_insert(&notification);
                self.feed.on_remote_insert(notification);
            }
            ChangeKind::Update => {
                self.feed.on_remote_update(notification);
                self.badges.recount_notifications().await;
            }
        }
    }

    async fn on_command(&mut self, command: ChatCommand) {
        match command {
            ChatCommand::Open(peer) => self.chat.on_open_conversation(peer).await,
            ChatCommand::Send { peer, text, reply } => {
                let result = self.chat.on_send(peer, &text).await;
                let _ = reply.send(result);
            }
            ChatCommand::MarkAllNotificationsRead => self.feed.mark_all_read().await,
            ChatCommand::MarkNotificationRead(id) => self.feed.mark_read(id).await,
            ChatCommand::Reload => {
                self.chat.load().await;
                self.feed.load().await;
                self.badges.load().await;
            }
            ChatCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn snapshot(&self) -> BridgeSnapshot {
        BridgeSnapshot {
            conversations: self.chat.conversations().to_vec(),
            focused: self.chat.focused(),
            thread: self.chat.thread().to_vec(),
            notifications: self.feed.items().to_vec(),
            unread_notifications: self.feed.unread_count(),
            stats: self.badges.stats(),
            upcoming_events: self.badges.upcoming().to_vec(),
        }
    }
}

fn decode<T: DeserializeOwned>(event: ChangeEvent) -> Option<T> {
    match from_row(event.row) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(table = %event.table, error = %e, "Skipping malformed change event");
            None
        }
    }
}

/// UI side of a running bridge. Dropping it stops the task.
#[derive(Debug)]
pub struct BridgeHandle {
    user: UserId,
    commands: mpsc::Sender<ChatCommand>,
    task: JoinHandle<()>,
}

impl BridgeHandle {
    /// The user this bridge was started for.
    pub fn user(&self) -> UserId {
        self.user
    }

    async fn send_command(&self, command: ChatCommand) -> Result<(), ClientError> {
        self.commands.send(command).await.map_err(|_| ClientError::Closed)
    }

    pub async fn open(&self, peer: UserId) -> Result<(), ClientError> {
        self.send_command(ChatCommand::Open(peer)).await
    }

    /// Send a message and wait for the stored row.
    pub async fn send(&self, peer: UserId, text: impl Into<String>) -> Result<Message, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send_command(ChatCommand::Send {
            peer,
            text: text.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    pub async fn mark_all_notifications_read(&self) -> Result<(), ClientError> {
        self.send_command(ChatCommand::MarkAllNotificationsRead).await
    }

    pub async fn mark_notification_read(&self, id: Uuid) -> Result<(), ClientError> {
        self.send_command(ChatCommand::MarkNotificationRead(id)).await
    }

    pub async fn reload(&self) -> Result<(), ClientError> {
        self.send_command(ChatCommand::Reload).await
    }

    /// Current view state. Commands sent earlier are processed first.
    pub async fn snapshot(&self) -> Result<BridgeSnapshot, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send_command(ChatCommand::Snapshot(reply)).await?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(self) {
        let BridgeHandle { user, commands, task } = self;
        drop(commands);
        if let Err(e) = task.await {
            warn!(user = %user, error = %e, "Sync bridge task failed");
        }
    }
}
