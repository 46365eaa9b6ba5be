use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use alumnet_shared::constants::KIND_MESSAGE;
use alumnet_shared::models::Notification;
use alumnet_store::Backend;

use crate::events::{preview, ToastSink};
use crate::fetchers::notifications as fetch;
use crate::session::Viewer;

/// The notification popover: newest `limit` entries plus the set of every
/// unread notification id, which drives the badge.
pub struct NotificationFeed {
    backend: Arc<dyn Backend>,
    viewer: Viewer,
    toasts: ToastSink,
    limit: usize,
    items: Vec<Notification>,
    unread: BTreeSet<Uuid>,
}

impl NotificationFeed {
    pub fn new(backend: Arc<dyn Backend>, viewer: Viewer, toasts: ToastSink, limit: usize) -> Self {
        Self {
            backend,
            viewer,
            toasts,
            limit,
            items: Vec::new(),
            unread: BTreeSet::new(),
        }
    }

    /// Newest first.
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn unread_count(&self) -> usize {
        self.unread.len()
    }

    pub async fn load(&mut self) {
        let backend = self.backend.as_ref();
        let fetched = futures::try_join!(
            fetch::recent_notifications(backend, &self.viewer, self.limit),
            fetch::unread_ids(backend, &self.viewer),
        );
        match fetched {
            Ok((items, unread)) => {
                self.items = items;
                self.unread = unread;
            }
            Err(e) => {
                warn!(error = %e, "Failed to load notifications");
                self.toasts.error("Could not load notifications", &e);
            }
        }
    }

    pub fn on_remote_insert(&mut self, notification: Notification) {
        if notification.user_id != self.viewer.identity().id {
            return;
        }
        if self.items.iter().any(|n| n.id == notification.id) {
            self.on_remote_update(notification);
            return;
        }

        if !notification.is_read() {
            self.unread.insert(notification.id);
        }
        // Message notifications are already announced by the chat view.
        if notification.kind != KIND_MESSAGE {
            self.toasts.info("New notification", preview(&notification.content, 80));
        }

        let at = self
            .items
            .partition_point(|n| n.created_at > notification.created_at);
        self.items.insert(at, notification);
        self.items.truncate(self.limit);
    }

    pub fn on_remote_update(&mut self, notification: Notification) {
        if let Some(existing) = self.items.iter_mut().find(|n| n.id == notification.id) {
            existing.absorb(&notification);
        }
        if notification.is_read() {
            self.unread.remove(&notification.id);
        }
    }

    /// Mark every currently unread notification read. The counter clears
    /// only after the backend accepted the update. Calling it again with
    /// nothing unread makes no backend call.
    pub async fn mark_all_read(&mut self) {
        let ids = self.unread.clone();
        self.mark_ids(ids).await;
    }

    pub async fn mark_read(&mut self, id: Uuid) {
        if self.unread.contains(&id) {
            self.mark_ids(BTreeSet::from([id])).await;
        }
    }

    async fn mark_ids(&mut self, ids: BTreeSet<Uuid>) {
        if ids.is_empty() {
            debug!("No unread notifications");
            return;
        }
        match fetch::mark_notifications_read(self.backend.as_ref(), &self.viewer, &ids).await {
            Ok(_) => {
                for id in &ids {
                    self.unread.remove(id);
                }
                for item in self.items.iter_mut().filter(|n| ids.contains(&n.id)) {
                    item.mark_read();
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to mark notifications read");
                self.toasts.error("Could not mark notifications as read", &e);
            }
        }
    }
}
