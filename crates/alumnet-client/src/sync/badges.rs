use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use alumnet_shared::models::{Event, Message, Notification};
use alumnet_store::Backend;

use crate::events::ToastSink;
use crate::fetchers::campus_events;
use crate::fetchers::dashboard::{dashboard_stats, DashboardStats};
use crate::fetchers::{messages, notifications};
use crate::session::Viewer;

/// Dashboard cards: headline counts and the next few events.
///
/// Inserts bump a counter locally. Read transitions are not tracked row by
/// row, so an update triggers a recount from the backend instead.
pub struct DashboardBadges {
    backend: Arc<dyn Backend>,
    viewer: Viewer,
    toasts: ToastSink,
    upcoming_limit: usize,
    stats: DashboardStats,
    upcoming: Vec<Event>,
}

impl DashboardBadges {
    pub fn new(backend: Arc<dyn Backend>, viewer: Viewer, toasts: ToastSink, upcoming_limit: usize) -> Self {
        Self {
            backend,
            viewer,
            toasts,
            upcoming_limit,
            stats: DashboardStats::default(),
            upcoming: Vec::new(),
        }
    }

    pub fn stats(&self) -> DashboardStats {
        self.stats
    }

    pub fn upcoming(&self) -> &[Event] {
        &self.upcoming
    }

    pub async fn load(&mut self) {
        let now = Utc::now();
        let backend = self.backend.as_ref();
        let fetched = futures::try_join!(
            dashboard_stats(backend, &self.viewer, now),
            campus_events::upcoming_events(backend, now, self.upcoming_limit),
        );
        match fetched {
            Ok((stats, upcoming)) => {
                self.stats = stats;
                self.upcoming = upcoming;
            }
            Err(e) => {
                warn!(error = %e, "Failed to load dashboard");
                self.toasts.error("Could not load dashboard", &e);
            }
        }
    }

    pub fn on_message_insert(&mut self, message: &Message) {
        if message.receiver_id == self.viewer.identity().id && !message.is_read() {
            self.stats.unread_messages += 1;
        }
    }

    pub fn on_notification_insert(&mut self, notification: &Notification) {
        if notification.user_id == self.viewer.identity().id && !notification.is_read() {
            self.stats.unread_notifications += 1;
        }
    }

    pub async fn recount_messages(&mut self) {
        match messages::unread_message_count(self.backend.as_ref(), &self.viewer).await {
            Ok(count) => self.stats.unread_messages = count,
            Err(e) => warn!(error = %e, "Failed to recount unread messages"),
        }
    }

    pub async fn recount_notifications(&mut self) {
        match notifications::unread_notification_count(self.backend.as_ref(), &self.viewer).await {
            Ok(count) => self.stats.unread_notifications = count,
            Err(e) => warn!(error = %e, "Failed to recount unread notifications"),
        }
    }
}
