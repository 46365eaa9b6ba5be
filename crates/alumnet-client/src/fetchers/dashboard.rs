use chrono::{DateTime, Utc};
use serde::Serialize;

use alumnet_shared::models::ConnectionStatus;
use alumnet_shared::timefmt;
use alumnet_store::{Backend, Filter, Table};

use super::{mentorships, messages, notifications};
use crate::error::ClientError;
use crate::session::Viewer;

/// Headline numbers for the dashboard cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub connections: u64,
    pub unread_messages: u64,
    pub unread_notifications: u64,
    pub upcoming_events: u64,
    pub pending_mentorships: u64,
}

/// Counts for the viewer. Guests only see the public event count.
pub async fn dashboard_stats(
    backend: &dyn Backend,
    viewer: &Viewer,
    now: DateTime<Utc>,
) -> Result<DashboardStats, ClientError> {
    let upcoming = Filter::gte("starts_at", timefmt::format(&now));
    let upcoming_events = backend.count(Table::Events, Some(&upcoming)).await?;

    let Viewer::Authenticated(me) = viewer else {
        return Ok(DashboardStats {
            upcoming_events,
            ..Default::default()
        });
    };

    let accepted = Filter::eq("requester_id", me.id)
        .or(Filter::eq("addressee_id", me.id))
        .and(Filter::eq("status", ConnectionStatus::Accepted));
    let (connections, unread_messages, unread_notifications, pending_mentorships) = futures::try_join!(
        async {
            backend
                .count(Table::Connections, Some(&accepted))
                .await
                .map_err(ClientError::from)
        },
        messages::unread_message_count(backend, viewer),
        notifications::unread_notification_count(backend, viewer),
        mentorships::pending_mentorship_count(backend, viewer),
    )?;

    Ok(DashboardStats {
        connections,
        unread_messages,
        unread_notifications,
        upcoming_events,
        pending_mentorships,
    })
}
