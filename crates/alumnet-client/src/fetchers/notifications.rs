use std::collections::BTreeSet;

use tracing::{debug, warn};
use uuid::Uuid;

use alumnet_shared::models::{NewNotification, Notification};
use alumnet_shared::types::UserId;
use alumnet_store::{from_row, to_row, Backend, Filter, Order, Patch, Query, Table};

use super::rows_into;
use crate::error::ClientError;
use crate::session::Viewer;

fn unread_for(me: UserId) -> Filter {
    Filter::eq("user_id", me).and(Filter::eq("is_read", false))
}

/// The newest `limit` notifications of the viewer.
pub async fn recent_notifications(
    backend: &dyn Backend,
    viewer: &Viewer,
    limit: usize,
) -> Result<Vec<Notification>, ClientError> {
    let Viewer::Authenticated(me) = viewer else {
        return Ok(Vec::new());
    };
    let query = Query::from(Table::Notifications)
        .filter(Filter::eq("user_id", me.id))
        .order_by("created_at", Order::Desc)
        .limit(limit);
    rows_into(backend.select(&query).await?)
}

/// Ids of every unread notification of the viewer, not only the ones in
/// the popover.
pub async fn unread_ids(backend: &dyn Backend, viewer: &Viewer) -> Result<BTreeSet<Uuid>, ClientError> {
    let Viewer::Authenticated(me) = viewer else {
        return Ok(BTreeSet::new());
    };
    let rows: Vec<Notification> = rows_into(
        backend
            .select(&Query::from(Table::Notifications).filter(unread_for(me.id)))
            .await?,
    )?;
    Ok(rows.into_iter().map(|n| n.id).collect())
}

pub async fn unread_notification_count(backend: &dyn Backend, viewer: &Viewer) -> Result<u64, ClientError> {
    let Viewer::Authenticated(me) = viewer else {
        return Ok(0);
    };
    Ok(backend.count(Table::Notifications, Some(&unread_for(me.id))).await?)
}

/// Flag the given notifications read in one batched update. An empty set
/// makes no backend call. Returns the ids the backend reported as updated.
pub async fn mark_notifications_read(
    backend: &dyn Backend,
    viewer: &Viewer,
    ids: &BTreeSet<Uuid>,
) -> Result<BTreeSet<Uuid>, ClientError> {
    let me = viewer.require_user()?;
    if ids.is_empty() {
        return Ok(BTreeSet::new());
    }
    let filter = Filter::is_in("id", ids.iter()).and(Filter::eq("user_id", me.id));
    let updated: Vec<Notification> = rows_into(
        backend
            .update(Table::Notifications, &filter, &Patch::new().set("is_read", true))
            .await?,
    )?;
    debug!(requested = ids.len(), updated = updated.len(), "Notifications marked read");
    Ok(updated.into_iter().map(|n| n.id).collect())
}

/// Insert a notification for `user_id`. Anyone signed in may notify anyone.
pub async fn create_notification(
    backend: &dyn Backend,
    viewer: &Viewer,
    new: NewNotification,
) -> Result<Notification, ClientError> {
    viewer.require_user()?;
    let row = backend.insert(Table::Notifications, to_row(&new)?).await?;
    Ok(from_row(row)?)
}

/// Side-effect notification for another user. Failure is logged and does
/// not fail the action that triggered it.
pub(crate) async fn notify_best_effort(
    backend: &dyn Backend,
    user_id: UserId,
    kind: &str,
    content: String,
    link_to: Option<String>,
) {
    let new = NewNotification {
        user_id,
        kind: kind.to_string(),
        content,
        is_read: false,
        link_to,
    };
    let result = match to_row(&new) {
        Ok(row) => backend.insert(Table::Notifications, row).await.map(|_| ()),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!(user = %user_id, kind, "Failed to create notification: {}", e);
    }
}
