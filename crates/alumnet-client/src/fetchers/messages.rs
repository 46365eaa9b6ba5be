use std::collections::{BTreeMap, BTreeSet};

use futures::future::try_join_all;
use tracing::{debug, info};
use uuid::Uuid;

use alumnet_shared::constants::{KIND_MESSAGE, MAX_MESSAGE_CHARS};
use alumnet_shared::error::ValidationError;
use alumnet_shared::models::{Message, NewMessage};
use alumnet_shared::types::UserId;
use alumnet_store::{from_row, to_row, Backend, Filter, Order, Patch, Query, Table};

use super::connections::{self, ConnectedPeer};
use super::notifications::notify_best_effort;
use super::{first_into, rows_into};
use crate::error::ClientError;
use crate::events::preview;
use crate::session::Viewer;
use crate::sync::conversation::{sort_conversations, Conversation, PeerSummary};

/// Messages exchanged between `a` and `b` in either direction.
fn between(a: UserId, b: UserId) -> Filter {
    Filter::eq("sender_id", a)
        .and(Filter::eq("receiver_id", b))
        .or(Filter::eq("sender_id", b).and(Filter::eq("receiver_id", a)))
}

fn unread_from(peer: UserId, me: UserId) -> Filter {
    Filter::eq("sender_id", peer)
        .and(Filter::eq("receiver_id", me))
        .and(Filter::eq("read", false))
}

/// Trim and check a draft. Returns the text that will be stored.
pub fn validate_draft(text: &str) -> Result<&str, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    let len = trimmed.chars().count();
    if len > MAX_MESSAGE_CHARS {
        return Err(ValidationError::MessageTooLong {
            len,
            max: MAX_MESSAGE_CHARS,
        });
    }
    Ok(trimmed)
}

/// Full history with `peer`, oldest first.
pub async fn conversation_history(
    backend: &dyn Backend,
    viewer: &Viewer,
    peer: UserId,
) -> Result<Vec<Message>, ClientError> {
    let Viewer::Authenticated(me) = viewer else {
        return Ok(Vec::new());
    };
    let query = Query::from(Table::Messages)
        .filter(between(me.id, peer))
        .order_by("created_at", Order::Asc);
    rows_into(backend.select(&query).await?)
}

/// Persist a message to `peer` and return the stored row.
///
/// The draft is validated before anything is sent. The receiver gets a
/// `message` notification on a best-effort basis.
pub async fn send_message(
    backend: &dyn Backend,
    viewer: &Viewer,
    peer: UserId,
    text: &str,
) -> Result<Message, ClientError> {
    let me = viewer.require_user()?;
    let content = validate_draft(text)?;
    if peer == me.id {
        return Err(ValidationError::SelfTarget.into());
    }

    let new = NewMessage {
        sender_id: me.id,
        receiver_id: peer,
        content: content.to_string(),
        read: false,
    };
    let message: Message = from_row(backend.insert(Table::Messages, to_row(&new)?).await?)?;
    debug!(id = %message.id, to = %peer, "Message sent");

    notify_best_effort(
        backend,
        peer,
        KIND_MESSAGE,
        format!("{}: {}", me.display_name, preview(content, 80)),
        Some(format!("/messages/{}", me.id)),
    )
    .await;
    Ok(message)
}

/// Flag messages addressed to the viewer as read, in one batched update.
/// An empty set makes no backend call. Returns the ids the backend reported
/// as updated.
pub async fn mark_read(
    backend: &dyn Backend,
    viewer: &Viewer,
    ids: &BTreeSet<Uuid>,
) -> Result<BTreeSet<Uuid>, ClientError> {
    let me = viewer.require_user()?;
    if ids.is_empty() {
        return Ok(BTreeSet::new());
    }
    let filter = Filter::is_in("id", ids.iter()).and(Filter::eq("receiver_id", me.id));
    let updated: Vec<Message> = rows_into(
        backend
            .update(Table::Messages, &filter, &Patch::new().set("read", true))
            .await?,
    )?;
    debug!(requested = ids.len(), updated = updated.len(), "Messages marked read");
    Ok(updated.into_iter().map(|m| m.id).collect())
}

/// Ids of unread messages `peer` sent to the viewer.
pub async fn unread_ids_from(
    backend: &dyn Backend,
    viewer: &Viewer,
    peer: UserId,
) -> Result<BTreeSet<Uuid>, ClientError> {
    let Viewer::Authenticated(me) = viewer else {
        return Ok(BTreeSet::new());
    };
    let rows: Vec<Message> = rows_into(
        backend
            .select(&Query::from(Table::Messages).filter(unread_from(peer, me.id)))
            .await?,
    )?;
    Ok(rows.into_iter().map(|m| m.id).collect())
}

pub async fn unread_count_from(backend: &dyn Backend, viewer: &Viewer, peer: UserId) -> Result<u64, ClientError> {
    let Viewer::Authenticated(me) = viewer else {
        return Ok(0);
    };
    Ok(backend.count(Table::Messages, Some(&unread_from(peer, me.id))).await?)
}

/// All unread messages addressed to the viewer, grouped by sender.
pub async fn unread_by_sender(
    backend: &dyn Backend,
    viewer: &Viewer,
) -> Result<BTreeMap<UserId, BTreeSet<Uuid>>, ClientError> {
    let Viewer::Authenticated(me) = viewer else {
        return Ok(BTreeMap::new());
    };
    let filter = Filter::eq("receiver_id", me.id).and(Filter::eq("read", false));
    let rows: Vec<Message> = rows_into(backend.select(&Query::from(Table::Messages).filter(filter)).await?)?;

    let mut grouped: BTreeMap<UserId, BTreeSet<Uuid>> = BTreeMap::new();
    for message in rows {
        grouped.entry(message.sender_id).or_default().insert(message.id);
    }
    Ok(grouped)
}

pub async fn unread_message_count(backend: &dyn Backend, viewer: &Viewer) -> Result<u64, ClientError> {
    let Viewer::Authenticated(me) = viewer else {
        return Ok(0);
    };
    let filter = Filter::eq("receiver_id", me.id).and(Filter::eq("read", false));
    Ok(backend.count(Table::Messages, Some(&filter)).await?)
}

/// The most recent message exchanged with `peer`, if any.
pub async fn last_message_with(
    backend: &dyn Backend,
    viewer: &Viewer,
    peer: UserId,
) -> Result<Option<Message>, ClientError> {
    let Viewer::Authenticated(me) = viewer else {
        return Ok(None);
    };
    let query = Query::from(Table::Messages)
        .filter(between(me.id, peer))
        .order_by("created_at", Order::Desc)
        .limit(1);
    first_into(backend.select(&query).await?)
}

/// One conversation per accepted connection with its preview and unread
/// set, most recent activity first.
pub async fn list_conversations(backend: &dyn Backend, viewer: &Viewer) -> Result<Vec<Conversation>, ClientError> {
    let peers = connections::list_connections(backend, viewer).await?;
    let mut unread = unread_by_sender(backend, viewer).await?;

    let previews = try_join_all(
        peers
            .iter()
            .map(|peer| last_message_with(backend, viewer, peer.profile.id)),
    )
    .await?;

    let mut conversations: Vec<Conversation> = peers
        .into_iter()
        .zip(previews)
        .map(|(ConnectedPeer { profile, .. }, last)| {
            let unread = unread.remove(&profile.id).unwrap_or_default();
            Conversation::new(PeerSummary::from(profile), last.as_ref(), unread)
        })
        .collect();
    sort_conversations(&mut conversations);

    info!(count = conversations.len(), "Conversations loaded");
    Ok(conversations)
}
