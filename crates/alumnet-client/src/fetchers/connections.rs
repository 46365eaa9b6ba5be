use std::collections::HashMap;

use tracing::{debug, info};
use uuid::Uuid;

use alumnet_shared::constants::{KIND_CONNECTION_ACCEPTED, KIND_CONNECTION_REQUEST};
use alumnet_shared::error::ValidationError;
use alumnet_shared::models::{Connection, ConnectionStatus, NewConnection, Profile};
use alumnet_shared::types::UserId;
use alumnet_store::{to_row, Backend, Filter, Order, Patch, Query, Table};

use super::notifications::notify_best_effort;
use super::{first_into, profiles, rows_into};
use crate::error::ClientError;
use crate::session::Viewer;

/// An accepted connection together with the other side's profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedPeer {
    pub connection: Connection,
    pub profile: Profile,
}

/// A pending request addressed to the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub connection: Connection,
    pub requester: Option<Profile>,
}

fn involving(me: UserId) -> Filter {
    Filter::eq("requester_id", me).or(Filter::eq("addressee_id", me))
}

/// Accepted connections of the viewer, newest first. Connections whose peer
/// profile is gone are skipped.
pub async fn list_connections(
    backend: &dyn Backend,
    viewer: &Viewer,
) -> Result<Vec<ConnectedPeer>, ClientError> {
    let Viewer::Authenticated(me) = viewer else {
        return Ok(Vec::new());
    };

    let query = Query::from(Table::Connections)
        .filter(involving(me.id))
        .filter(Filter::eq("status", ConnectionStatus::Accepted))
        .order_by("created_at", Order::Desc);
    let connections: Vec<Connection> = rows_into(backend.select(&query).await?)?;

    let peer_ids: Vec<UserId> = connections.iter().map(|c| c.peer_of(me.id)).collect();
    let mut by_id: HashMap<UserId, Profile> = profiles::get_profiles(backend, &peer_ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut peers = Vec::with_capacity(connections.len());
    for connection in connections {
        let peer = connection.peer_of(me.id);
        match by_id.remove(&peer) {
            Some(profile) => peers.push(ConnectedPeer { connection, profile }),
            None => debug!(peer = %peer, "Connection without a profile skipped"),
        }
    }
    Ok(peers)
}

/// Requests waiting for the viewer's answer, newest first.
pub async fn pending_requests(
    backend: &dyn Backend,
    viewer: &Viewer,
) -> Result<Vec<PendingRequest>, ClientError> {
    let Viewer::Authenticated(me) = viewer else {
        return Ok(Vec::new());
    };

    let query = Query::from(Table::Connections)
        .filter(Filter::eq("addressee_id", me.id))
        .filter(Filter::eq("status", ConnectionStatus::Pending))
        .order_by("created_at", Order::Desc);
    let connections: Vec<Connection> = rows_into(backend.select(&query).await?)?;

    let requester_ids: Vec<UserId> = connections.iter().map(|c| c.requester_id).collect();
    let mut by_id: HashMap<UserId, Profile> = profiles::get_profiles(backend, &requester_ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    Ok(connections
        .into_iter()
        .map(|connection| {
            let requester = by_id.remove(&connection.requester_id);
            PendingRequest { connection, requester }
        })
        .collect())
}

/// The connection between the viewer and `peer` in either direction. A
/// pending or accepted row wins over rejected ones; among equals the newest
/// is returned.
pub async fn connection_with(
    backend: &dyn Backend,
    viewer: &Viewer,
    peer: UserId,
) -> Result<Option<Connection>, ClientError> {
    let Viewer::Authenticated(me) = viewer else {
        return Ok(None);
    };
    let filter = Filter::eq("requester_id", me.id)
        .and(Filter::eq("addressee_id", peer))
        .or(Filter::eq("requester_id", peer).and(Filter::eq("addressee_id", me.id)));
    let query = Query::from(Table::Connections)
        .filter(filter)
        .order_by("created_at", Order::Desc);
    let mut rows: Vec<Connection> = rows_into(backend.select(&query).await?)?;

    match rows.iter().position(|c| c.status != ConnectionStatus::Rejected) {
        Some(live) => Ok(Some(rows.swap_remove(live))),
        None => Ok(rows.into_iter().next()),
    }
}

/// Ask `addressee` to connect. A rejected request may be sent again; any
/// other existing row between the two users is a duplicate.
pub async fn send_request(
    backend: &dyn Backend,
    viewer: &Viewer,
    addressee: UserId,
) -> Result<Connection, ClientError> {
    let me = viewer.require_user()?;
    if addressee == me.id {
        return Err(ValidationError::SelfTarget.into());
    }
    if let Some(existing) = connection_with(backend, viewer, addressee).await? {
        if existing.status != ConnectionStatus::Rejected {
            return Err(ValidationError::Invalid(format!(
                "A {} connection already exists",
                existing.status.as_str()
            ))
            .into());
        }
    }
    if profiles::get_profile(backend, addressee).await?.is_none() {
        return Err(ClientError::NotFound(format!("profile {addressee}")));
    }

    let new = NewConnection {
        requester_id: me.id,
        addressee_id: addressee,
        status: ConnectionStatus::Pending,
    };
    let connection: Connection = alumnet_store::from_row(
        backend.insert(Table::Connections, to_row(&new)?).await?,
    )?;
    info!(to = %addressee, "Connection request sent");

    notify_best_effort(
        backend,
        addressee,
        KIND_CONNECTION_REQUEST,
        format!("{} wants to connect", me.display_name),
        Some("/network".to_string()),
    )
    .await;
    Ok(connection)
}

/// Accept or reject a pending request addressed to the viewer.
pub async fn respond_to_request(
    backend: &dyn Backend,
    viewer: &Viewer,
    connection_id: Uuid,
    accept: bool,
) -> Result<Connection, ClientError> {
    let me = viewer.require_user()?;
    let status = if accept {
        ConnectionStatus::Accepted
    } else {
        ConnectionStatus::Rejected
    };

    let filter = Filter::eq("id", connection_id)
        .and(Filter::eq("addressee_id", me.id))
        .and(Filter::eq("status", ConnectionStatus::Pending));
    let updated = backend
        .update(Table::Connections, &filter, &Patch::new().set("status", status))
        .await?;
    let connection: Connection = first_into(updated)?
        .ok_or_else(|| ClientError::NotFound(format!("pending request {connection_id}")))?;
    info!(id = %connection_id, status = status.as_str(), "Connection request answered");

    if accept {
        notify_best_effort(
            backend,
            connection.requester_id,
            KIND_CONNECTION_ACCEPTED,
            format!("{} accepted your connection request", me.display_name),
            Some("/network".to_string()),
        )
        .await;
    }
    Ok(connection)
}
