//! Campus events. Listing is public; hosting and registering need a
//! signed-in member.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use alumnet_shared::error::ValidationError;
use alumnet_shared::models::{Event, EventAttendee, NewEvent};
use alumnet_shared::timefmt;
use alumnet_store::{from_row, to_row, Backend, Filter, Order, Query, Table};

use super::{first_into, rows_into};
use crate::error::ClientError;
use crate::session::Viewer;

/// What a host fills in when creating an event.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
}

/// Events starting at or after `now`, soonest first.
pub async fn upcoming_events(
    backend: &dyn Backend,
    now: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<Event>, ClientError> {
    let query = Query::from(Table::Events)
        .filter(Filter::gte("starts_at", timefmt::format(&now)))
        .order_by("starts_at", Order::Asc)
        .limit(limit);
    rows_into(backend.select(&query).await?)
}

pub async fn create_event(
    backend: &dyn Backend,
    viewer: &Viewer,
    draft: EventDraft,
    now: DateTime<Utc>,
) -> Result<Event, ClientError> {
    let me = viewer.require_user()?;
    if !me.role.can_host_events() {
        return Err(ValidationError::RoleNotAllowed(me.role).into());
    }
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(ValidationError::MissingField("title").into());
    }
    if draft.starts_at < now {
        return Err(ValidationError::Invalid("Event must start in the future".into()).into());
    }

    let new = NewEvent {
        title: title.to_string(),
        description: non_blank(draft.description),
        location: non_blank(draft.location),
        starts_at: draft.starts_at,
        organizer_id: me.id,
    };
    let event: Event = from_row(backend.insert(Table::Events, to_row(&new)?).await?)?;
    info!(id = %event.id, title = %event.title, "Event created");
    Ok(event)
}

/// Register the viewer for `event_id`. Registering twice returns the
/// existing registration.
pub async fn register_for_event(
    backend: &dyn Backend,
    viewer: &Viewer,
    event_id: Uuid,
) -> Result<EventAttendee, ClientError> {
    let me = viewer.require_user()?;

    let event = backend
        .select(&Query::from(Table::Events).filter(Filter::eq("id", event_id)).limit(1))
        .await?;
    if event.is_empty() {
        return Err(ClientError::NotFound(format!("event {event_id}")));
    }

    let mine = Filter::eq("event_id", event_id).and(Filter::eq("user_id", me.id));
    let existing = backend
        .select(&Query::from(Table::EventAttendees).filter(mine).limit(1))
        .await?;
    if let Some(attendee) = first_into(existing)? {
        return Ok(attendee);
    }

    let row = to_row(&json!({ "event_id": event_id, "user_id": me.id }))?;
    let attendee: EventAttendee = from_row(backend.insert(Table::EventAttendees, row).await?)?;
    info!(event = %event_id, "Registered for event");
    Ok(attendee)
}

pub async fn attendee_count(backend: &dyn Backend, event_id: Uuid) -> Result<u64, ClientError> {
    Ok(backend
        .count(Table::EventAttendees, Some(&Filter::eq("event_id", event_id)))
        .await?)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
