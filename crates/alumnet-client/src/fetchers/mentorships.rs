use tracing::info;
use uuid::Uuid;

use alumnet_shared::constants::{KIND_MENTORSHIP_REQUEST, KIND_MENTORSHIP_RESPONSE};
use alumnet_shared::error::ValidationError;
use alumnet_shared::models::{Mentorship, MentorshipStatus, NewMentorship};
use alumnet_shared::types::UserId;
use alumnet_store::{from_row, to_row, Backend, Filter, Order, Patch, Query, Table};

use super::notifications::notify_best_effort;
use super::{first_into, profiles, rows_into};
use crate::error::ClientError;
use crate::session::Viewer;

/// Ask `mentor` for mentorship. The mentor must exist and be alumni or
/// faculty, and only one pending request per pair is allowed.
pub async fn request_mentorship(
    backend: &dyn Backend,
    viewer: &Viewer,
    mentor: UserId,
    message: Option<String>,
) -> Result<Mentorship, ClientError> {
    let me = viewer.require_user()?;
    if mentor == me.id {
        return Err(ValidationError::SelfTarget.into());
    }

    let profile = profiles::get_profile(backend, mentor)
        .await?
        .ok_or_else(|| ClientError::NotFound(format!("mentor {mentor}")))?;
    if !profile.role.can_mentor() {
        return Err(ValidationError::RoleNotAllowed(profile.role).into());
    }

    let pending = Filter::eq("mentor_id", mentor)
        .and(Filter::eq("mentee_id", me.id))
        .and(Filter::eq("status", MentorshipStatus::Pending));
    if backend.count(Table::Mentorships, Some(&pending)).await? > 0 {
        return Err(ValidationError::Invalid("A mentorship request is already pending".into()).into());
    }

    let new = NewMentorship {
        mentor_id: mentor,
        mentee_id: me.id,
        status: MentorshipStatus::Pending,
        message: message.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()),
    };
    let mentorship: Mentorship = from_row(backend.insert(Table::Mentorships, to_row(&new)?).await?)?;
    info!(mentor = %mentor, "Mentorship requested");

    notify_best_effort(
        backend,
        mentor,
        KIND_MENTORSHIP_REQUEST,
        format!("{} asked you to be their mentor", me.display_name),
        Some("/mentorship".to_string()),
    )
    .await;
    Ok(mentorship)
}

/// Accept or decline a pending request where the viewer is the mentor.
pub async fn respond_to_mentorship(
    backend: &dyn Backend,
    viewer: &Viewer,
    mentorship_id: Uuid,
    accept: bool,
) -> Result<Mentorship, ClientError> {
    let me = viewer.require_user()?;
    let status = if accept {
        MentorshipStatus::Accepted
    } else {
        MentorshipStatus::Declined
    };

    let filter = Filter::eq("id", mentorship_id)
        .and(Filter::eq("mentor_id", me.id))
        .and(Filter::eq("status", MentorshipStatus::Pending));
    let updated = backend
        .update(Table::Mentorships, &filter, &Patch::new().set("status", status))
        .await?;
    let mentorship: Mentorship = first_into(updated)?
        .ok_or_else(|| ClientError::NotFound(format!("pending mentorship {mentorship_id}")))?;

    notify_best_effort(
        backend,
        mentorship.mentee_id,
        KIND_MENTORSHIP_RESPONSE,
        format!("{} {} your mentorship request", me.display_name, status.as_str()),
        Some("/mentorship".to_string()),
    )
    .await;
    Ok(mentorship)
}

/// Mentorships where the viewer is either side, newest first.
pub async fn mentorships_for(backend: &dyn Backend, viewer: &Viewer) -> Result<Vec<Mentorship>, ClientError> {
    let Viewer::Authenticated(me) = viewer else {
        return Ok(Vec::new());
    };
    let query = Query::from(Table::Mentorships)
        .filter(Filter::eq("mentor_id", me.id).or(Filter::eq("mentee_id", me.id)))
        .order_by("created_at", Order::Desc);
    rows_into(backend.select(&query).await?)
}

/// Pending requests waiting on the viewer as mentor.
pub async fn pending_mentorship_count(backend: &dyn Backend, viewer: &Viewer) -> Result<u64, ClientError> {
    let Viewer::Authenticated(me) = viewer else {
        return Ok(0);
    };
    let filter = Filter::eq("mentor_id", me.id).and(Filter::eq("status", MentorshipStatus::Pending));
    Ok(backend.count(Table::Mentorships, Some(&filter)).await?)
}
