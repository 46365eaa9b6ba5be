use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use alumnet_shared::constants::{AVATAR_BUCKET, COVER_BUCKET};
use alumnet_shared::error::ValidationError;
use alumnet_shared::models::{Profile, ProfileUpdate};
use alumnet_shared::types::{Identity, Role, UserId};
use alumnet_store::{Backend, Filter, Order, Patch, Query, Table};

use super::{first_into, rows_into};
use crate::error::ClientError;
use crate::session::Viewer;

pub async fn get_profile(backend: &dyn Backend, id: UserId) -> Result<Option<Profile>, ClientError> {
    let rows = backend
        .select(&Query::from(Table::Profiles).filter(Filter::eq("id", id)).limit(1))
        .await?;
    first_into(rows)
}

/// Profiles for a set of ids, in no particular order. Missing ids are
/// simply absent.
pub async fn get_profiles(backend: &dyn Backend, ids: &[UserId]) -> Result<Vec<Profile>, ClientError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = backend
        .select(&Query::from(Table::Profiles).filter(Filter::is_in("id", ids.iter())))
        .await?;
    rows_into(rows)
}

/// The identity behind an authenticated session.
pub async fn load_identity(backend: &dyn Backend, id: UserId) -> Result<Identity, ClientError> {
    let profile = get_profile(backend, id)
        .await?
        .ok_or_else(|| ClientError::NotFound(format!("profile {id}")))?;
    Ok(Identity {
        id: profile.id,
        display_name: profile.display_name,
        role: profile.role,
    })
}

/// Member directory, newest first, optionally narrowed to one role. The
/// viewer is left out.
pub async fn directory(
    backend: &dyn Backend,
    viewer: &Viewer,
    role: Option<Role>,
) -> Result<Vec<Profile>, ClientError> {
    let mut query = Query::from(Table::Profiles).order_by("created_at", Order::Desc);
    if let Some(role) = role {
        query = query.filter(Filter::eq("role", role));
    }
    let me = viewer.identity().id;
    let profiles: Vec<Profile> = rows_into(backend.select(&query).await?)?;
    Ok(profiles.into_iter().filter(|p| p.id != me).collect())
}

pub async fn update_profile(
    backend: &dyn Backend,
    viewer: &Viewer,
    update: ProfileUpdate,
) -> Result<Profile, ClientError> {
    let me = viewer.require_user()?;
    if update.is_empty() {
        return Err(ValidationError::Invalid("Nothing to update".into()).into());
    }
    if let Some(name) = &update.display_name {
        if name.trim().is_empty() {
            return Err(ValidationError::MissingField("display_name").into());
        }
    }

    patch_own_profile(backend, me.id, &Patch::from_struct(&update)?).await
}

/// Upload a new avatar image and point the profile at it.
pub async fn upload_avatar(
    backend: &dyn Backend,
    viewer: &Viewer,
    file_name: &str,
    data: Bytes,
) -> Result<Profile, ClientError> {
    upload_image(backend, viewer, AVATAR_BUCKET, "avatar_url", file_name, data).await
}

/// Upload a new cover image and point the profile at it.
pub async fn upload_cover(
    backend: &dyn Backend,
    viewer: &Viewer,
    file_name: &str,
    data: Bytes,
) -> Result<Profile, ClientError> {
    upload_image(backend, viewer, COVER_BUCKET, "cover_url", file_name, data).await
}

async fn upload_image(
    backend: &dyn Backend,
    viewer: &Viewer,
    bucket: &str,
    column: &str,
    file_name: &str,
    data: Bytes,
) -> Result<Profile, ClientError> {
    let me = viewer.require_user()?;
    if data.is_empty() {
        return Err(ValidationError::MissingField("file").into());
    }

    let path = format!("{}/{}.{}", me.id, Uuid::new_v4().simple(), image_extension(file_name));
    let url = backend.upload(bucket, &path, data).await?;
    info!(bucket, path = %path, "Profile image uploaded");

    patch_own_profile(backend, me.id, &Patch::new().set(column, url)).await
}

async fn patch_own_profile(backend: &dyn Backend, me: UserId, patch: &Patch) -> Result<Profile, ClientError> {
    let updated = backend
        .update(Table::Profiles, &Filter::eq("id", me), patch)
        .await?;
    first_into(updated)?.ok_or_else(|| ClientError::NotFound(format!("profile {me}")))
}

/// Lowercased extension of `file_name` when it is a plain short token,
/// `bin` otherwise.
fn image_extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}
