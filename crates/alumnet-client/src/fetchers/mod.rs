//! Per-feature data access.
//!
//! Each function takes the backend and, when the data is owner-scoped, the
//! [`Viewer`](crate::session::Viewer). Guests get empty results for reads
//! and a `NotAuthenticated` validation error for writes; neither reaches the
//! backend.

pub mod campus_events;
pub mod connections;
pub mod dashboard;
pub mod mentorships;
pub mod messages;
pub mod notifications;
pub mod profiles;

use serde::de::DeserializeOwned;

use alumnet_store::{from_row, Row};

use crate::error::ClientError;

pub(crate) fn rows_into<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, ClientError> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(from_row(row)?);
    }
    Ok(out)
}

pub(crate) fn first_into<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Option<T>, ClientError> {
    match rows.into_iter().next() {
        Some(row) => Ok(Some(from_row(row)?)),
        None => Ok(None),
    }
}
