//! Domain records as stored by the backend.
//!
//! Every struct derives `Serialize` and `Deserialize` so rows returned by
//! the backend can be mapped straight into them. The `New*` structs are the
//! caller-supplied part of an insert; the backend adds `id` and `created_at`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timefmt;
use crate::types::{Role, UserId};

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: UserId,
    pub display_name: String,
    pub role: Role,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub graduation_year: Option<i32>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(with = "timefmt")]
    pub created_at: DateTime<Utc>,
}

/// Editable profile fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graduation_year: Option<i32>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.headline.is_none()
            && self.bio.is_none()
            && self.department.is_none()
            && self.graduation_year.is_none()
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Accepted => "accepted",
            ConnectionStatus::Rejected => "rejected",
        }
    }
}

/// A connection between two users. The requester is the side that asked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Connection {
    pub id: Uuid,
    pub requester_id: UserId,
    pub addressee_id: UserId,
    pub status: ConnectionStatus,
    #[serde(with = "timefmt")]
    pub created_at: DateTime<Utc>,
}

impl Connection {
    /// The other side of the connection as seen from `me`.
    pub fn peer_of(&self, me: UserId) -> UserId {
        if self.requester_id == me {
            self.addressee_id
        } else {
            self.requester_id
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewConnection {
    pub requester_id: UserId,
    pub addressee_id: UserId,
    pub status: ConnectionStatus,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A direct message. Immutable once created except for the read flag, which
/// only ever goes from unread to read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    #[serde(with = "timefmt")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    read: bool,
}

impl Message {
    pub fn is_read(&self) -> bool {
        self.read
    }

    pub fn mark_read(&mut self) {
        self.read = true;
    }

    /// Fold a newer copy of the same row into this one. Only the read flag
    /// can change, and only towards read.
    pub fn absorb(&mut self, newer: &Message) {
        if newer.id == self.id && newer.read {
            self.read = true;
        }
    }

    /// The other participant as seen from `me`.
    pub fn peer_of(&self, me: UserId) -> UserId {
        if self.sender_id == me {
            self.receiver_id
        } else {
            self.sender_id
        }
    }

    /// Whether this message is an unread message sent by `peer` to `me`.
    pub fn is_unread_from(&self, peer: UserId, me: UserId) -> bool {
        !self.read && self.sender_id == peer && self.receiver_id == me
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub read: bool,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// An entry in a user's notification feed. `kind` is an open tag such as
/// `"message"` or `"mentorship_request"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: UserId,
    pub kind: String,
    pub content: String,
    #[serde(default)]
    is_read: bool,
    #[serde(default)]
    pub link_to: Option<String>,
    #[serde(with = "timefmt")]
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_read(&self) -> bool {
        self.is_read
    }

    pub fn mark_read(&mut self) {
        self.is_read = true;
    }

    pub fn absorb(&mut self, newer: &Notification) {
        if newer.id == self.id && newer.is_read {
            self.is_read = true;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewNotification {
    pub user_id: UserId,
    pub kind: String,
    pub content: String,
    pub is_read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_to: Option<String>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(with = "timefmt")]
    pub starts_at: DateTime<Utc>,
    pub organizer_id: UserId,
    #[serde(with = "timefmt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(with = "timefmt")]
    pub starts_at: DateTime<Utc>,
    pub organizer_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventAttendee {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: UserId,
    #[serde(with = "timefmt")]
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Mentorship
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MentorshipStatus {
    Pending,
    Accepted,
    Declined,
}

impl MentorshipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MentorshipStatus::Pending => "pending",
            MentorshipStatus::Accepted => "accepted",
            MentorshipStatus::Declined => "declined",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mentorship {
    pub id: Uuid,
    pub mentor_id: UserId,
    pub mentee_id: UserId,
    pub status: MentorshipStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(with = "timefmt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMentorship {
    pub mentor_id: UserId,
    pub mentee_id: UserId,
    pub status: MentorshipStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message_json(read: bool) -> serde_json::Value {
        json!({
            "id": "6f1c1b0e-0000-4000-8000-000000000001",
            "sender_id": "6f1c1b0e-0000-4000-8000-0000000000aa",
            "receiver_id": "6f1c1b0e-0000-4000-8000-0000000000bb",
            "content": "hi",
            "created_at": "2024-05-01T10:00:00.000000Z",
            "read": read,
        })
    }

    #[test]
    fn read_flag_only_moves_forward() {
        let mut msg: Message = serde_json::from_value(message_json(true)).unwrap();
        let stale: Message = serde_json::from_value(message_json(false)).unwrap();
        msg.absorb(&stale);
        assert!(msg.is_read());

        let mut unread = stale.clone();
        unread.absorb(&msg);
        assert!(unread.is_read());
    }

    #[test]
    fn peer_is_the_other_side() {
        let msg: Message = serde_json::from_value(message_json(false)).unwrap();
        assert_eq!(msg.peer_of(msg.sender_id), msg.receiver_id);
        assert_eq!(msg.peer_of(msg.receiver_id), msg.sender_id);
        assert!(msg.is_unread_from(msg.sender_id, msg.receiver_id));
        assert!(!msg.is_unread_from(msg.receiver_id, msg.sender_id));
    }

    #[test]
    fn notification_defaults_missing_optionals() {
        let n: Notification = serde_json::from_value(json!({
            "id": "6f1c1b0e-0000-4000-8000-000000000002",
            "user_id": "6f1c1b0e-0000-4000-8000-0000000000bb",
            "kind": "event",
            "content": "Homecoming is tomorrow",
            "created_at": "2024-05-01T10:00:00.000000Z",
        }))
        .unwrap();
        assert!(!n.is_read());
        assert!(n.link_to.is_none());
    }

    #[test]
    fn empty_profile_update_is_detected() {
        assert!(ProfileUpdate::default().is_empty());
        let update = ProfileUpdate {
            bio: Some("Class of '09".into()),
            ..Default::default()
        };
        assert!(!update.is_empty());
        let v = serde_json::to_value(&update).unwrap();
        assert_eq!(v, json!({ "bio": "Class of '09" }));
    }
}
