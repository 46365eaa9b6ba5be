/// Application name
pub const APP_NAME: &str = "Alumnet";

/// Number of notifications shown in the popover feed
pub const NOTIFICATION_POPOVER_LIMIT: usize = 10;

/// Number of upcoming events shown on the dashboard
pub const UPCOMING_EVENTS_LIMIT: usize = 5;

/// Maximum chat message length in characters
pub const MAX_MESSAGE_CHARS: usize = 4_000;

/// Display name of a synthesized guest identity
pub const GUEST_DISPLAY_NAME: &str = "Guest";

/// Sender label used in alerts when the sender is not a known connection
pub const UNKNOWN_SENDER: &str = "Someone";

/// Storage buckets
pub const AVATAR_BUCKET: &str = "avatars";
pub const COVER_BUCKET: &str = "covers";

/// Maximum upload size in bytes (5 MiB)
pub const MAX_UPLOAD_SIZE: usize = 5 * 1024 * 1024;

/// Lifetime of an auth session in seconds
pub const SESSION_TTL_SECS: i64 = 3_600;

/// Default HTTP port of the storage server
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Notification kinds emitted by the fetchers
pub const KIND_MESSAGE: &str = "message";
pub const KIND_CONNECTION_REQUEST: &str = "connection_request";
pub const KIND_CONNECTION_ACCEPTED: &str = "connection_accepted";
pub const KIND_MENTORSHIP_REQUEST: &str = "mentorship_request";
pub const KIND_MENTORSHIP_RESPONSE: &str = "mentorship_response";
pub const KIND_EVENT: &str = "event";
