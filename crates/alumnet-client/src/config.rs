//! Client configuration loaded from environment variables.

use alumnet_shared::constants::{NOTIFICATION_POPOVER_LIMIT, UPCOMING_EVENTS_LIMIT};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Notifications kept in the popover feed.
    /// Env: `ALUMNET_NOTIFICATION_LIMIT`
    /// Default: `10`
    pub notification_limit: usize,

    /// Whether a pushed message from a peer missing from the conversation
    /// list creates a new conversation entry. When off, the event only
    /// raises an alert.
    /// Env: `ALUMNET_SYNTHESIZE_UNKNOWN_PEERS` (true/false)
    /// Default: `false`
    pub synthesize_unknown_peers: bool,

    /// Upcoming events counted on the dashboard.
    /// Env: `ALUMNET_UPCOMING_EVENTS_LIMIT`
    /// Default: `5`
    pub upcoming_events_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            notification_limit: NOTIFICATION_POPOVER_LIMIT,
            synthesize_unknown_peers: false,
            upcoming_events_limit: UPCOMING_EVENTS_LIMIT,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ALUMNET_NOTIFICATION_LIMIT") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.notification_limit = n,
                _ => tracing::warn!(value = %val, "Invalid ALUMNET_NOTIFICATION_LIMIT, using default"),
            }
        }

        if let Ok(val) = std::env::var("ALUMNET_SYNTHESIZE_UNKNOWN_PEERS") {
            config.synthesize_unknown_peers = val == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("ALUMNET_UPCOMING_EVENTS_LIMIT") {
            match val.parse::<usize>() {
                Ok(n) => config.upcoming_events_limit = n,
                Err(_) => tracing::warn!(value = %val, "Invalid ALUMNET_UPCOMING_EVENTS_LIMIT, using default"),
            }
        }

        config
    }
}
