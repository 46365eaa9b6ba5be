//! # alumnet-client
//!
//! Application core of the Alumnet client: the session state machine, the
//! per-feature entity fetchers, and the synchronization layer that keeps
//! chat threads, unread counts and notification badges consistent while
//! change events arrive from the backend.
//!
//! Rendering is left to the embedding UI, which reads view state from the
//! [`sync::BridgeHandle`] and shows the [`events::Toast`]s it receives.

pub mod app;
pub mod config;
pub mod events;
pub mod fetchers;
pub mod session;
pub mod sync;

mod error;

pub use app::App;
pub use config::ClientConfig;
pub use error::ClientError;

use tracing_subscriber::{fmt, EnvFilter};

/// Install a `tracing` subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("alumnet_client=debug,alumnet_store=info,warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
