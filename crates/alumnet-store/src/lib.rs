//! # alumnet-store
//!
//! The backend binding used by the Alumnet client. The [`Backend`] trait is
//! the whole surface the application needs from a managed backend: table
//! queries, batch updates, change subscriptions, file storage and auth.
//!
//! [`LocalBackend`] implements it on top of a local SQLite database (one
//! JSON document table per [`Table`]) and a storage directory, so the client
//! can run and be tested without a hosted service.

pub mod auth;
pub mod backend;
pub mod config;
pub mod database;
pub mod documents;
pub mod local;
pub mod migrations;
pub mod query;
pub mod storage;

mod error;

pub use backend::{AuthEvent, AuthSession, Backend, ChangeEvent, ChangeFilter, ChangeKind, Subscription};
pub use config::LocalBackendConfig;
pub use database::Database;
pub use error::{BackendError, Result};
pub use local::LocalBackend;
pub use query::{from_row, to_row, Filter, Order, Patch, Query, Row, Table};
pub use storage::ObjectStorage;
