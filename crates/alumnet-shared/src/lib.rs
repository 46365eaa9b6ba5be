//! # alumnet-shared
//!
//! Types shared by every Alumnet crate: identities and roles, the domain
//! records exchanged with the backend, validation errors, and the timestamp
//! format used for anything that is ordered by time.

pub mod constants;
pub mod error;
pub mod models;
pub mod timefmt;
pub mod types;
