//! Real-time reconciliation of client view state.
//!
//! Views are plain structs mutated through `&mut self` by the single task
//! that owns them. [`SyncBridge`] is that task: it feeds backend change
//! events and UI commands to the views from one `select!` loop.

pub mod badges;
pub mod bridge;
pub mod chat;
pub mod conversation;
pub mod notifications;

pub use badges::DashboardBadges;
pub use bridge::{BridgeHandle, BridgeSnapshot, ChatCommand, SyncBridge};
pub use chat::{ChatView, ReadReceipt};
pub use conversation::{Conversation, PeerSummary, TimelineItem};
pub use notifications::NotificationFeed;
