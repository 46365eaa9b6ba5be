use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use alumnet_shared::models::{Message, Profile};
use alumnet_shared::types::{Role, UserId};

/// The parts of a peer's profile a conversation list needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSummary {
    pub id: UserId,
    pub display_name: String,
    pub role: Role,
    pub avatar_url: Option<String>,
}

impl From<Profile> for PeerSummary {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            display_name: profile.display_name,
            role: profile.role,
            avatar_url: profile.avatar_url,
        }
    }
}

/// One row of the conversation list, keyed by peer.
///
/// The unread count is the size of a set of message ids, so the same
/// message seen by a fetch and by a push is only counted once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub peer: PeerSummary,
    pub last_message: Option<String>,
    pub last_message_time: Option<DateTime<Utc>>,
    unread: BTreeSet<Uuid>,
}

impl Conversation {
    pub fn new(peer: PeerSummary, last: Option<&Message>, unread: BTreeSet<Uuid>) -> Self {
        Self {
            peer,
            last_message: last.map(|m| m.content.clone()),
            last_message_time: last.map(|m| m.created_at),
            unread,
        }
    }

    pub fn unread_count(&self) -> usize {
        self.unread.len()
    }

    pub fn unread_ids(&self) -> &BTreeSet<Uuid> {
        &self.unread
    }

    /// Move the preview to `message` unless a newer one is already shown.
    pub fn record_message(&mut self, message: &Message) {
        let newer = match self.last_message_time {
            Some(current) => message.created_at >= current,
            None => true,
        };
        if newer {
            self.last_message = Some(message.content.clone());
            self.last_message_time = Some(message.created_at);
        }
    }

    /// Count `id` as unread. Returns false when it was already counted.
    pub fn note_unread(&mut self, id: Uuid) -> bool {
        self.unread.insert(id)
    }

    /// Forget ids that are now known to be read.
    pub fn settle_read<'a>(&mut self, ids: impl IntoIterator<Item = &'a Uuid>) {
        for id in ids {
            self.unread.remove(id);
        }
    }

    /// Replace the unread set with freshly fetched truth.
    pub fn reset_unread(&mut self, ids: BTreeSet<Uuid>) {
        self.unread = ids;
    }
}

/// Most recent activity first; conversations without any message last.
/// The sort is stable, so ties keep their current order.
pub fn sort_conversations(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| match (a.last_message_time, b.last_message_time) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Insert `message` into a thread kept in ascending time order. A message
/// already present is folded into the existing copy instead. Returns true
/// when the thread grew.
pub fn merge_message(thread: &mut Vec<Message>, message: Message) -> bool {
    if let Some(existing) = thread.iter_mut().find(|m| m.id == message.id) {
        existing.absorb(&message);
        return false;
    }
    let at = thread.partition_point(|m| m.created_at <= message.created_at);
    thread.insert(at, message);
    true
}

/// A rendered thread entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineItem<'a> {
    /// Marks the start of a new calendar day (UTC).
    DateDivider(NaiveDate),
    Message(&'a Message),
}

/// Interleave date dividers into an ascending thread.
pub fn timeline(thread: &[Message]) -> Vec<TimelineItem<'_>> {
    let mut items = Vec::with_capacity(thread.len() + 1);
    let mut current: Option<NaiveDate> = None;
    for message in thread {
        let day = message.created_at.date_naive();
        if current != Some(day) {
            items.push(TimelineItem::DateDivider(day));
            current = Some(day);
        }
        items.push(TimelineItem::Message(message));
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn peer(name: &str) -> PeerSummary {
        PeerSummary {
            id: UserId::new(),
            display_name: name.to_string(),
            role: Role::Alumni,
            avatar_url: None,
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    fn message(content: &str, created_at: DateTime<Utc>) -> Message {
        serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "sender_id": UserId::new(),
            "receiver_id": UserId::new(),
            "content": content,
            "created_at": alumnet_shared::timefmt::format(&created_at),
            "read": false,
        }))
        .unwrap()
    }

    fn conversation(name: &str, time: Option<DateTime<Utc>>) -> Conversation {
        let last = time.map(|t| message(name, t));
        Conversation::new(peer(name), last.as_ref(), BTreeSet::new())
    }

    #[test]
    fn sorts_by_recency_with_silent_conversations_last() {
        let mut list = vec![
            conversation("t3", Some(at(3, 0))),
            conversation("t1", Some(at(1, 0))),
            conversation("none", None),
            conversation("t2", Some(at(2, 0))),
        ];
        sort_conversations(&mut list);
        let names: Vec<_> = list.iter().map(|c| c.peer.display_name.as_str()).collect();
        assert_eq!(names, ["t3", "t2", "t1", "none"]);
    }

    #[test]
    fn unread_ids_are_counted_once() {
        let mut c = conversation("p", None);
        let id = Uuid::new_v4();
        assert!(c.note_unread(id));
        assert!(!c.note_unread(id));
        assert_eq!(c.unread_count(), 1);
        c.settle_read([id].iter());
        assert_eq!(c.unread_count(), 0);
    }

    #[test]
    fn preview_never_moves_backwards() {
        let mut c = conversation("p", Some(at(2, 0)));
        c.record_message(&message("older", at(1, 0)));
        assert_eq!(c.last_message.as_deref(), Some("p"));
        c.record_message(&message("newer", at(3, 0)));
        assert_eq!(c.last_message.as_deref(), Some("newer"));
        assert_eq!(c.last_message_time, Some(at(3, 0)));
    }

    #[test]
    fn merge_keeps_order_and_skips_duplicates() {
        let mut thread = vec![message("a", at(1, 9)), message("c", at(1, 11))];
        let b = message("b", at(1, 10));
        assert!(merge_message(&mut thread, b.clone()));
        assert!(!merge_message(&mut thread, b));
        let contents: Vec<_> = thread.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["a", "b", "c"]);
    }

    #[test]
    fn dividers_mark_each_new_day() {
        let thread = vec![
            message("a", at(1, 9)),
            message("b", at(1, 23)),
            message("c", at(2, 1)),
        ];
        let items = timeline(&thread);
        assert_eq!(items.len(), 5);
        assert_eq!(items[0], TimelineItem::DateDivider(at(1, 0).date_naive()));
        assert!(matches!(items[2], TimelineItem::Message(m) if m.content == "b"));
        assert_eq!(items[3], TimelineItem::DateDivider(at(2, 0).date_naive()));
    }
}
