//! Conversation list and focused thread.
//!
//! All state changes go through `&mut self` on the task that owns the
//! view. Background mark-read work runs in detached tasks that report a
//! [`ReadReceipt`] on a channel owned by the view; the owner drains it with
//! [`ChatView::next_receipt`] and applies it with
//! [`ChatView::apply_receipt`].

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use alumnet_shared::constants::UNKNOWN_SENDER;
use alumnet_shared::models::Message;
use alumnet_shared::types::{Identity, UserId};
use alumnet_store::Backend;

use super::conversation::{merge_message, sort_conversations, timeline, Conversation, PeerSummary, TimelineItem};
use crate::error::ClientError;
use crate::events::{preview, ToastSink};
use crate::fetchers::{messages, profiles};
use crate::session::Viewer;

/// Outcome of a detached mark-read task.
#[derive(Debug)]
pub struct ReadReceipt {
    pub peer: UserId,
    pub requested: BTreeSet<Uuid>,
    pub outcome: Result<BTreeSet<Uuid>, String>,
}

pub struct ChatView {
    backend: Arc<dyn Backend>,
    viewer: Viewer,
    toasts: ToastSink,
    synthesize_unknown_peers: bool,
    conversations: Vec<Conversation>,
    focused: Option<UserId>,
    thread: Vec<Message>,
    /// Ids known to be read on the backend. A late copy of one of these
    /// never counts as unread again.
    known_read: HashSet<Uuid>,
    receipts_tx: mpsc::UnboundedSender<ReadReceipt>,
    receipts_rx: mpsc::UnboundedReceiver<ReadReceipt>,
    receipts_pending: usize,
}

impl ChatView {
    pub fn new(
        backend: Arc<dyn Backend>,
        viewer: Viewer,
        toasts: ToastSink,
        synthesize_unknown_peers: bool,
    ) -> Self {
        let (receipts_tx, receipts_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            viewer,
            toasts,
            synthesize_unknown_peers,
            conversations: Vec::new(),
            focused: None,
            thread: Vec::new(),
            known_read: HashSet::new(),
            receipts_tx,
            receipts_rx,
            receipts_pending: 0,
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, peer: UserId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.peer.id == peer)
    }

    pub fn focused(&self) -> Option<UserId> {
        self.focused
    }

    /// Messages of the focused conversation, oldest first.
    pub fn thread(&self) -> &[Message] {
        &self.thread
    }

    pub fn timeline(&self) -> Vec<TimelineItem<'_>> {
        timeline(&self.thread)
    }

    pub fn total_unread(&self) -> usize {
        self.conversations.iter().map(Conversation::unread_count).sum()
    }

    fn me(&self) -> &Identity {
        self.viewer.identity()
    }

    fn conversation_mut(&mut self, peer: UserId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.peer.id == peer)
    }

    /// Replace the conversation list with a fresh fetch. On failure the
    /// current list is kept.
    pub async fn load(&mut self) {
        match messages::list_conversations(self.backend.as_ref(), &self.viewer).await {
            Ok(conversations) => self.conversations = conversations,
            Err(e) => {
                warn!(error = %e, "Failed to load conversations");
                self.toasts.error("Could not load conversations", &e);
            }
        }
    }

    /// Focus `peer`, load the full thread and mark everything unread from
    /// that peer as read in one batched update.
    pub async fn on_open_conversation(&mut self, peer: UserId) {
        if self.conversation(peer).is_none() && !self.adopt_peer(peer).await {
            return;
        }

        let history = match messages::conversation_history(self.backend.as_ref(), &self.viewer, peer).await {
            Ok(history) => history,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Failed to load conversation");
                self.toasts.error("Could not load conversation", &e);
                return;
            }
        };

        let me = self.me().id;
        let unread: BTreeSet<Uuid> = history
            .iter()
            .filter(|m| m.is_unread_from(peer, me))
            .map(|m| m.id)
            .collect();
        self.known_read
            .extend(history.iter().filter(|m| m.sender_id == peer && m.is_read()).map(|m| m.id));

        self.focused = Some(peer);
        self.thread = history;
        if let Some(conversation) = self.conversations.iter_mut().find(|c| c.peer.id == peer) {
            if let Some(last) = self.thread.last() {
                conversation.record_message(last);
            }
            conversation.reset_unread(unread.clone());
        }
        debug!(peer = %peer, messages = self.thread.len(), unread = unread.len(), "Conversation opened");

        if unread.is_empty() {
            return;
        }
        match messages::mark_read(self.backend.as_ref(), &self.viewer, &unread).await {
            Ok(_) => self.settle_read(peer, &unread),
            Err(e) => {
                warn!(peer = %peer, error = %e, "Failed to mark conversation read");
                self.toasts.error("Could not mark messages as read", &e);
            }
        }
    }

    /// A message addressed to us was inserted on the backend.
    pub async fn on_remote_insert(&mut self, mut message: Message) {
        let me = self.me().id;
        if message.receiver_id != me || message.sender_id == me {
            return;
        }
        let peer = message.sender_id;

        let sender_name = self.conversation(peer).map(|c| c.peer.display_name.clone());
        self.toasts.info(
            format!("New message from {}", sender_name.as_deref().unwrap_or(UNKNOWN_SENDER)),
            preview(&message.content, 80),
        );

        if self.conversation(peer).is_none() {
            if !self.synthesize_unknown_peers {
                debug!(peer = %peer, "Message from a peer outside the conversation list dropped");
                return;
            }
            if !self.adopt_peer(peer).await {
                return;
            }
        }

        if self.known_read.contains(&message.id) {
            message.mark_read();
        }
        let focused = self.focused == Some(peer);
        let unread = !message.is_read();
        let id = message.id;
        if let Some(conversation) = self.conversation_mut(peer) {
            conversation.record_message(&message);
            if unread {
                conversation.note_unread(id);
            }
        }

        if focused {
            merge_message(&mut self.thread, message);
            if unread {
                self.spawn_mark_read(peer, BTreeSet::from([id]));
            }
        }
        sort_conversations(&mut self.conversations);
    }

    /// A message row changed on the backend. Only a read transition is
    /// taken; an update that says unread never un-reads anything.
    pub fn on_remote_update(&mut self, message: Message) {
        if let Some(existing) = self.thread.iter_mut().find(|m| m.id == message.id) {
            existing.absorb(&message);
        }
        if message.is_read() {
            let id = message.id;
            self.known_read.insert(id);
            if let Some(conversation) = self.conversation_mut(message.sender_id) {
                conversation.settle_read([id].iter());
            }
        }
    }

    /// Send `text` to `peer`. The draft is validated before any backend
    /// call; on success the persisted row is appended without a re-fetch.
    pub async fn on_send(&mut self, peer: UserId, text: &str) -> Result<Message, ClientError> {
        let message = match messages::send_message(self.backend.as_ref(), &self.viewer, peer, text).await {
            Ok(message) => message,
            Err(e) => {
                if !e.is_validation() {
                    warn!(peer = %peer, error = %e, "Failed to send message");
                    self.toasts.error("Message not sent", &e);
                }
                return Err(e);
            }
        };

        if let Some(conversation) = self.conversation_mut(peer) {
            conversation.record_message(&message);
        }
        if self.focused == Some(peer) {
            merge_message(&mut self.thread, message.clone());
        }
        sort_conversations(&mut self.conversations);
        Ok(message)
    }

    /// Wait for the next mark-read receipt. Pending forever while no task
    /// is in flight.
    pub async fn next_receipt(&mut self) -> Option<ReadReceipt> {
        self.receipts_rx.recv().await
    }

    pub fn apply_receipt(&mut self, receipt: ReadReceipt) {
        self.receipts_pending = self.receipts_pending.saturating_sub(1);
        match receipt.outcome {
            Ok(_) => self.settle_read(receipt.peer, &receipt.requested),
            Err(e) => debug!(peer = %receipt.peer, error = %e, "Mark-read receipt failed, keeping unread"),
        }
    }

    /// Apply receipts until no mark-read task is in flight.
    pub async fn settle(&mut self) {
        while self.receipts_pending > 0 {
            match self.receipts_rx.recv().await {
                Some(receipt) => self.apply_receipt(receipt),
                None => break,
            }
        }
    }

    pub fn receipts_pending(&self) -> usize {
        self.receipts_pending
    }

    fn settle_read(&mut self, peer: UserId, ids: &BTreeSet<Uuid>) {
        self.known_read.extend(ids.iter().copied());
        if let Some(conversation) = self.conversation_mut(peer) {
            conversation.settle_read(ids);
        }
        for message in self.thread.iter_mut().filter(|m| ids.contains(&m.id)) {
            message.mark_read();
        }
    }

    fn spawn_mark_read(&mut self, peer: UserId, ids: BTreeSet<Uuid>) {
        let backend = self.backend.clone();
        let viewer = self.viewer.clone();
        let tx = self.receipts_tx.clone();
        self.receipts_pending += 1;

        tokio::spawn(async move {
            let outcome = match messages::mark_read(backend.as_ref(), &viewer, &ids).await {
                Ok(updated) => Ok(updated),
                Err(e) => {
                    warn!(peer = %peer, error = %e, "Background mark-read failed");
                    Err(e.to_string())
                }
            };
            let receipt = ReadReceipt {
                peer,
                requested: ids,
                outcome,
            };
            if tx.send(receipt).is_err() {
                debug!("Chat view gone before mark-read finished");
            }
        });
    }

    /// Add a conversation entry for a peer outside the list. Returns false
    /// when the peer has no profile or the lookup failed.
    async fn adopt_peer(&mut self, peer: UserId) -> bool {
        match profiles::get_profile(self.backend.as_ref(), peer).await {
            Ok(Some(profile)) => {
                info!(peer = %peer, "Conversation added");
                self.conversations
                    .push(Conversation::new(PeerSummary::from(profile), None, BTreeSet::new()));
                true
            }
            Ok(None) => {
                let e = ClientError::NotFound(format!("profile {peer}"));
                self.toasts.error("Could not open conversation", &e);
                false
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "Failed to look up peer");
                self.toasts.error("Could not open conversation", &e);
                false
            }
        }
    }
}
