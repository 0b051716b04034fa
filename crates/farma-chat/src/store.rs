//! Append-only conversation history.

use tracing::{debug, info};

use farma_core::clock::SharedClock;
use farma_core::types::{HistoryEntry, ImageRef, Message, MessageId, Origin};

/// Ordered message history plus the in-flight flag.
///
/// Entries are never mutated or reordered once appended. The only operation
/// that shrinks history is [`SessionStore::reset`], which restores the single
/// greeting message.
pub struct SessionStore {
    messages: Vec<Message>,
    loading: bool,
    next_id: u64,
    epoch: u64,
    greeting: String,
    clock: SharedClock,
}

impl SessionStore {
    /// Create a store holding only the greeting.
    pub fn new(greeting: impl Into<String>, clock: SharedClock) -> Self {
        let mut store = Self {
            messages: Vec::new(),
            loading: false,
            next_id: 1,
            epoch: 0,
            greeting: greeting.into(),
            clock,
        };
        store.push_greeting();
        store
    }

    /// Append a message and return its id.
    pub fn append(
        &mut self,
        origin: Origin,
        text: impl Into<String>,
        attached_image: Option<ImageRef>,
    ) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        let message = Message {
            id,
            text: text.into(),
            origin,
            created_at: self.clock.now(),
            attached_image,
        };
        debug!(
            message_id = %id,
            role = origin.role(),
            has_image = message.attached_image.is_some(),
            "Message appended"
        );
        self.messages.push(message);
        id
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Discard history and start over from the greeting.
    ///
    /// Clears the loading flag and bumps the epoch so that a response for a
    /// request issued before the reset can be recognised as stale.
    pub fn reset(&mut self) {
        let dropped = self.messages.len();
        self.messages.clear();
        self.loading = false;
        self.epoch += 1;
        self.push_greeting();
        info!(dropped, epoch = self.epoch, "Conversation reset");
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        // Ids are issued in append order, so history is sorted by id.
        self.messages
            .binary_search_by_key(&id, |m| m.id)
            .ok()
            .map(|idx| &self.messages[idx])
    }

    /// Number of resets since creation.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whole history in gateway role/content shape.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.messages.iter().map(Message::to_history_entry).collect()
    }

    fn push_greeting(&mut self) {
        let greeting = self.greeting.clone();
        self.append(Origin::Assistant, greeting, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use farma_core::clock::{Clock, ManualClock};

    fn store() -> (SessionStore, ManualClock) {
        let clock = ManualClock::default();
        let store = SessionStore::new("Hola", Arc::new(clock.clone()));
        (store, clock)
    }

    #[test]
    fn test_new_store_holds_greeting() {
        let (store, _) = store();
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
        let greeting = store.last().unwrap();
        assert_eq!(greeting.origin, Origin::Assistant);
        assert_eq!(greeting.text, "Hola");
        assert!(!store.is_loading());
        assert_eq!(store.epoch(), 0);
    }

    #[test]
    fn test_append_grows_and_preserves_prior_entries() {
        let (mut store, clock) = store();
        let mut snapshot = store.messages().to_vec();

        for i in 0..10 {
            clock.advance(Duration::from_secs(1));
            let origin = if i % 2 == 0 {
                Origin::User
            } else {
                Origin::Assistant
            };
            let before = store.len();
            store.append(origin, format!("m{i}"), None);
            assert_eq!(store.len(), before + 1);
            assert_eq!(&store.messages()[..before], snapshot.as_slice());
            snapshot = store.messages().to_vec();
        }
    }

    #[test]
    fn test_ids_are_monotonic() {
        let (mut store, _) = store();
        let a = store.append(Origin::User, "a", None);
        let b = store.append(Origin::Assistant, "b", None);
        assert!(b > a);
        assert_eq!(store.get(a).unwrap().text, "a");
        assert_eq!(store.get(b).unwrap().text, "b");
        assert!(store.get(MessageId(999)).is_none());
    }

    #[test]
    fn test_timestamps_come_from_clock() {
        let (mut store, clock) = store();
        clock.advance(Duration::from_secs(30));
        let id = store.append(Origin::User, "x", None);
        assert_eq!(store.get(id).unwrap().created_at, clock.now());
    }

    #[test]
    fn test_loading_does_not_gate_append() {
        let (mut store, _) = store();
        store.set_loading(true);
        store.append(Origin::User, "still works", None);
        assert_eq!(store.len(), 2);
        assert!(store.is_loading());
    }

    #[test]
    fn test_reset_restores_exactly_one_greeting() {
        let (mut store, _) = store();
        for i in 0..5 {
            store.append(Origin::User, format!("q{i}"), None);
        }
        store.set_loading(true);
        let last_id = store.last().unwrap().id;

        store.reset();

        assert_eq!(store.len(), 1);
        assert_eq!(store.last().unwrap().text, "Hola");
        assert!(!store.is_loading());
        assert_eq!(store.epoch(), 1);
        // Ids keep increasing across resets.
        assert!(store.last().unwrap().id > last_id);

        store.reset();
        assert_eq!(store.len(), 1);
        assert_eq!(store.epoch(), 2);
    }

    #[test]
    fn test_history_maps_roles() {
        let (mut store, _) = store();
        store.append(Origin::User, "pregunta", None);
        store.append(Origin::Assistant, "respuesta", None);

        let history = store.history();
        let roles: Vec<&str> = history.iter().map(|h| h.role.as_str()).collect();
        assert_eq!(roles, vec!["assistant", "user", "assistant"]);
        assert_eq!(history[1].content, "pregunta");
    }
}
