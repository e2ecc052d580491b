//! Local chat store — threads, per-thread ordered message lists, and the
//! active thread id, persisted whole after every mutation.
//!
//! Assistant replies are appended as placeholders and later overwritten in
//! place once the remote reply resolves; identity and position are
//! preserved across the swap.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{load_document, persist_document, DocumentStorage, StoreError, CHAT_DOC};
use crate::models::{ChatMessage, ChatThread, MessageRole, NewMessage, ThreadPatch, ThreadSummary};

/// Characters of first-message content used for a derived thread title.
const TITLE_MAX_CHARS: usize = 40;
/// Characters kept in a summary's last-message preview.
const PREVIEW_MAX_CHARS: usize = 80;

const UNTITLED: &str = "New chat";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ChatState {
    threads: Vec<ChatThread>,
    messages: HashMap<Uuid, Vec<ChatMessage>>,
    active_thread: Option<Uuid>,
}

/// State-owner for on-device chat data. Screens hold a reference and go
/// through this operation set; there are no ambient globals.
pub struct ChatStore {
    state: ChatState,
    storage: Box<dyn DocumentStorage>,
}

impl ChatStore {
    /// Load persisted chat state, or start empty when none exists.
    pub fn load(storage: Box<dyn DocumentStorage>) -> Result<Self, StoreError> {
        let state = load_document(storage.as_ref(), CHAT_DOC)?.unwrap_or_default();
        Ok(Self { state, storage })
    }

    // ── Thread operations ───────────────────────────────────

    /// Allocate a new thread, insert it at the head of the list, and make
    /// it the active thread. Subsequent message operations default to it.
    pub fn create_thread(&mut self, title: Option<&str>) -> Uuid {
        let now = Utc::now();
        let thread = ChatThread {
            id: Uuid::new_v4(),
            title: title.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        let id = thread.id;
        self.state.threads.insert(0, thread);
        self.state.messages.entry(id).or_default();
        self.state.active_thread = Some(id);
        self.persist();
        id
    }

    /// Merge patch fields into the thread record and bump `updated_at`.
    /// Unknown thread id is a no-op.
    pub fn update_thread(&mut self, id: Uuid, patch: ThreadPatch) {
        let Some(thread) = self.state.threads.iter_mut().find(|t| t.id == id) else {
            return;
        };
        if let Some(title) = patch.title {
            thread.title = Some(title);
        }
        thread.updated_at = Utc::now();
        self.persist();
    }

    /// Mark a thread active. Returns false when the id is unknown.
    pub fn set_active_thread(&mut self, id: Uuid) -> bool {
        if !self.state.threads.iter().any(|t| t.id == id) {
            return false;
        }
        self.state.active_thread = Some(id);
        self.persist();
        true
    }

    pub fn active_thread(&self) -> Option<Uuid> {
        self.state.active_thread
    }

    /// Threads, newest-created first.
    pub fn threads(&self) -> &[ChatThread] {
        &self.state.threads
    }

    // ── Message operations ──────────────────────────────────

    /// Append a message with a generated id and current timestamp to the
    /// thread's ordered list. Returns the created record so the caller can
    /// reference it later (placeholder replacement).
    ///
    /// The first user message of an untitled thread also derives the
    /// thread's title from its content.
    pub fn add_local_message(&mut self, input: NewMessage) -> ChatMessage {
        let message = ChatMessage {
            id: Uuid::new_v4(),
            thread_id: input.thread_id,
            role: input.role,
            content: input.content,
            user_id: input.user_id,
            created_at: Utc::now(),
            meta: None,
        };

        self.state
            .messages
            .entry(input.thread_id)
            .or_default()
            .push(message.clone());

        if let Some(thread) = self
            .state
            .threads
            .iter_mut()
            .find(|t| t.id == input.thread_id)
        {
            if thread.title.is_none() && message.role == MessageRole::User {
                thread.title = derive_title(&message.content);
            }
            thread.updated_at = message.created_at;
        }

        self.persist();
        message
    }

    /// Replace a message's content in place, preserving id, role,
    /// `created_at`, and position within the thread. Silent no-op when the
    /// message is not found; callers must not rely on an error.
    pub fn replace_assistant_message(&mut self, thread_id: Uuid, message_id: Uuid, new_content: &str) {
        let Some(messages) = self.state.messages.get_mut(&thread_id) else {
            return;
        };
        let Some(message) = messages.iter_mut().find(|m| m.id == message_id) else {
            return;
        };
        message.content = new_content.to_string();
        self.persist();
    }

    /// Messages of a thread in append order. Empty for unknown threads.
    pub fn messages(&self, thread_id: Uuid) -> &[ChatMessage] {
        self.state
            .messages
            .get(&thread_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Thread summaries for the conversation list, newest activity first.
    pub fn thread_summaries(&self) -> Vec<ThreadSummary> {
        let mut summaries: Vec<ThreadSummary> = self
            .state
            .threads
            .iter()
            .map(|thread| {
                let messages = self.messages(thread.id);
                let last = messages.last();
                ThreadSummary {
                    id: thread.id,
                    title: thread.title.clone().unwrap_or_else(|| UNTITLED.to_string()),
                    message_count: messages.len() as u32,
                    last_message_at: last.map(|m| m.created_at).unwrap_or(thread.created_at),
                    last_message_preview: last
                        .map(|m| truncate_chars(&m.content, PREVIEW_MAX_CHARS))
                        .unwrap_or_default(),
                }
            })
            .collect();
        summaries.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        summaries
    }

    fn persist(&self) {
        persist_document(self.storage.as_ref(), CHAT_DOC, &self.state);
    }
}

/// Derive a thread title from the first user message: trimmed, truncated
/// at a char boundary with an ellipsis. Blank content yields no title.
fn derive_title(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.char_indices().nth(TITLE_MAX_CHARS) {
        Some((byte, _)) => Some(format!("{}...", &trimmed[..byte])),
        None => Some(trimmed.to_string()),
    }
}

/// Truncate to at most `max` characters on a char boundary.
fn truncate_chars(content: &str, max: usize) -> String {
    match content.char_indices().nth(max) {
        Some((byte, _)) => content[..byte].to_string(),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;

    fn store() -> ChatStore {
        ChatStore::load(Box::new(MemoryStorage::new())).unwrap()
    }

    fn user_message(thread_id: Uuid, content: &str) -> NewMessage {
        NewMessage {
            thread_id,
            role: MessageRole::User,
            content: content.to_string(),
            user_id: None,
        }
    }

    fn assistant_message(thread_id: Uuid, content: &str) -> NewMessage {
        NewMessage {
            thread_id,
            role: MessageRole::Assistant,
            content: content.to_string(),
            user_id: None,
        }
    }

    // ── Threads ──

    #[test]
    fn create_thread_inserts_at_head_and_activates() {
        let mut store = store();
        let first = store.create_thread(Some("First"));
        let second = store.create_thread(Some("Second"));

        assert_eq!(store.threads().len(), 2);
        assert_eq!(store.threads()[0].id, second);
        assert_eq!(store.threads()[1].id, first);
        assert_eq!(store.active_thread(), Some(second));
    }

    #[test]
    fn set_active_thread_requires_known_id() {
        let mut store = store();
        let id = store.create_thread(None);
        store.create_thread(None);

        assert!(store.set_active_thread(id));
        assert_eq!(store.active_thread(), Some(id));
        assert!(!store.set_active_thread(Uuid::new_v4()));
        assert_eq!(store.active_thread(), Some(id));
    }

    #[test]
    fn update_thread_merges_title_and_bumps_updated_at() {
        let mut store = store();
        let id = store.create_thread(Some("Old title"));
        let before = store.threads()[0].updated_at;

        store.update_thread(
            id,
            ThreadPatch {
                title: Some("New title".to_string()),
            },
        );

        let thread = &store.threads()[0];
        assert_eq!(thread.title.as_deref(), Some("New title"));
        assert!(thread.updated_at >= before);
        assert_eq!(thread.id, id);
    }

    #[test]
    fn update_unknown_thread_is_noop() {
        let mut store = store();
        store.create_thread(Some("Only"));
        store.update_thread(Uuid::new_v4(), ThreadPatch::default());
        assert_eq!(store.threads()[0].title.as_deref(), Some("Only"));
    }

    // ── Messages ──

    #[test]
    fn messages_append_in_order() {
        let mut store = store();
        let id = store.create_thread(None);
        store.add_local_message(user_message(id, "one"));
        store.add_local_message(assistant_message(id, "two"));
        store.add_local_message(user_message(id, "three"));

        let contents: Vec<&str> = store.messages(id).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn first_user_message_titles_untitled_thread() {
        let mut store = store();
        let id = store.create_thread(None);
        store.add_local_message(user_message(id, "Why does metformin upset my stomach?"));

        assert_eq!(
            store.threads()[0].title.as_deref(),
            Some("Why does metformin upset my stomach?")
        );

        // A later message never re-titles.
        store.add_local_message(user_message(id, "Unrelated follow-up"));
        assert_eq!(
            store.threads()[0].title.as_deref(),
            Some("Why does metformin upset my stomach?")
        );
    }

    #[test]
    fn explicit_title_is_never_overwritten() {
        let mut store = store();
        let id = store.create_thread(Some("Nuevo chat"));
        store.add_local_message(user_message(id, "Hola"));
        assert_eq!(store.threads()[0].title.as_deref(), Some("Nuevo chat"));
    }

    #[test]
    fn derived_title_truncates_on_char_boundary() {
        let long = "á".repeat(60);
        let title = derive_title(&long).unwrap();
        assert!(title.ends_with("..."));
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
    }

    #[test]
    fn assistant_message_does_not_title_thread() {
        let mut store = store();
        let id = store.create_thread(None);
        store.add_local_message(assistant_message(id, "..."));
        assert!(store.threads()[0].title.is_none());
    }

    #[test]
    fn replace_preserves_identity_and_position() {
        let mut store = store();
        let id = store.create_thread(None);
        store.add_local_message(user_message(id, "question"));
        let placeholder = store.add_local_message(assistant_message(id, "..."));
        store.add_local_message(user_message(id, "another question"));

        store.replace_assistant_message(id, placeholder.id, "a real answer");

        let messages = store.messages(id);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].id, placeholder.id);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].created_at, placeholder.created_at);
        assert_eq!(messages[1].content, "a real answer");
    }

    #[test]
    fn replace_unknown_message_is_noop() {
        let mut store = store();
        let id = store.create_thread(None);
        store.add_local_message(user_message(id, "only"));

        store.replace_assistant_message(id, Uuid::new_v4(), "ignored");
        store.replace_assistant_message(Uuid::new_v4(), Uuid::new_v4(), "ignored");

        assert_eq!(store.messages(id)[0].content, "only");
    }

    /// The send flow end to end: user message, assistant placeholder,
    /// placeholder overwritten in place once the reply resolves.
    #[test]
    fn placeholder_replacement_scenario() {
        let mut store = store();
        let thread = store.create_thread(Some("Nuevo chat"));

        store.add_local_message(user_message(thread, "Hola"));
        let placeholder = store.add_local_message(assistant_message(thread, "..."));

        store.replace_assistant_message(thread, placeholder.id, "Hola, ¿en qué puedo ayudarte?");

        let messages = store.messages(thread);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].id, placeholder.id);
        assert_eq!(messages[1].content, "Hola, ¿en qué puedo ayudarte?");
    }

    // ── Summaries ──

    #[test]
    fn summaries_order_by_latest_activity() {
        let mut store = store();
        let older = store.create_thread(Some("Older"));
        let newer = store.create_thread(Some("Newer"));
        store.add_local_message(user_message(newer, "hello"));
        // Activity moves the older thread back to the front.
        store.add_local_message(user_message(older, "resurfaced"));

        let summaries = store.thread_summaries();
        assert_eq!(summaries[0].id, older);
        assert_eq!(summaries[0].message_count, 1);
        assert_eq!(summaries[0].last_message_preview, "resurfaced");
        assert_eq!(summaries[1].id, newer);
    }

    #[test]
    fn summary_preview_truncates() {
        let mut store = store();
        let id = store.create_thread(Some("T"));
        store.add_local_message(user_message(id, &"x".repeat(200)));
        let summaries = store.thread_summaries();
        assert_eq!(summaries[0].last_message_preview.chars().count(), PREVIEW_MAX_CHARS);
    }

    // ── Persistence ──

    #[test]
    fn round_trip_reloads_identical_state() {
        let storage = MemoryStorage::new();
        let mut store = ChatStore::load(Box::new(storage.clone())).unwrap();
        let thread = store.create_thread(Some("Persisted"));
        store.add_local_message(user_message(thread, "hello"));
        let placeholder = store.add_local_message(assistant_message(thread, "..."));
        store.replace_assistant_message(thread, placeholder.id, "answer");

        let reloaded = ChatStore::load(Box::new(storage)).unwrap();
        assert_eq!(reloaded.threads(), store.threads());
        assert_eq!(reloaded.messages(thread), store.messages(thread));
        assert_eq!(reloaded.active_thread(), store.active_thread());
    }
}
