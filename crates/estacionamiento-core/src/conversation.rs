//! Per-chat guest-registration state.
//!
//! A chat enters the flow with `INVITADO`, then sends the guest's name and
//! finally the building. Sessions idle for longer than the configured timeout
//! are dropped and read back as [`ConversationState::Idle`].

use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};

/// Where a chat currently is in the guest-registration flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConversationState {
    /// Not in a flow; text is interpreted as a command.
    #[default]
    Idle,
    AwaitingName,
    AwaitingBuilding,
}

/// Data collected so far for the guest being registered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestDraft {
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
struct ChatSession {
    state: ConversationState,
    draft: GuestDraft,
    touched: NaiveDateTime,
}

/// Keyed store of conversation sessions, `chat_id -> (state, draft)`.
#[derive(Debug, Default)]
pub struct ConversationStore {
    sessions: HashMap<i64, ChatSession>,
    idle_timeout: Option<Duration>,
}

impl ConversationStore {
    /// Create a store. `idle_timeout = None` keeps sessions until completed.
    pub fn new(idle_timeout: Option<Duration>) -> Self {
        Self {
            sessions: HashMap::new(),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Current state of `chat_id`, dropping the session first if it expired.
    pub fn state(&mut self, chat_id: i64, now: NaiveDateTime) -> ConversationState {
        if self.is_expired(chat_id, now) {
            tracing::debug!(chat_id, "Guest registration expired, resetting chat");
            self.sessions.remove(&chat_id);
        }
        self.sessions
            .get(&chat_id)
            .map_or(ConversationState::Idle, |s| s.state)
    }

    pub fn draft(&self, chat_id: i64) -> Option<&GuestDraft> {
        self.sessions.get(&chat_id).map(|s| &s.draft)
    }

    /// Start (or restart) the flow: the next message is the guest's name.
    pub fn begin_guest(&mut self, chat_id: i64, now: NaiveDateTime) {
        self.sessions.insert(
            chat_id,
            ChatSession {
                state: ConversationState::AwaitingName,
                draft: GuestDraft::default(),
                touched: now,
            },
        );
    }

    /// Store the guest's name; the next message is the building.
    pub fn record_name(&mut self, chat_id: i64, name: &str, now: NaiveDateTime) {
        let session = self.sessions.entry(chat_id).or_insert_with(|| ChatSession {
            state: ConversationState::AwaitingName,
            draft: GuestDraft::default(),
            touched: now,
        });
        session.draft.name = Some(name.to_string());
        session.state = ConversationState::AwaitingBuilding;
        session.touched = now;
    }

    /// Finish the flow for `chat_id`, returning the collected draft.
    pub fn complete(&mut self, chat_id: i64) -> GuestDraft {
        self.sessions
            .remove(&chat_id)
            .map(|s| s.draft)
            .unwrap_or_default()
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn prune_expired(&mut self, now: NaiveDateTime) -> usize {
        let Some(timeout) = self.idle_timeout else {
            return 0;
        };
        let before = self.sessions.len();
        self.sessions.retain(|_, s| now - s.touched <= timeout);
        before - self.sessions.len()
    }

    /// Number of chats with an active flow.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn is_expired(&self, chat_id: i64, now: NaiveDateTime) -> bool {
        match (self.idle_timeout, self.sessions.get(&chat_id)) {
            (Some(timeout), Some(session)) => now - session.touched > timeout,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn unknown_chat_is_idle() {
        let mut store = ConversationStore::new(None);
        assert_eq!(store.state(1, at(8, 0)), ConversationState::Idle);
        assert!(store.is_empty());
    }

    #[test]
    fn flow_walks_through_states() {
        let mut store = ConversationStore::new(None);
        store.begin_guest(7, at(8, 0));
        assert_eq!(store.state(7, at(8, 0)), ConversationState::AwaitingName);

        store.record_name(7, "Ana", at(8, 1));
        assert_eq!(store.state(7, at(8, 1)), ConversationState::AwaitingBuilding);
        assert_eq!(store.draft(7).unwrap().name.as_deref(), Some("Ana"));

        let draft = store.complete(7);
        assert_eq!(draft.name.as_deref(), Some("Ana"));
        assert_eq!(store.state(7, at(8, 2)), ConversationState::Idle);
        assert!(store.draft(7).is_none());
    }

    #[test]
    fn chats_are_independent() {
        let mut store = ConversationStore::new(None);
        store.begin_guest(1, at(9, 0));
        assert_eq!(store.state(2, at(9, 0)), ConversationState::Idle);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn sessions_expire_after_idle_timeout() {
        let mut store = ConversationStore::new(Some(Duration::minutes(15)));
        store.begin_guest(3, at(10, 0));

        assert_eq!(store.state(3, at(10, 15)), ConversationState::AwaitingName);
        assert_eq!(store.state(3, at(10, 16)), ConversationState::Idle);
        assert!(store.is_empty());
    }

    #[test]
    fn recording_name_refreshes_idle_clock() {
        let mut store = ConversationStore::new(Some(Duration::minutes(15)));
        store.begin_guest(3, at(10, 0));
        store.record_name(3, "Luis", at(10, 10));
        assert_eq!(
            store.state(3, at(10, 20)),
            ConversationState::AwaitingBuilding
        );
    }

    #[test]
    fn without_timeout_sessions_never_expire() {
        let mut store = ConversationStore::new(None);
        store.begin_guest(4, at(0, 0));
        assert_eq!(store.state(4, at(23, 59)), ConversationState::AwaitingName);
        assert_eq!(store.prune_expired(at(23, 59)), 0);
    }

    #[test]
    fn prune_removes_only_expired() {
        let mut store = ConversationStore::new(Some(Duration::minutes(5)));
        store.begin_guest(1, at(12, 0));
        store.begin_guest(2, at(12, 10));
        assert_eq!(store.prune_expired(at(12, 12)), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn complete_on_unknown_chat_is_empty_draft() {
        let mut store = ConversationStore::new(None);
        assert_eq!(store.complete(99), GuestDraft::default());
    }
}
