use chrono::{Duration, NaiveDateTime};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::commands::{Command, RecognitionLabel, ShiftState, replies};
use crate::conversation::{ConversationState, ConversationStore};

/// Turns one incoming chat message into one reply.
///
/// Owns the conversation store and the shared shift, and is driven by a
/// single task, so messages are handled strictly one at a time.
#[derive(Debug)]
pub struct ConversationEngine {
    conversations: ConversationStore,
    shift: ShiftState,
    rng: StdRng,
}

impl ConversationEngine {
    pub fn new(idle_timeout: Option<Duration>) -> Self {
        Self::with_rng(idle_timeout, StdRng::from_entropy())
    }

    /// Create an engine with a caller-supplied RNG for the simulated recognition.
    pub fn with_rng(idle_timeout: Option<Duration>, rng: StdRng) -> Self {
        Self {
            conversations: ConversationStore::new(idle_timeout),
            shift: ShiftState::default(),
            rng,
        }
    }

    pub fn shift(&self) -> &ShiftState {
        &self.shift
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn conversation_state(&mut self, chat_id: i64, now: NaiveDateTime) -> ConversationState {
        self.conversations.state(chat_id, now)
    }

    /// Drop idle guest registrations. Returns how many were dropped.
    pub fn prune_expired(&mut self, now: NaiveDateTime) -> usize {
        let dropped = self.conversations.prune_expired(now);
        if dropped > 0 {
            debug!(dropped, "Expired guest registrations dropped");
        }
        dropped
    }

    /// Handle a message and return the reply text.
    ///
    /// State changes are applied before the reply is returned; delivering the
    /// reply is the caller's concern and never rolls them back.
    pub fn handle(&mut self, chat_id: i64, raw_text: &str, now: NaiveDateTime) -> String {
        let text = raw_text.trim();

        match self.conversations.state(chat_id, now) {
            ConversationState::AwaitingName => {
                self.conversations.record_name(chat_id, text, now);
                debug!(chat_id, "Guest name recorded");
                return replies::GUEST_BUILDING_PROMPT.to_string();
            }
            ConversationState::AwaitingBuilding => {
                let draft = self.conversations.complete(chat_id);
                let name = draft.name.as_deref().unwrap_or(replies::UNKNOWN_GUEST);
                debug!(chat_id, "Guest registration completed");
                return replies::guest_registered(name, text, now);
            }
            ConversationState::Idle => {}
        }

        match Command::parse(text) {
            Some(Command::StartShift) => {
                if self.shift.start(now) {
                    replies::shift_started(now)
                } else {
                    replies::SHIFT_ALREADY_ACTIVE.to_string()
                }
            }
            Some(Command::EndShift) => {
                if self.shift.end() {
                    replies::shift_ended(now)
                } else {
                    replies::NO_ACTIVE_SHIFT.to_string()
                }
            }
            Some(Command::Identify) => {
                replies::identified(RecognitionLabel::random(&mut self.rng))
            }
            Some(Command::Guest) => {
                self.conversations.begin_guest(chat_id, now);
                replies::GUEST_NAME_PROMPT.to_string()
            }
            Some(Command::Report) => replies::REPORT.to_string(),
            None => replies::NOT_UNDERSTOOD.to_string(),
        }
    }
}

impl Default for ConversationEngine {
    fn default() -> Self {
        Self::new(None)
    }
}
