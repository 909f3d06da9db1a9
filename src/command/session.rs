//! Per-session conversation state
//!
//! Each session owns its conversation history and its email compose context,
//! so concurrent text sessions never interleave into one draft.

use crate::command::email::EmailComposeContext;
use crate::core::types::{ConversationTurn, SessionId};
use crate::llm::parser::Intent;
use ahash::AHashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding window of conversation turns
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl ConversationHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a turn, evicting the oldest when full
    pub fn push(&mut self, turn: ConversationTurn) {
        if self.turns.len() >= self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, ConversationTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// An intent parked until the user confirms it
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    /// Distinguishes this request from later ones when its timer fires
    pub id: u64,
    pub intent: Intent,
    pub requested_at: Instant,
}

impl PendingConfirmation {
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.requested_at.elapsed() >= timeout
    }
}

/// State that outlives a single utterance
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: SessionId,
    pub email: EmailComposeContext,
    pub history: ConversationHistory,
    pub pending: Option<PendingConfirmation>,
}

impl SessionContext {
    pub fn new(id: SessionId, history_capacity: usize) -> Self {
        Self {
            id,
            email: EmailComposeContext::default(),
            history: ConversationHistory::new(history_capacity),
            pending: None,
        }
    }

    /// Drop the draft and any pending confirmation
    pub fn cancel(&mut self) {
        self.email.reset();
        self.pending = None;
    }
}

/// All live sessions, keyed by id. With a limit set, creating a session
/// past the limit evicts the least recently used one.
#[derive(Debug)]
pub struct SessionStore {
    sessions: AHashMap<SessionId, SessionContext>,
    /// Logical time of each session's last use
    last_used: AHashMap<SessionId, u64>,
    clock: u64,
    history_capacity: usize,
    max_sessions: Option<usize>,
    /// Never evicted
    pinned: Option<SessionId>,
}

impl SessionStore {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            sessions: AHashMap::new(),
            last_used: AHashMap::new(),
            clock: 0,
            history_capacity,
            max_sessions: None,
            pinned: None,
        }
    }

    /// Cap the number of live sessions, keeping `pinned` regardless
    pub fn with_limit(mut self, max_sessions: usize, pinned: SessionId) -> Self {
        self.max_sessions = Some(max_sessions.max(1));
        self.pinned = Some(pinned);
        self
    }

    /// Fetch a session, creating it empty on first use
    pub fn get_or_create(&mut self, id: SessionId) -> &mut SessionContext {
        if !self.sessions.contains_key(&id) {
            self.evict_for_insert();
        }
        self.clock += 1;
        self.last_used.insert(id, self.clock);

        let capacity = self.history_capacity;
        self.sessions.entry(id).or_insert_with(|| {
            tracing::debug!("Creating session {}", id);
            SessionContext::new(id, capacity)
        })
    }

    fn evict_for_insert(&mut self) {
        let Some(max) = self.max_sessions else {
            return;
        };
        while self.sessions.len() >= max {
            let oldest = self
                .last_used
                .iter()
                .filter(|(id, _)| Some(**id) != self.pinned)
                .min_by_key(|(_, tick)| **tick)
                .map(|(id, _)| *id);
            let Some(oldest) = oldest else {
                break;
            };
            tracing::debug!("Evicting least recently used session {}", oldest);
            self.remove(&oldest);
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<&SessionContext> {
        self.sessions.get(id)
    }

    pub fn remove(&mut self, id: &SessionId) -> Option<SessionContext> {
        self.last_used.remove(id);
        self.sessions.remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
