//! Bounded, in-memory conversation history keyed by session id.
//!
//! A turn starts at a user message and runs until the next one. Trimming
//! always removes whole turns from the front, so a session never begins with
//! an assistant message whose question has been forgotten.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use contractlens_config::ConversationConfig;
use contractlens_core::message::{Conversation, ConversationId, Message, Role};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub title: Option<String>,
    pub turns: usize,
    pub messages: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Conversation> for ConversationSummary {
    fn from(c: &Conversation) -> Self {
        Self {
            id: c.id.clone(),
            title: c.title.clone(),
            turns: c.turn_count(),
            messages: c.messages.len(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

struct Session {
    conversation: Conversation,
    /// Logical clock value of the last append; orders sessions by recency
    touched: u64,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<ConversationId, Session>,
    locks: HashMap<ConversationId, Arc<Mutex<()>>>,
    clock: u64,
}

pub struct ConversationStore {
    inner: RwLock<Inner>,
    max_turns: usize,
    max_sessions: usize,
}

impl ConversationStore {
    pub fn new(max_turns: usize, max_sessions: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_turns: max_turns.max(1),
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn from_config(config: &ConversationConfig) -> Self {
        Self::new(config.max_turns, config.max_sessions)
    }

    /// Append to a session, creating it on first use, then trim to `max_turns`.
    pub async fn append(&self, id: &ConversationId, message: Message) {
        let mut inner = self.inner.write().await;

        if !inner.sessions.contains_key(id) {
            if inner.sessions.len() >= self.max_sessions {
                evict_least_recent(&mut inner);
            }
            debug!(conversation_id = %id, "New conversation");
            inner.sessions.insert(
                id.clone(),
                Session { conversation: Conversation::with_id(id.clone()), touched: 0 },
            );
        }

        inner.clock += 1;
        let clock = inner.clock;
        if let Some(session) = inner.sessions.get_mut(id) {
            session.touched = clock;
            session.conversation.push(message);
            trim_turns(&mut session.conversation, self.max_turns);
        }
    }

    /// Messages of a session in order; empty for unknown ids.
    pub async fn history(&self, id: &ConversationId) -> Vec<Message> {
        self.inner
            .read()
            .await
            .sessions
            .get(id)
            .map(|s| s.conversation.messages.clone())
            .unwrap_or_default()
    }

    pub async fn get(&self, id: &ConversationId) -> Option<Conversation> {
        self.inner.read().await.sessions.get(id).map(|s| s.conversation.clone())
    }

    /// Most recently updated first.
    pub async fn list(&self) -> Vec<ConversationSummary> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<&Session> = inner.sessions.values().collect();
        sessions.sort_by(|a, b| b.touched.cmp(&a.touched));
        sessions.into_iter().map(|s| ConversationSummary::from(&s.conversation)).collect()
    }

    pub async fn remove(&self, id: &ConversationId) -> bool {
        let mut inner = self.inner.write().await;
        release_lock(&mut inner.locks, id);
        inner.sessions.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.sessions.is_empty()
    }

    /// Drop sessions not updated within `max_idle`. Returns how many went.
    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(max_idle)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle))
        else {
            return 0;
        };

        let mut inner = self.inner.write().await;
        let stale: Vec<ConversationId> = inner
            .sessions
            .values()
            .filter(|s| s.conversation.updated_at < cutoff)
            .map(|s| s.conversation.id.clone())
            .collect();
        for id in &stale {
            inner.sessions.remove(id);
        }
        sweep_idle_locks(&mut inner);
        if !stale.is_empty() {
            info!(
                pruned = stale.len(),
                remaining = inner.sessions.len(),
                "Pruned idle conversations"
            );
        }
        stale.len()
    }

    /// The mutex serializing turns on `id`. Hold its guard for the whole turn.
    ///
    /// A lock outlives its session while anyone still holds a clone of it,
    /// so removing or evicting a busy session never lets a second turn in.
    pub async fn turn_lock(&self, id: &ConversationId) -> Arc<Mutex<()>> {
        if let Some(lock) = self.inner.read().await.locks.get(id) {
            return lock.clone();
        }

        let mut inner = self.inner.write().await;
        // Turns that failed never create a session; drop their locks once
        // the map outgrows the session cap.
        if !inner.locks.contains_key(id)
            && inner.locks.len() >= self.max_sessions.saturating_mul(2)
        {
            sweep_idle_locks(&mut inner);
        }
        inner.locks.entry(id.clone()).or_default().clone()
    }

    /// Number of per-session locks currently tracked.
    pub async fn lock_count(&self) -> usize {
        self.inner.read().await.locks.len()
    }
}

/// Drop the lock for `id` unless a turn still holds a clone of it.
fn release_lock(locks: &mut HashMap<ConversationId, Arc<Mutex<()>>>, id: &ConversationId) {
    if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
        locks.remove(id);
    }
}

/// Keep locks that belong to a live session or are held by a running turn.
fn sweep_idle_locks(inner: &mut Inner) {
    let Inner { sessions, locks, .. } = inner;
    locks.retain(|id, lock| sessions.contains_key(id) || Arc::strong_count(lock) > 1);
}

fn evict_least_recent(inner: &mut Inner) {
    let oldest = inner
        .sessions
        .values()
        .min_by_key(|s| s.touched)
        .map(|s| s.conversation.id.clone());
    if let Some(id) = oldest {
        debug!(conversation_id = %id, "Session cap reached, evicting least recent conversation");
        inner.sessions.remove(&id);
        release_lock(&mut inner.locks, &id);
    }
}

fn trim_turns(conversation: &mut Conversation, max_turns: usize) {
    let user_positions: Vec<usize> = conversation
        .messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == Role::User)
        .map(|(i, _)| i)
        .collect();
    if user_positions.len() <= max_turns {
        return;
    }
    let cut = user_positions[user_positions.len() - max_turns];
    conversation.messages.drain(..cut);
}
