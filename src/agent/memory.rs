use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConversationThread {
    pub thread_id: String,
    pub turns: Vec<Turn>,
}

impl ConversationThread {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            turns: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// At most the last `max_turns` turns, starting at a user turn.
    pub fn recent(&self, max_turns: usize) -> &[Turn] {
        let window = &self.turns[self.turns.len().saturating_sub(max_turns)..];
        match window.iter().position(|turn| turn.role == Role::User) {
            Some(offset) => &window[offset..],
            None => &[],
        }
    }

    /// Drops everything older than [`ConversationThread::recent`].
    pub fn retain_recent(&mut self, max_turns: usize) {
        let kept = self.recent(max_turns).len();
        let dropped = self.turns.len() - kept;
        self.turns.drain(..dropped);
    }

    fn last_active(&self) -> Option<DateTime<Utc>> {
        self.turns.last().map(|turn| turn.at)
    }
}

pub const DEFAULT_MAX_THREADS: usize = 1000;

/// In-process conversation memory keyed by thread id.
///
/// Each thread sits behind its own async mutex: a turn holds it from start to
/// commit, so turns on one thread run one after another while distinct threads
/// never contend. Once `max_threads` are held, opening a new thread evicts
/// the least recently active one that nobody is using.
#[derive(Debug)]
pub struct ThreadStore {
    threads: Mutex<HashMap<String, SharedThread>>,
    max_threads: usize,
}

type SharedThread = Arc<tokio::sync::Mutex<ConversationThread>>;

impl Default for ThreadStore {
    fn default() -> Self {
        Self::with_max_threads(DEFAULT_MAX_THREADS)
    }
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_threads(max_threads: usize) -> Self {
        Self {
            threads: Mutex::new(HashMap::new()),
            max_threads: max_threads.max(1),
        }
    }

    pub fn thread(&self, thread_id: &str) -> SharedThread {
        let mut threads = self.threads.lock().unwrap_or_else(|p| p.into_inner());
        if !threads.contains_key(thread_id) && threads.len() >= self.max_threads {
            evict_idle(&mut threads);
        }
        Arc::clone(
            threads
                .entry(thread_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(ConversationThread::new(thread_id)))),
        )
    }

    pub async fn history(&self, thread_id: &str) -> Vec<Turn> {
        let thread = {
            let threads = self.threads.lock().unwrap_or_else(|p| p.into_inner());
            threads.get(thread_id).cloned()
        };
        match thread {
            Some(thread) => thread.lock().await.turns.clone(),
            None => Vec::new(),
        }
    }

    /// Empties a thread. Returns false when the thread never existed.
    pub async fn clear(&self, thread_id: &str) -> bool {
        let thread = {
            let threads = self.threads.lock().unwrap_or_else(|p| p.into_inner());
            threads.get(thread_id).cloned()
        };
        match thread {
            Some(thread) => {
                thread.lock().await.turns.clear();
                true
            }
            None => false,
        }
    }

    pub fn thread_ids(&self) -> Vec<String> {
        let threads = self.threads.lock().unwrap_or_else(|p| p.into_inner());
        let mut ids: Vec<String> = threads.keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn evict_idle(threads: &mut HashMap<String, SharedThread>) {
    let oldest = threads
        .iter()
        .filter(|(_, handle)| Arc::strong_count(handle) == 1)
        .filter_map(|(id, handle)| {
            let thread = handle.try_lock().ok()?;
            Some((thread.last_active(), id.clone()))
        })
        .min()
        .map(|(_, id)| id);
    if let Some(id) = oldest {
        log::debug!("evicting idle thread '{}'", id);
        threads.remove(&id);
    }
}
