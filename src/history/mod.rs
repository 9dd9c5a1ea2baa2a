//! Bounded history of completed command exchanges
//!
//! Newest-first, capacity-bounded, append-only with tail eviction. One
//! entry per completed command cycle, recorded exactly once.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of exchanges retained
pub const HISTORY_CAPACITY: usize = 10;

/// A completed command exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The command text as dispatched
    pub command: String,

    /// The spoken response (interpreter reply or the apology substitute)
    pub response: String,

    /// When the exchange completed
    pub occurred_at: DateTime<Utc>,
}

/// Ordered log of past exchanges, newest first
#[derive(Debug)]
pub struct HistoryStore {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl HistoryStore {
    /// Create an empty store with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// Create an empty store with an explicit capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepend an entry, evicting the oldest once over capacity
    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Snapshot of current contents, newest first
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}
