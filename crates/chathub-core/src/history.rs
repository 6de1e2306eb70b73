//! Bounded per-room message history.

use chathub_protocol::ChatMessage;
use dashmap::DashMap;
use std::collections::VecDeque;

/// Default number of messages kept per scope.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Recent messages per scope, oldest evicted first.
#[derive(Debug)]
pub struct HistoryBuffer {
    capacity: usize,
    scopes: DashMap<String, VecDeque<ChatMessage>>,
}

impl HistoryBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            scopes: DashMap::new(),
        }
    }

    /// Append a message, evicting the oldest entries past capacity.
    pub fn append(&self, scope: &str, message: ChatMessage) {
        let mut log = self.scopes.entry(scope.to_string()).or_default();
        log.push_back(message);
        while log.len() > self.capacity {
            log.pop_front();
        }
    }

    /// Copy of a scope's messages, oldest first.
    #[must_use]
    pub fn snapshot(&self, scope: &str) -> Vec<ChatMessage> {
        self.scopes
            .get(scope)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self, scope: &str) -> usize {
        self.scopes.get(scope).map(|log| log.len()).unwrap_or(0)
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
