//! Per-user rolling conversation cache.
//!
//! Keyed by `user_id`, in-memory only, cleared on process restart. Each new
//! run gets the last few turns prepended so short follow-ups keep context.

use std::collections::VecDeque;

use dashmap::DashMap;

use crate::message::Message;

pub struct SessionCache {
    /// Retained user/assistant turns; the message cap is twice this.
    turns: usize,
    map: DashMap<String, VecDeque<Message>>,
}

impl SessionCache {
    pub fn new(turns: usize) -> Self {
        Self {
            turns,
            map: DashMap::new(),
        }
    }

    /// Appends the request messages to the user's history and returns the
    /// rolling window ending with them. The window is what a run starts from.
    pub fn record_and_window(&self, user_id: &str, messages: &[Message]) -> Vec<Message> {
        let mut entry = self.map.entry(user_id.to_string()).or_default();
        entry.extend(messages.iter().cloned());
        let cap = self.turns.saturating_mul(2).max(messages.len());
        while entry.len() > cap {
            entry.pop_front();
        }
        entry.iter().cloned().collect()
    }

    pub fn clear(&self, user_id: &str) {
        self.map.remove(user_id);
    }
}
