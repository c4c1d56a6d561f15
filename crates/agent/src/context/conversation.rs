//! Token-budgeted conversation transcript.
//!
//! An ordered log of role-tagged messages with a protected prefix (the
//! persona preamble) that is never evicted. When the estimated size goes
//! over budget the oldest unprotected messages are dropped first.

use issola_core::message::Message;
use std::collections::VecDeque;
use tracing::debug;

use super::token::{estimate_message_tokens, estimate_messages_tokens};

#[derive(Debug, Clone)]
pub struct ConversationMemory {
    protected: Vec<Message>,
    entries: VecDeque<Message>,
    budget: usize,
}

impl ConversationMemory {
    /// An empty transcript with a budget of `tokens`.
    pub fn with_budget(tokens: usize) -> Self {
        Self {
            protected: Vec::new(),
            entries: VecDeque::new(),
            budget: tokens,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Add a message to the protected prefix. Protected messages always come
    /// first in [`snapshot`](Self::snapshot) and are never evicted.
    pub fn protect(&mut self, message: Message) {
        self.protected.push(message);
    }

    /// Append a message, then prune to budget.
    pub fn append(&mut self, message: Message) {
        self.entries.push_back(message);
        self.prune();
    }

    /// Protected prefix followed by the remaining messages, in order.
    pub fn snapshot(&self) -> Vec<Message> {
        self.protected
            .iter()
            .chain(self.entries.iter())
            .cloned()
            .collect()
    }

    /// Messages after the protected prefix, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    /// Estimated tokens of everything held, protected prefix included.
    pub fn estimate_size(&self) -> usize {
        estimate_messages_tokens(&self.protected)
            + self.entries.iter().map(estimate_message_tokens).sum::<usize>()
    }

    /// Evict the oldest unprotected messages until within budget.
    ///
    /// Returns how many were evicted. Running it again right away evicts
    /// nothing.
    pub fn prune(&mut self) -> usize {
        let mut size = self.estimate_size();
        let mut evicted = 0;
        while size > self.budget {
            let Some(oldest) = self.entries.pop_front() else {
                break;
            };
            size -= estimate_message_tokens(&oldest);
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, size, budget = self.budget, "Pruned conversation memory");
        }
        evicted
    }

    /// Evict the single oldest unprotected message regardless of budget.
    /// Returns `false` when there is nothing left to evict.
    pub fn shrink(&mut self) -> bool {
        self.entries.pop_front().is_some()
    }

    /// Number of messages that [`shrink`](Self::shrink) could still evict.
    pub fn evictable(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.protected.len() + self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::token::estimate_message_tokens;

    // 40 chars → 10 tokens + 4 overhead = 14 per message
    fn msg(i: usize) -> Message {
        Message::user(format!("{i:0>40}"))
    }

    #[test]
    fn protected_preamble_survives_pruning() {
        let preamble = Message::system("You are Issola.");
        let preamble_size = estimate_message_tokens(&preamble);
        let mut memory = ConversationMemory::with_budget(preamble_size + 14 * 3);
        memory.protect(preamble.clone());

        for i in 0..5 {
            memory.append(msg(i));
        }

        let snapshot = memory.snapshot();
        assert_eq!(snapshot[0], preamble);
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot[1].content, msg(2).content);
        assert!(memory.estimate_size() <= memory.budget());
    }

    #[test]
    fn evicts_exactly_the_oldest_n() {
        let mut memory = ConversationMemory::with_budget(usize::MAX);
        for i in 0..6 {
            memory.append(msg(i));
        }
        let over_budget = memory.estimate_size();
        // Leave room for four messages: the two oldest must go.
        memory.budget = over_budget - 2 * 14;
        assert_eq!(memory.prune(), 2);
        let contents: Vec<String> = memory.recent().map(|m| m.content.clone()).collect();
        let expected: Vec<String> = (2..6).map(|i| msg(i).content).collect();
        assert_eq!(contents, expected);
    }

    #[test]
    fn prune_is_idempotent() {
        let mut memory = ConversationMemory::with_budget(50);
        memory.protect(Message::system("persona"));
        for i in 0..10 {
            memory.append(msg(i));
        }
        let once = memory.snapshot();
        assert_eq!(memory.prune(), 0);
        assert_eq!(memory.snapshot(), once);
    }

    #[test]
    fn oversized_preamble_keeps_preamble_only() {
        let mut memory = ConversationMemory::with_budget(5);
        memory.protect(Message::system("x".repeat(100)));
        memory.append(msg(0));
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.evictable(), 0);
    }

    #[test]
    fn shrink_drops_one_oldest_entry() {
        let mut memory = ConversationMemory::with_budget(usize::MAX);
        memory.protect(Message::system("persona"));
        memory.append(msg(0));
        memory.append(msg(1));

        assert!(memory.shrink());
        let snapshot = memory.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[1].content, msg(1).content);
        assert!(memory.shrink());
        assert!(!memory.shrink());
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn content_is_never_modified() {
        let mut memory = ConversationMemory::with_budget(usize::MAX);
        let original = Message::assistant("  {\"command\": {\"name\": \"google\"}}\t");
        memory.append(original.clone());
        assert_eq!(memory.snapshot()[0], original);
    }
}
