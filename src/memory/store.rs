//! Conversation history storage
//!
//! Session-local record of prior questions and answers, kept by the caller
//! and handed to each query as its history. Never persisted.

use crate::models::{Role, Turn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// A single message in the conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub message_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
    /// Approximate token count for context window management
    pub token_count: usize,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        let content = content.into();
        let token_count = (content.len() + 3) / 4;

        Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role,
            content,
            token_count,
        }
    }

    pub fn to_turn(&self) -> Turn {
        Turn {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Conversation history for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    messages: VecDeque<ConversationMessage>,
    total_tokens: usize,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            messages: VecDeque::new(),
            total_tokens: 0,
        }
    }

    pub fn add_message(&mut self, message: ConversationMessage) {
        self.total_tokens += message.token_count;
        self.messages.push_back(message);
        self.updated_at = Utc::now();
    }

    /// Append one answered question as a user turn and an assistant turn.
    pub fn record_exchange(&mut self, query: &str, answer: &str) {
        self.add_message(ConversationMessage::new(Role::User, query));
        self.add_message(ConversationMessage::new(Role::Assistant, answer));
    }

    // =============================
    // Iterators (ZERO ALLOCATION)
    // =============================

    pub fn messages(&self) -> impl Iterator<Item = &ConversationMessage> {
        self.messages.iter()
    }

    /// The `count` most recent messages, newest first.
    pub fn recent_messages(
        &self,
        count: usize,
    ) -> impl DoubleEndedIterator<Item = &ConversationMessage> {
        self.messages.iter().rev().take(count)
    }

    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Recompute token count (prevents drift)
    fn recompute_total_tokens(&mut self) {
        self.total_tokens = self.messages.iter().map(|m| m.token_count).sum();
    }

    /// Drop everything but the last `keep_count` messages.
    pub fn trim_to_recent(&mut self, keep_count: usize) {
        while self.messages.len() > keep_count {
            self.messages.pop_front();
        }

        self.recompute_total_tokens();
        self.updated_at = Utc::now();
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.total_tokens = 0;
        self.updated_at = Utc::now();
    }
}
