//! Context Window Management
//!
//! Picks the slice of conversation history that accompanies a new query:
//! the most recent turns, capped by count and by approximate tokens.

use crate::memory::store::ConversationHistory;
use crate::models::Turn;
use tracing::debug;

/// Configuration for context window management
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Most turns handed to a query.
    pub max_turns: usize,
    /// Token budget for the selected turns.
    pub max_context_tokens: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            max_context_tokens: 4_000,
        }
    }
}

pub struct ContextManager {
    config: ContextConfig,
}

impl ContextManager {
    pub fn new() -> Self {
        Self {
            config: ContextConfig::default(),
        }
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Recent turns, oldest first. Stops at the first turn that would
    /// overflow the token budget, so the selection is always contiguous.
    pub fn select_turns(&self, history: &ConversationHistory) -> Vec<Turn> {
        let mut used = 0;
        let mut selected: Vec<Turn> = Vec::with_capacity(self.config.max_turns);

        for message in history.recent_messages(self.config.max_turns) {
            if used + message.token_count > self.config.max_context_tokens {
                debug!(
                    used,
                    budget = self.config.max_context_tokens,
                    "context budget reached"
                );
                break;
            }
            used += message.token_count;
            selected.push(message.to_turn());
        }

        selected.reverse();
        selected
    }

    /// Share of the token budget the whole history would take.
    pub fn usage_percent(&self, history: &ConversationHistory) -> f32 {
        (history.total_tokens() as f32 / self.config.max_context_tokens as f32) * 100.0
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::store::ConversationMessage;
    use crate::models::Role;

    #[test]
    fn test_context_manager_creation() {
        let manager = ContextManager::new();
        assert_eq!(manager.config().max_turns, 10);
    }

    #[test]
    fn test_select_turns_keeps_recent_in_order() {
        let manager = ContextManager::with_config(ContextConfig {
            max_turns: 3,
            max_context_tokens: 1_000,
        });
        let mut history = ConversationHistory::new();
        for i in 0..6 {
            history.add_message(ConversationMessage::new(Role::User, format!("Question {}", i)));
        }

        let turns = manager.select_turns(&history);
        let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["Question 3", "Question 4", "Question 5"]);
    }

    #[test]
    fn test_select_turns_respects_token_budget() {
        let manager = ContextManager::with_config(ContextConfig {
            max_turns: 10,
            max_context_tokens: 30,
        });
        let mut history = ConversationHistory::new();
        history.add_message(ConversationMessage::new(Role::User, "x".repeat(200)));
        history.add_message(ConversationMessage::new(Role::Assistant, "short answer"));

        let turns = manager.select_turns(&history);
        assert_eq!(turns, vec![Turn::assistant("short answer")]);
        assert!(manager.usage_percent(&history) > 100.0);
    }
}
