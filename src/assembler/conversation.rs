//! Bounded per-user conversation history and follow-up query rewriting.

use std::collections::VecDeque;

const MAX_TURNS: usize = 20;
const REWRITE_CONTEXT_TURNS: usize = 4;
const LLM_HISTORY_TURNS: usize = 10;

const BACKREFERENCE_KEYWORDS: &[&str] = &[
    "he", "she", "they", "it", "that", "this", "those", "the email", "that email", "when was",
    "what did he", "what did she", "reply", "same",
];

#[derive(Debug, Clone)]
pub struct Turn {
    pub role: String,
    pub content: String,
}

/// A single user's conversation, capped to the most recent turns so it
/// can't grow unbounded across a long-lived session.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: VecDeque<Turn>,
}

impl ConversationHistory {
    pub fn push(&mut self, role: impl Into<String>, content: impl Into<String>) {
        self.turns.push_back(Turn {
            role: role.into(),
            content: content.into(),
        });
        while self.turns.len() > MAX_TURNS {
            self.turns.pop_front();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Turns to include in the LLM prompt, oldest first, capped at the
    /// most recent 10.
    pub fn llm_window(&self) -> Vec<&Turn> {
        let skip = self.turns.len().saturating_sub(LLM_HISTORY_TURNS);
        self.turns.iter().skip(skip).collect()
    }

    fn rewrite_window(&self) -> Vec<&Turn> {
        let skip = self.turns.len().saturating_sub(REWRITE_CONTEXT_TURNS);
        self.turns.iter().skip(skip).collect()
    }

    /// True when `question` reads as a follow-up that needs the
    /// preceding conversation to stand alone (pronouns, backreferences).
    pub fn needs_context(&self, question: &str) -> bool {
        if self.turns.is_empty() {
            return false;
        }
        let lower = question.to_lowercase();
        BACKREFERENCE_KEYWORDS.iter().any(|kw| lower.contains(kw))
    }

    /// The text handed to the query-rewriting LLM call: the last few
    /// turns rendered as `role: content` lines.
    pub fn rewrite_prompt_history(&self) -> String {
        self.rewrite_window()
            .iter()
            .map(|t| format!("{}: {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_history_length() {
        let mut history = ConversationHistory::default();
        for i in 0..30 {
            history.push("user", format!("question {i}"));
        }
        assert_eq!(history.turns.len(), MAX_TURNS);
        assert_eq!(history.turns.front().unwrap().content, "question 10");
    }

    #[test]
    fn detects_backreference_keywords() {
        let mut history = ConversationHistory::default();
        assert!(!history.needs_context("when was that email sent?"));
        history.push("user", "who emailed me about the budget?");
        assert!(history.needs_context("when was that email sent?"));
        assert!(!history.needs_context("show me emails about travel"));
    }

    #[test]
    fn llm_window_caps_at_ten_turns() {
        let mut history = ConversationHistory::default();
        for i in 0..15 {
            history.push("user", format!("turn {i}"));
        }
        assert_eq!(history.llm_window().len(), 10);
        assert_eq!(history.llm_window()[0].content, "turn 5");
    }
}
