//! Context assembly, the LLM rate-limit gate, and follow-up query
//! rewriting — the last hop before a question becomes an answer.

pub mod conversation;
pub mod llm;

use chrono::{DateTime, Utc};

use crate::indexing::deadline::format_deadline;
use crate::retrieval::scoring::ScoredChunk;
use conversation::ConversationHistory;
use llm::{fallback_answer, ChatMessage, LlmClient, LlmError};

const MAX_RESPONSE_TOKENS: u32 = 1000;
const ANSWER_TEMPERATURE: f32 = 0.05;
const REWRITE_TEMPERATURE: f32 = 0.0;
const REWRITE_MAX_TOKENS: u32 = 100;
const EMAIL_BODY_PREVIEW_CHARS: usize = 800;
const TRUNCATION_MARKER_MIN_REMAINING: usize = 200;

pub struct ContextAssembler<'a> {
    llm: &'a dyn LlmClient,
    max_context_chars: usize,
}

/// Outcome of a single `/ask` turn: the rendered answer, whether it came
/// from the LLM path (gates whether this turn is appended to history),
/// and whether the LLM path is currently rate-limited.
pub struct AssembledAnswer {
    pub answer: String,
    pub used_llm: bool,
    pub rate_limited: bool,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(llm: &'a dyn LlmClient, max_context_chars: usize) -> Self {
        Self { llm, max_context_chars }
    }

    /// Rewrite a follow-up question into a standalone one when it reads
    /// as depending on the preceding conversation. Falls back silently
    /// to the original question on any LLM failure.
    pub async fn contextualize_query(&self, question: &str, history: &ConversationHistory) -> String {
        if !history.needs_context(question) {
            return question.to_string();
        }

        let history_text = history.rewrite_prompt_history();
        let messages = [
            ChatMessage::new(
                "system",
                "Rewrite the follow-up question as a standalone question using the conversation history. Return ONLY the rewritten question, nothing else.",
            ),
            ChatMessage::new(
                "user",
                format!("History:\n{history_text}\n\nFollow-up question: {question}\n\nRewritten standalone question:"),
            ),
        ];

        match self.llm.chat(&messages, REWRITE_TEMPERATURE, REWRITE_MAX_TOKENS).await {
            Ok(rewritten) if !rewritten.trim().is_empty() => {
                log::debug!("query rewritten: '{question}' -> '{rewritten}'");
                rewritten
            }
            _ => question.to_string(),
        }
    }

    /// Build the answer for an already-gated, already-retrieved set of
    /// results: skips the LLM entirely when `rate_limited` is set,
    /// otherwise assembles the prompt and calls it, degrading to the
    /// fallback formatter on a rate-limit response.
    pub async fn answer(
        &self,
        original_question: &str,
        history: &ConversationHistory,
        results: &[ScoredChunk],
        already_rate_limited: bool,
    ) -> AssembledAnswer {
        if already_rate_limited {
            return AssembledAnswer {
                answer: format!(
                    "{}\n\n_Note: LLM rate limited. Try again later._",
                    fallback_answer(results)
                ),
                used_llm: false,
                rate_limited: true,
            };
        }

        let now = Utc::now();
        let total = results.len();
        let question_lower = original_question.to_lowercase();
        let highlight_urgency = ["urgent", "asap", "critical", "immediate"]
            .iter()
            .any(|w| question_lower.contains(w));
        let highlight_deadline = ["deadline", "due"].iter().any(|w| question_lower.contains(w));

        let context_parts: Vec<String> = results
            .iter()
            .enumerate()
            .map(|(i, item)| render_email_block(i + 1, item, now))
            .collect();
        let trimmed = trim_context_to_char_limit(context_parts, self.max_context_chars);
        let context = trimmed.join("\n\n");

        let system_prompt = build_system_prompt(total, highlight_urgency, highlight_deadline);
        let user_prompt =
            format!("Emails (NEWEST FIRST):\n\n{context}\n\nQuestion: {original_question}\n\nAnswer concisely:");

        let mut messages = vec![ChatMessage::new("system", system_prompt)];
        for turn in history.llm_window() {
            messages.push(ChatMessage::new(turn.role.clone(), turn.content.clone()));
        }
        messages.push(ChatMessage::new("user", user_prompt));

        match self.llm.chat(&messages, ANSWER_TEMPERATURE, MAX_RESPONSE_TOKENS).await {
            Ok(answer) => AssembledAnswer {
                answer,
                used_llm: true,
                rate_limited: false,
            },
            Err(LlmError::RateLimited) => {
                log::warn!("llm rate limited, falling back to deterministic formatter");
                AssembledAnswer {
                    answer: format!(
                        "{}\n\n_Note: LLM rate limited. Try again in ~2 hours._",
                        fallback_answer(results)
                    ),
                    used_llm: false,
                    rate_limited: true,
                }
            }
            Err(err) => AssembledAnswer {
                answer: format!("Error generating answer: {err}"),
                used_llm: false,
                rate_limited: false,
            },
        }
    }
}

fn render_email_block(index: usize, item: &ScoredChunk, now: DateTime<Utc>) -> String {
    let deadline_display = format_deadline(item.metadata.deadline_date, now);
    let urgency_status = if item.metadata.is_urgent { "YES" } else { "NO" };
    let content: String = item.document_text.chars().take(EMAIL_BODY_PREVIEW_CHARS).collect();

    format!(
        "EMAIL {index}:\nSubject: {}\nFrom: {}\nDate: {}\nUrgent: {urgency_status}\nDeadline: {deadline_display}\nContent: {content}",
        item.metadata.subject,
        item.metadata.sender,
        item.metadata.date.to_rfc3339(),
    )
}

fn build_system_prompt(total_emails: usize, highlight_urgency: bool, highlight_deadline: bool) -> String {
    let format_instruction = if total_emails == 1 {
        "Show: Subject, From, Date, Key content".to_string()
    } else {
        format!("List all {total_emails} emails newest first. Be concise per email.")
    };

    format!(
        "You are an email assistant. You have {total_emails} email(s) retrieved from the user's inbox, ordered newest first.\n\n\
         Rules:\n\
         - Use ONLY the provided email content. Do not hallucinate or invent details.\n\
         - Maintain newest-first order.\n\
         - {format_instruction}\n\
         - Highlight urgency: {}\n\
         - Highlight deadlines: {}\n\
         - You have access to previous conversation history. Use it to understand follow-up questions.",
        if highlight_urgency { "YES — call it out clearly" } else { "only if relevant" },
        if highlight_deadline { "YES — call out dates" } else { "only if relevant" },
    )
}

/// Keep adding context blocks until the char budget runs out; append a
/// truncation marker to the block that overflows, but only when enough
/// of it would otherwise survive (fewer than 200 chars left isn't worth it).
fn trim_context_to_char_limit(parts: Vec<String>, max_chars: usize) -> Vec<String> {
    let total: usize = parts.iter().map(|p| p.len()).sum();
    if total <= max_chars {
        return parts;
    }

    let mut trimmed = Vec::new();
    let mut used = 0usize;
    for part in parts {
        if used + part.len() > max_chars {
            let remaining = max_chars.saturating_sub(used);
            if remaining > TRUNCATION_MARKER_MIN_REMAINING {
                let truncated: String = part.chars().take(remaining).collect();
                trimmed.push(format!("{truncated}...[truncated]"));
            }
            break;
        }
        used += part.len();
        trimmed.push(part);
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_when_under_budget_returns_unchanged() {
        let parts = vec!["a".repeat(100), "b".repeat(100)];
        let trimmed = trim_context_to_char_limit(parts.clone(), 1000);
        assert_eq!(trimmed, parts);
    }

    #[test]
    fn trims_and_marks_truncation_when_over_budget() {
        let parts = vec!["a".repeat(100), "b".repeat(500)];
        let trimmed = trim_context_to_char_limit(parts, 150);
        assert_eq!(trimmed.len(), 2);
        assert!(trimmed[1].ends_with("...[truncated]"));
    }

    #[test]
    fn drops_tail_block_when_remaining_budget_too_small() {
        let parts = vec!["a".repeat(990), "b".repeat(500)];
        let trimmed = trim_context_to_char_limit(parts, 1000);
        assert_eq!(trimmed.len(), 1);
    }

    #[test]
    fn system_prompt_reflects_single_vs_multi_email() {
        let single = build_system_prompt(1, false, false);
        assert!(single.contains("Show: Subject, From, Date, Key content"));
        let multi = build_system_prompt(3, true, true);
        assert!(multi.contains("List all 3 emails"));
        assert!(multi.contains("call it out clearly"));
    }
}
