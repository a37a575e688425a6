//! `POST /ask` — the query path: gate on index readiness, contextualize
//! follow-ups, retrieve, assemble an answer, and keep the conversation
//! history and rate-limit state in sync with what actually happened.

use std::collections::BTreeSet;

use chrono::Utc;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::assembler::ContextAssembler;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::indexing::deadline::format_deadline;
use crate::models::{AskRequest, AskResponse, AskStatus, IndexStatus, Source};
use crate::persistence::vector::collection_name;
use crate::retrieval::sender::detect_sender_from_query;
use crate::retrieval::scoring::ScoredChunk;
use crate::retrieval::HybridRetriever;
use crate::state::AppState;

const MOST_RECENT_WORDS: &[&str] = &["most recent", "latest", "newest", "last"];
const BROAD_SCOPE_WORDS: &[&str] = &["all", "list", "show"];

fn indexing_envelope(message: &str) -> AskResponse {
    AskResponse {
        answer: message.to_string(),
        sources: Vec::new(),
        status: AskStatus::Indexing,
        emails_found: 0,
        matched_keywords: Vec::new(),
        is_ready: false,
    }
}

fn no_results_envelope(sender_filter: Option<&str>) -> AskResponse {
    let answer = match sender_filter {
        Some(name) => format!("No emails found from '{name}'. Check the spelling or try a different name."),
        None => "No relevant emails found for your question.".to_string(),
    };
    AskResponse {
        answer,
        sources: Vec::new(),
        status: AskStatus::NoResults,
        emails_found: 0,
        matched_keywords: Vec::new(),
        is_ready: true,
    }
}

fn matched_keywords(question: &str, results: &[ScoredChunk]) -> Vec<String> {
    let keywords: BTreeSet<String> = question
        .to_lowercase()
        .split_whitespace()
        .map(String::from)
        .filter(|w| w.len() >= 3)
        .collect();

    keywords
        .into_iter()
        .filter(|kw| {
            results.iter().any(|r| {
                r.document_text.to_lowercase().contains(kw.as_str())
                    || r.metadata.sender.to_lowercase().contains(kw.as_str())
                    || r.metadata.subject.to_lowercase().contains(kw.as_str())
            })
        })
        .collect()
}

fn build_sources(results: &[ScoredChunk], now: chrono::DateTime<Utc>) -> Vec<Source> {
    results
        .iter()
        .map(|item| Source {
            email_id: item.metadata.message_id,
            sender: item.metadata.sender.clone(),
            subject: item.metadata.subject.clone(),
            date: item.metadata.date,
            relevance: (item.hybrid_score * 100.0 * 10.0).round() / 10.0,
            is_urgent: item.metadata.is_urgent,
            has_deadline: item.metadata.has_deadline,
            deadline: format_deadline(item.metadata.deadline_date, now),
            text: item.document_text.clone(),
            timestamp: item.metadata.timestamp,
        })
        .collect()
}

#[openapi(tag = "Ask")]
#[post("/ask", data = "<body>")]
pub async fn ask(
    user: AuthUser,
    body: Json<AskRequest>,
    state: &State<AppState>,
) -> Result<Json<AskResponse>, ApiError> {
    let question = body.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }

    let account = state
        .relational
        .get_user(user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;
    state.ensure_polling(&account);

    let index_state = state.lifecycle.status(user.user_id);

    match index_state.status {
        IndexStatus::Idle => {
            state.lifecycle.request_index(user.user_id);
            return Ok(Json(indexing_envelope(
                "Indexing started, please try again shortly.",
            )));
        }
        IndexStatus::Indexing => {
            return Ok(Json(indexing_envelope(
                "Still indexing your inbox, please try again shortly.",
            )));
        }
        _ => {}
    }

    let degraded = index_state.status == IndexStatus::Error;
    let already_rate_limited = index_state.status == IndexStatus::RateLimited;

    let history = state.with_history(user.user_id, |h| h.clone());
    let assembler = ContextAssembler::new(state.llm.as_ref(), state.config.max_context_chars());
    let effective_question = assembler.contextualize_query(question, &history).await;

    let lower = effective_question.to_lowercase();
    let sender_filter = detect_sender_from_query(&effective_question);
    let top_k = if sender_filter.is_some() {
        50
    } else if BROAD_SCOPE_WORDS.iter().any(|w| lower.contains(w)) {
        30
    } else {
        15
    };

    let collection = collection_name(&account.email_address);
    let retriever = HybridRetriever::new(state.embeddings.as_ref(), state.vectors.as_ref(), &state.query_cache);
    let mut results = retriever
        .search(user.user_id, &collection, &effective_question, top_k, sender_filter.as_deref())
        .await?;

    if sender_filter.is_some() && MOST_RECENT_WORDS.iter().any(|w| lower.contains(w)) {
        results.truncate(1);
    }

    if results.is_empty() {
        return Ok(Json(no_results_envelope(sender_filter.as_deref())));
    }

    let assembled = assembler
        .answer(&effective_question, &history, &results, already_rate_limited)
        .await;

    if assembled.rate_limited && !already_rate_limited {
        state.lifecycle.mark_rate_limited(user.user_id);
    }

    if assembled.used_llm {
        state.with_history(user.user_id, |h| {
            h.push("user", question.to_string());
            h.push("assistant", assembled.answer.clone());
        });
    }

    let answer = if degraded {
        format!("{}\n\n_Note: indexing previously failed; results may be incomplete._", assembled.answer)
    } else {
        assembled.answer
    };

    let status = if assembled.rate_limited {
        AskStatus::RateLimited
    } else if degraded {
        AskStatus::Error
    } else {
        AskStatus::Ok
    };

    Ok(Json(AskResponse {
        answer,
        sources: build_sources(&results, Utc::now()),
        status,
        emails_found: results.len(),
        matched_keywords: matched_keywords(&effective_question, &results),
        is_ready: true,
    }))
}
