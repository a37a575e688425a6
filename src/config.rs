//! Process-wide configuration, loaded once at startup from the environment.
//!
//! Mirrors the `env_string`/`env_usize`/`env_bool` helper pattern used by
//! `search::config` and `auth::config` in the surrounding codebase.

use std::env;
use std::time::Duration;

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

/// Tunables for the index lifecycle, retrieval, and ingestion subsystems.
///
/// Every field corresponds to a key in the configuration table of the
/// system's specification; defaults match that table exactly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Periodic sweep cadence for the index lifecycle worker.
    pub reindex_interval: Duration,
    /// Base backoff for index retry (linear: `retry_delay * attempt`).
    pub retry_delay: Duration,
    /// Retry attempts before a user's index transitions to `error`.
    pub max_retries: u32,
    /// Query-cache entry lifetime.
    pub cache_ttl: Duration,
    /// Characters per vector chunk.
    pub chunk_size: usize,
    /// Prompt context budget, in tokens (converted to characters at a fixed ratio).
    pub max_context_tokens: usize,
    /// Characters assumed per token when budgeting LLM context.
    pub chars_per_token: usize,
    /// LLM rate-limit cooldown window.
    pub rate_limit_cooldown: Duration,
    /// Mail poller cadence, per user.
    pub polling_interval: Duration,
    /// Initial sync cap (messages fetched when no watermark exists yet).
    pub initial_sync_cap: u32,
    /// Steady-state poll cap (messages fetched per cycle once a watermark exists).
    pub poll_cap: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            reindex_interval: Duration::from_secs(env_u64("REINDEX_INTERVAL_SECONDS", 300)),
            retry_delay: Duration::from_secs(env_u64("RETRY_DELAY_SECONDS", 30)),
            max_retries: env_u64("MAX_RETRIES", 3) as u32,
            cache_ttl: Duration::from_secs(env_u64("CACHE_TTL_SECONDS", 300)),
            chunk_size: env_usize("CHUNK_SIZE", 800),
            max_context_tokens: env_usize("MAX_CONTEXT_TOKENS", 4000),
            chars_per_token: env_usize("CHARS_PER_TOKEN", 4),
            rate_limit_cooldown: Duration::from_secs(env_u64("RATE_LIMIT_COOLDOWN_SECONDS", 7200)),
            polling_interval: Duration::from_secs(env_u64("POLLING_INTERVAL_SECONDS", 60)),
            initial_sync_cap: env_u64("INITIAL_SYNC_CAP", 500) as u32,
            poll_cap: env_u64("POLL_CAP", 100) as u32,
        }
    }

    pub fn max_context_chars(&self) -> usize {
        self.max_context_tokens * self.chars_per_token
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Connection details for external collaborators (embeddings + LLM services).
///
/// These are HTTP services out of the core's scope; the core only depends on
/// the [`crate::embeddings::EmbeddingClient`] and [`crate::assembler::llm::LlmClient`]
/// traits. This struct wires the default `reqwest`-backed adapters.
#[derive(Debug, Clone)]
pub struct CollaboratorConfig {
    pub embeddings_url: String,
    pub vector_store_url: String,
    pub llm_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
}

impl CollaboratorConfig {
    pub fn from_env() -> Self {
        Self {
            embeddings_url: env_string("EMBEDDINGS_URL", "http://localhost:8081"),
            vector_store_url: env_string("VECTOR_STORE_URL", "http://localhost:8082"),
            llm_url: env_string("LLM_URL", "https://api.groq.com/openai/v1"),
            llm_api_key: env::var("LLM_API_KEY").ok(),
            llm_model: env_string("LLM_MODEL", "llama-3.1-8b-instant"),
        }
    }
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
