//! Process-wide shared state: the collaborator trait objects, the index
//! lifecycle manager, per-user conversation history, and the mail
//! pollers — everything a route handler needs, managed as one Rocket
//! fairing state value rather than scattered `.manage()` calls.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use reqwest::Client;

use crate::assembler::conversation::ConversationHistory;
use crate::assembler::llm::LlmClient;
use crate::config::AppConfig;
use crate::embeddings::EmbeddingClient;
use crate::lifecycle::IndexLifecycleManager;
use crate::mail::gmail::GmailProvider;
use crate::mail::poller::PollerManager;
use crate::mail::MailProvider;
use crate::models::User;
use crate::persistence::vector::VectorStore;
use crate::persistence::RelationalStore;
use crate::retrieval::cache::QueryCache;

pub struct AppState {
    pub relational: Arc<dyn RelationalStore>,
    pub vectors: Arc<dyn VectorStore>,
    pub embeddings: Arc<dyn EmbeddingClient>,
    pub llm: Arc<dyn LlmClient>,
    pub lifecycle: Arc<IndexLifecycleManager>,
    pub query_cache: Arc<QueryCache>,
    pub conversations: DashMap<i32, Mutex<ConversationHistory>>,
    pub pollers: PollerManager,
    pub config: Arc<AppConfig>,
    pub http: Client,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        relational: Arc<dyn RelationalStore>,
        vectors: Arc<dyn VectorStore>,
        embeddings: Arc<dyn EmbeddingClient>,
        llm: Arc<dyn LlmClient>,
        lifecycle: Arc<IndexLifecycleManager>,
        query_cache: Arc<QueryCache>,
        config: Arc<AppConfig>,
        http: Client,
    ) -> Self {
        Self {
            relational,
            vectors,
            embeddings,
            llm,
            lifecycle,
            query_cache,
            conversations: DashMap::new(),
            pollers: PollerManager::new(),
            config,
            http,
        }
    }

    /// Run `f` against a user's conversation history, creating an empty
    /// one on first contact.
    pub fn with_history<R>(&self, user_id: i32, f: impl FnOnce(&mut ConversationHistory) -> R) -> R {
        let entry = self.conversations.entry(user_id).or_default();
        let mut guard = entry.lock();
        f(&mut guard)
    }

    /// Start the mail poller for a user if it isn't already running.
    /// Called lazily on a user's first authenticated request rather than
    /// eagerly at startup, since the credential needed to build the
    /// provider lives on the user row, not in process config.
    pub fn ensure_polling(&self, user: &User) {
        if self.pollers.is_running(user.user_id) {
            return;
        }

        let provider: Arc<dyn MailProvider> =
            Arc::new(GmailProvider::new(self.http.clone(), user.access_credential.clone()));

        self.pollers.start_for_user(
            user.user_id,
            provider,
            Arc::clone(&self.relational),
            Arc::clone(&self.lifecycle),
            self.config.polling_interval,
            self.config.initial_sync_cap,
            self.config.poll_cap,
        );
    }
}
