#[macro_use]
extern crate rocket;

pub mod assembler;
pub mod auth;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod indexing;
pub mod lifecycle;
pub mod mail;
pub mod models;
pub mod persistence;
pub mod request_logger;
pub mod retrieval;
pub mod routes;
pub mod state;

use std::sync::Arc;

use db::InboxDb;
use env_logger::Env;
use request_logger::RequestLogger;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::sync::Once;

use assembler::llm::HttpLlmClient;
use auth::AuthConfig;
use config::{AppConfig, CollaboratorConfig};
use embeddings::HttpEmbeddingClient;
use indexing::Indexer;
use lifecycle::{IndexExecutor, IndexLifecycleManager};
use persistence::relational::PgRelationalStore;
use persistence::vector::http::HttpVectorStore;
use retrieval::cache::QueryCache;
use state::AppState;

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

pub fn rocket() -> Rocket<Build> {
    init_logger();
    log::info!("starting inbox RAG server");

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get, Method::Post, Method::Put, Method::Delete, Method::Patch]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(InboxDb::init())
        .attach(cors)
        .attach(AdHoc::try_on_ignite("Run Migrations", |rocket| async move {
            match InboxDb::fetch(&rocket) {
                Some(db) => {
                    let pool = (**db).clone();
                    match sqlx::migrate!("./migrations").run(&pool).await {
                        Ok(_) => {
                            log::info!("database migrations successful");
                            Ok(rocket)
                        }
                        Err(e) => {
                            log::error!("database migrations failed: {}", e);
                            Err(rocket)
                        }
                    }
                }
                None => {
                    log::error!("database pool not available for migrations");
                    Err(rocket)
                }
            }
        }))
        .attach(AdHoc::try_on_ignite("Init Auth Config", |rocket| async move {
            match AuthConfig::from_env() {
                Ok(config) => Ok(rocket.manage(config)),
                Err(err) => {
                    log::error!("failed to load auth config: {}", err);
                    Err(rocket)
                }
            }
        }))
        .attach(AdHoc::try_on_ignite("Init App State", |rocket| async move {
            let pool = match InboxDb::fetch(&rocket) {
                Some(db) => (**db).clone(),
                None => {
                    log::error!("database pool not available for app state");
                    return Err(rocket);
                }
            };

            let app_config = Arc::new(AppConfig::from_env());
            let collaborators = CollaboratorConfig::from_env();
            let http = reqwest::Client::new();

            let relational = Arc::new(PgRelationalStore::new(pool));
            let vectors = Arc::new(HttpVectorStore::new(collaborators.vector_store_url.clone(), http.clone()));
            let embeddings = Arc::new(HttpEmbeddingClient::new(collaborators.embeddings_url.clone(), http.clone()));
            let llm = Arc::new(HttpLlmClient::new(
                collaborators.llm_url.clone(),
                collaborators.llm_api_key.clone(),
                collaborators.llm_model.clone(),
                http.clone(),
            ));
            let query_cache = Arc::new(QueryCache::new(app_config.cache_ttl));

            let indexer: Arc<dyn IndexExecutor> = Arc::new(Indexer::new(
                relational.clone() as Arc<dyn persistence::RelationalStore>,
                embeddings.clone() as Arc<dyn embeddings::EmbeddingClient>,
                vectors.clone() as Arc<dyn persistence::vector::VectorStore>,
                query_cache.clone(),
                app_config.chunk_size,
            ));

            let lifecycle = IndexLifecycleManager::new(
                indexer,
                app_config.reindex_interval,
                app_config.retry_delay,
                app_config.max_retries,
                app_config.rate_limit_cooldown,
            );
            lifecycle.start();

            let state = AppState::new(
                relational as Arc<dyn persistence::RelationalStore>,
                vectors as Arc<dyn persistence::vector::VectorStore>,
                embeddings as Arc<dyn embeddings::EmbeddingClient>,
                llm as Arc<dyn assembler::llm::LlmClient>,
                lifecycle,
                query_cache,
                app_config,
                http,
            );

            Ok(rocket.manage(state))
        }))
        .mount(
            "/",
            openapi_get_routes![
                routes::health::health,
                routes::index::trigger_index,
                routes::status::status,
                routes::status::stats,
                routes::ask::ask,
                routes::admin::admin_status,
                routes::email::list_emails,
                routes::email::send_email,
            ],
        )
        .mount(
            "/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Inbox RAG API", "../../openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::{DateTime, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header as JwtHeader};
    use parking_lot::Mutex;
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use serde::Serialize;

    use crate::assembler::llm::{ChatMessage, LlmClient, LlmError};
    use crate::auth::AuthConfig;
    use crate::config::AppConfig;
    use crate::embeddings::{EmbeddingClient, EmbeddingError};
    use crate::lifecycle::{IndexExecutor, IndexLifecycleManager, IndexRunOutcome, IndexingError};
    use crate::models::{ChunkMetadata, User};
    use crate::persistence::relational::{NewMessage, RelationalStore};
    use crate::persistence::vector::{VectorQueryResult, VectorStore, VectorStoreError};
    use crate::retrieval::cache::QueryCache;
    use crate::state::AppState;

    /// Builder for constructing Rocket instances tailored for integration
    /// tests, without a database: routes that need one take fakes
    /// through managed state instead of a pooled connection.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
            }
        }

        /// Mount routes at a base path.
        pub fn mount_routes(mut self, base: &str, routes: Vec<Route>) -> Self {
            self.mounts.push((base.to_string(), routes));
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment);
            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }
            rocket
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }

    /// Test-only auth config paired with a helper that mints tokens it
    /// will itself accept.
    pub fn test_auth_config() -> AuthConfig {
        AuthConfig {
            issuer: "https://inbox-rag.test".to_string(),
            audience: "inbox-rag-api".to_string(),
            hmac_secret: "test-secret-do-not-use-in-prod".to_string(),
        }
    }

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        iss: String,
        aud: String,
        exp: i64,
    }

    /// Mint a bearer token `AuthUser` will accept against [`test_auth_config`].
    pub fn issue_test_token(config: &AuthConfig, user_id: i32) -> String {
        let claims = TestClaims {
            sub: user_id.to_string(),
            iss: config.issuer.clone(),
            aud: config.audience.clone(),
            exp: (Utc::now().timestamp()) + 3600,
        };
        encode(
            &JwtHeader::default(),
            &claims,
            &EncodingKey::from_secret(config.hmac_secret.as_bytes()),
        )
        .expect("valid test token")
    }

    /// In-memory [`RelationalStore`]: enough for route-level tests that
    /// need a user to exist and messages to list, without a database.
    #[derive(Default)]
    pub struct FakeRelationalStore {
        users: Mutex<HashMap<i32, User>>,
        messages: Mutex<Vec<crate::models::Message>>,
        next_message_id: Mutex<i32>,
    }

    impl FakeRelationalStore {
        pub fn new() -> Self {
            Self {
                users: Mutex::new(HashMap::new()),
                messages: Mutex::new(Vec::new()),
                next_message_id: Mutex::new(1),
            }
        }

        pub fn with_user(self, user: User) -> Self {
            self.users.lock().insert(user.user_id, user);
            self
        }
    }

    #[rocket::async_trait]
    impl RelationalStore for FakeRelationalStore {
        async fn get_user(&self, user_id: i32) -> Result<Option<User>, sqlx::Error> {
            Ok(self.users.lock().get(&user_id).cloned())
        }

        async fn watermark(&self, user_id: i32) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
            Ok(self
                .messages
                .lock()
                .iter()
                .filter(|m| m.user_id == user_id)
                .map(|m| m.date)
                .max())
        }

        async fn message_exists(&self, user_id: i32, provider_message_id: &str) -> Result<bool, sqlx::Error> {
            Ok(self
                .messages
                .lock()
                .iter()
                .any(|m| m.user_id == user_id && m.provider_message_id == provider_message_id))
        }

        async fn insert_message(&self, msg: NewMessage) -> Result<Option<crate::models::Message>, sqlx::Error> {
            let mut messages = self.messages.lock();
            if messages
                .iter()
                .any(|m| m.user_id == msg.user_id && m.provider_message_id == msg.provider_message_id)
            {
                return Ok(None);
            }
            let mut next_id = self.next_message_id.lock();
            let message_id = *next_id;
            *next_id += 1;

            let record = crate::models::Message {
                message_id,
                user_id: msg.user_id,
                provider_message_id: msg.provider_message_id,
                sender: msg.sender,
                subject: msg.subject,
                snippet: msg.snippet,
                body: msg.body,
                date: msg.date,
                labels: crate::models::Message::labels_from_vec(&msg.labels),
                is_read: msg.is_read,
                created_at: Utc::now(),
            };
            messages.push(record.clone());
            Ok(Some(record))
        }

        async fn list_inbox_messages(
            &self,
            user_id: i32,
            limit: i64,
            offset: i64,
        ) -> Result<Vec<crate::models::Message>, sqlx::Error> {
            let mut matching: Vec<_> = self
                .messages
                .lock()
                .iter()
                .filter(|m| m.user_id == user_id && m.has_inbox_label())
                .cloned()
                .collect();
            matching.sort_by(|a, b| b.date.cmp(&a.date));
            Ok(matching
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect())
        }

        async fn list_all_inbox_messages(&self, user_id: i32) -> Result<Vec<crate::models::Message>, sqlx::Error> {
            self.list_inbox_messages(user_id, i64::MAX, 0).await
        }

        async fn read_counts(&self, user_id: i32) -> Result<(i64, i64, i64), sqlx::Error> {
            let messages = self.messages.lock();
            let inbox: Vec<_> = messages.iter().filter(|m| m.user_id == user_id && m.has_inbox_label()).collect();
            let total = inbox.len() as i64;
            let unread = inbox.iter().filter(|m| !m.is_read).count() as i64;
            Ok((total, unread, total - unread))
        }
    }

    /// In-memory [`VectorStore`]: one `Vec`-backed collection per name.
    #[derive(Default)]
    pub struct FakeVectorStore {
        collections: Mutex<HashMap<String, VectorQueryResult>>,
    }

    impl FakeVectorStore {
        pub fn new() -> Self {
            Self {
                collections: Mutex::new(HashMap::new()),
            }
        }
    }

    #[rocket::async_trait]
    impl VectorStore for FakeVectorStore {
        async fn create_collection(&self, name: &str) -> Result<(), VectorStoreError> {
            self.collections.lock().entry(name.to_string()).or_default();
            Ok(())
        }

        async fn collection_exists(&self, name: &str) -> Result<bool, VectorStoreError> {
            Ok(self.collections.lock().contains_key(name))
        }

        async fn count(&self, name: &str) -> Result<u64, VectorStoreError> {
            Ok(self
                .collections
                .lock()
                .get(name)
                .map(|c| c.ids.len() as u64)
                .unwrap_or(0))
        }

        async fn add(
            &self,
            name: &str,
            ids: Vec<String>,
            _embeddings: Vec<Vec<f32>>,
            documents: Vec<String>,
            metadatas: Vec<ChunkMetadata>,
        ) -> Result<(), VectorStoreError> {
            let mut collections = self.collections.lock();
            let entry = collections.entry(name.to_string()).or_default();
            entry.ids.extend(ids);
            entry.documents.extend(documents);
            entry.metadatas.extend(metadatas);
            entry.distances.resize(entry.ids.len(), 0.1);
            Ok(())
        }

        async fn get_all_ids(&self, name: &str) -> Result<Vec<String>, VectorStoreError> {
            Ok(self.collections.lock().get(name).map(|c| c.ids.clone()).unwrap_or_default())
        }

        async fn query(&self, name: &str, _embedding: Vec<f32>, n_results: usize) -> Result<VectorQueryResult, VectorStoreError> {
            let collections = self.collections.lock();
            let Some(stored) = collections.get(name) else {
                return Ok(VectorQueryResult::default());
            };
            Ok(VectorQueryResult {
                ids: stored.ids.iter().take(n_results).cloned().collect(),
                documents: stored.documents.iter().take(n_results).cloned().collect(),
                metadatas: stored.metadatas.iter().take(n_results).cloned().collect(),
                distances: stored.distances.iter().take(n_results).cloned().collect(),
            })
        }
    }

    /// Deterministic fake embedding client: a fixed-length vector derived
    /// from text length, just enough for cosine-distance math to run.
    pub struct FakeEmbeddingClient;

    #[rocket::async_trait]
    impl EmbeddingClient for FakeEmbeddingClient {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![(text.len() % 97) as f32 / 97.0; 8])
        }
    }

    /// Fake LLM client returning a canned, recognizable answer.
    pub struct FakeLlmClient {
        pub canned_answer: String,
    }

    impl FakeLlmClient {
        pub fn new(canned_answer: impl Into<String>) -> Self {
            Self {
                canned_answer: canned_answer.into(),
            }
        }
    }

    #[rocket::async_trait]
    impl LlmClient for FakeLlmClient {
        async fn chat(&self, _messages: &[ChatMessage], _temperature: f32, _max_tokens: u32) -> Result<String, LlmError> {
            Ok(self.canned_answer.clone())
        }
    }

    /// Index executor that always succeeds instantly, for lifecycle tests
    /// that don't need real chunking/embedding.
    pub struct NoopIndexExecutor;

    #[rocket::async_trait]
    impl IndexExecutor for NoopIndexExecutor {
        async fn index_user(&self, _user_id: i32) -> Result<IndexRunOutcome, IndexingError> {
            Ok(IndexRunOutcome {
                email_count: 0,
                new_emails: 0,
            })
        }
    }

    /// Assemble an [`AppState`] wired entirely to in-memory fakes.
    pub fn test_app_state(relational: Arc<dyn RelationalStore>) -> AppState {
        let config = Arc::new(AppConfig::from_env());
        let lifecycle = IndexLifecycleManager::new(
            Arc::new(NoopIndexExecutor),
            config.reindex_interval,
            config.retry_delay,
            config.max_retries,
            config.rate_limit_cooldown,
        );

        AppState::new(
            relational,
            Arc::new(FakeVectorStore::new()),
            Arc::new(FakeEmbeddingClient),
            Arc::new(FakeLlmClient::new("test answer")),
            lifecycle,
            Arc::new(QueryCache::new(config.cache_ttl)),
            config,
            reqwest::Client::new(),
        )
    }
}
