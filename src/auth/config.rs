use crate::auth::{AuthError, AuthResult};

/// Bearer-token verification configuration.
///
/// The OAuth login flow that mints these tokens is an external
/// collaborator; this core only verifies and decodes the opaque user id
/// carried by an already-issued token.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub hmac_secret: String,
}

impl AuthConfig {
    pub fn from_env() -> AuthResult<Self> {
        let issuer =
            std::env::var("INBOX_RAG_JWT_ISSUER").unwrap_or_else(|_| "http://localhost".into());
        let audience =
            std::env::var("INBOX_RAG_JWT_AUDIENCE").unwrap_or_else(|_| "inbox-rag-api".into());
        let hmac_secret = std::env::var("INBOX_RAG_JWT_SECRET")
            .map_err(|_| AuthError::Config("INBOX_RAG_JWT_SECRET is required".into()))?;

        Ok(Self {
            issuer,
            audience,
            hmac_secret,
        })
    }
}
