use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use rocket::Request;
use rocket::State;
use rocket::request::{FromRequest, Outcome};
use serde::Deserialize;

use crate::auth::{AuthConfig, AuthError, AuthResult};

/// Claims carried by an inbound access token. The OAuth collaborator that
/// issues these tokens owns `sub`'s correspondence to a user row; this
/// guard only verifies signature/expiry and parses it.
#[derive(Debug, Deserialize)]
struct AccessTokenClaims {
    sub: String,
    exp: i64,
}

/// The authenticated caller, resolved from a verified bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: i32,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match extract_user(request).await {
            Ok(user) => Outcome::Success(user),
            Err(err) => Outcome::Error((err.status(), err)),
        }
    }
}

async fn extract_user(request: &Request<'_>) -> AuthResult<AuthUser> {
    let token = bearer_token_from_request(request)?;

    let config = request
        .guard::<&State<AuthConfig>>()
        .await
        .succeeded()
        .ok_or_else(|| AuthError::Config("AuthConfig missing from state".into()))?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[config.audience.clone()]);
    validation.set_issuer(&[config.issuer.clone()]);

    let decoded = decode::<AccessTokenClaims>(
        token,
        &DecodingKey::from_secret(config.hmac_secret.as_bytes()),
        &validation,
    )
    .map_err(AuthError::Jwt)?;

    if decoded.claims.exp < Utc::now().timestamp() {
        return Err(AuthError::TokenExpired);
    }

    let user_id: i32 = decoded
        .claims
        .sub
        .parse()
        .map_err(|_| AuthError::TokenInvalid)?;

    Ok(AuthUser { user_id })
}

fn bearer_token_from_request<'r>(request: &'r Request<'_>) -> AuthResult<&'r str> {
    let header = request
        .headers()
        .get_one("Authorization")
        .ok_or(AuthError::Unauthorized)?;
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default();
    if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() {
        Ok(token)
    } else {
        Err(AuthError::Unauthorized)
    }
}
