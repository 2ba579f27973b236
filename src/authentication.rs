use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{AuthResponse, User};
use crate::error::ApiError;
use crate::store::Store;

pub const MIN_PASSWORD_LEN: usize = 6;
const TOKEN_VALIDITY_DAYS: i64 = 7;

/// Signing material for the access token, derived from the configured secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issues a 7-day HS256 token carrying only the user id.
    pub fn issue(&self, user_id: Uuid) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_VALIDITY_DAYS)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|_| ApiError::Unauthenticated)
    }

    /// Resolves a token back to the user id. Expiry, tampering, and malformed
    /// input all fail the same way.
    pub fn verify(&self, token: &str) -> Result<Uuid, ApiError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims.sub)
            .map_err(|_| ApiError::Unauthenticated)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    iat: i64,
    exp: i64,
}

fn check_password_policy(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

// `password_auth` hashing and verification are blocking, hence
// `tokio::task::spawn_blocking` around both.

async fn hash_password(password: String) -> Result<String, ApiError> {
    Ok(tokio::task::spawn_blocking(move || password_auth::generate_hash(password)).await?)
}

async fn verify_password(password: String, hash: String) -> Result<(), ApiError> {
    tokio::task::spawn_blocking(move || {
        password_auth::verify_password(password, &hash).map_err(|_| ApiError::InvalidCredentials)
    })
    .await?
}

/// Creates the account and signs the caller straight in. The password policy
/// is enforced before anything is persisted.
pub async fn register(
    store: &Store,
    keys: &TokenKeys,
    email: &str,
    name: &str,
    password: String,
) -> Result<AuthResponse, ApiError> {
    check_password_policy(&password)?;

    let password_hash = hash_password(password).await?;
    let user = store.create_user(email, name, &password_hash).await?;
    let token = keys.issue(user.id)?;

    Ok(AuthResponse {
        user: user.into(),
        token,
    })
}

/// Unknown email and wrong password fail identically, so responses carry no
/// user-enumeration signal.
pub async fn authenticate(
    store: &Store,
    keys: &TokenKeys,
    email: &str,
    password: String,
) -> Result<AuthResponse, ApiError> {
    let user = store
        .user_by_email(email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    verify_password(password, user.password_hash.clone()).await?;
    let token = keys.issue(user.id)?;

    Ok(AuthResponse {
        user: user.into(),
        token,
    })
}

/// Re-verifies the current password against the stored hash before accepting
/// the new one.
pub async fn change_password(
    store: &Store,
    user_id: Uuid,
    current_password: String,
    new_password: String,
) -> Result<(), ApiError> {
    check_password_policy(&new_password)?;

    let user: User = store.user_by_id(user_id).await?;
    verify_password(current_password, user.password_hash).await?;

    let new_hash = hash_password(new_password).await?;
    store.set_password_hash(user_id, &new_hash).await
}

/// The authenticated caller, resolved from the `Authorization: Bearer` header.
/// Handlers that take this as an argument reject unauthenticated requests
/// before running.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub user_id: Uuid,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let keys = parts
            .extensions
            .get::<TokenKeys>()
            .cloned()
            .ok_or(ApiError::Unauthenticated)?;

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthenticated)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthenticated)?;

        let user_id = keys.verify(token)?;
        Ok(CurrentUser { user_id })
    }
}
