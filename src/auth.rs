//! Authentication: password hashing, session tokens, reset tokens, and
//! the request extractors that enforce them.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::{oid::ObjectId, DateTime};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::{PasswordResetToken, Role, User};
use crate::state::AppState;
use crate::store::Store;

/// Length of a password-reset token.
pub const RESET_TOKEN_LEN: usize = 16;

const TOKEN_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Session token claims: the user id, plus the timestamps the signing
/// crate validates.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn hash_password(plain: &str) -> Result<String, ApiError> {
    Ok(bcrypt::hash(plain, bcrypt::DEFAULT_COST)?)
}

pub fn verify_password(plain: &str, hash: &str) -> Result<bool, ApiError> {
    Ok(bcrypt::verify(plain, hash)?)
}

/// Sign a session token for `user`.
pub fn issue_session_token(user: &User, secret: &str, ttl_hours: i64) -> Result<String, ApiError> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user.id.to_hex(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(ttl_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))
}

/// Verify a session token and return the user id it was signed for.
pub fn verify_session_token(token: &str, secret: &str) -> Result<ObjectId, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;
    ObjectId::parse_str(&data.claims.sub).map_err(|_| ApiError::Unauthorized)
}

/// Random 16-character alphanumeric reset token.
pub fn generate_reset_token(rng: &mut impl Rng) -> String {
    (0..RESET_TOKEN_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..TOKEN_CHARSET.len());
            TOKEN_CHARSET[idx] as char
        })
        .collect()
}

/// Look up a reset token, rejecting unknown and expired ones.
pub async fn lookup_reset_token(
    store: &dyn Store,
    token: &str,
    now: DateTime,
) -> Result<PasswordResetToken, ApiError> {
    let record = store
        .find_reset_token(token)
        .await?
        .ok_or(ApiError::NotFound("reset token"))?;
    if record.expires_at <= now {
        return Err(ApiError::Expired);
    }
    Ok(record)
}

/// Extractor for routes that require a logged-in user.
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;
        let token = header.strip_prefix("Bearer ").unwrap_or(header);

        let user_id = verify_session_token(token, &state.config.jwt_secret)?;
        let user = state
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(ApiError::Unauthorized)?;
        Ok(AuthUser(user))
    }
}

/// Extractor for admin-only routes.
pub struct AdminUser(pub User);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn test_user() -> User {
        User::new(
            "alice".to_string(),
            "alice@example.com".to_string(),
            "hash".to_string(),
            Role::User,
        )
    }

    #[test]
    fn hash_never_equals_plaintext() {
        let hash = hash_password("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }

    #[test]
    fn session_token_round_trips() {
        let user = test_user();
        let token = issue_session_token(&user, "secret", 24).unwrap();
        let id = verify_session_token(&token, "secret").unwrap();
        assert_eq!(id, user.id);
    }

    #[test]
    fn session_token_rejects_wrong_secret() {
        let token = issue_session_token(&test_user(), "secret", 24).unwrap();
        let err = verify_session_token(&token, "other").unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[test]
    fn reset_tokens_are_16_alphanumeric_chars() {
        let mut rng = StdRng::seed_from_u64(1);
        let token = generate_reset_token(&mut rng);
        assert_eq!(token.len(), RESET_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));

        // A second draw must not repeat the first.
        assert_ne!(token, generate_reset_token(&mut rng));
    }

    #[tokio::test]
    async fn reset_token_validates_before_expiry_only() {
        let store = MemoryStore::new();
        let user = store.create_user(test_user()).await.unwrap();
        let issued = DateTime::now();
        let record = PasswordResetToken::new("abcdEFGH1234wxyz".to_string(), user.id, issued);
        store.insert_reset_token(&record).await.unwrap();

        let just_before = DateTime::from_chrono(
            record.expires_at.to_chrono() - Duration::seconds(1),
        );
        let found = lookup_reset_token(&store, "abcdEFGH1234wxyz", just_before)
            .await
            .unwrap();
        assert_eq!(found.user_id, user.id);

        // Exactly at expires_at counts as expired.
        let err = lookup_reset_token(&store, "abcdEFGH1234wxyz", record.expires_at)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Expired));
    }

    #[tokio::test]
    async fn reset_token_cannot_be_reused_after_delete() {
        let store = MemoryStore::new();
        let user = store.create_user(test_user()).await.unwrap();
        let record = PasswordResetToken::new("abcdEFGH1234wxyz".to_string(), user.id, DateTime::now());
        store.insert_reset_token(&record).await.unwrap();

        store.delete_reset_token("abcdEFGH1234wxyz").await.unwrap();
        let err = lookup_reset_token(&store, "abcdEFGH1234wxyz", DateTime::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound("reset token")));
    }

    #[tokio::test]
    async fn unknown_reset_token_is_not_found() {
        let store = MemoryStore::new();
        let err = lookup_reset_token(&store, "nope", DateTime::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound("reset token")));
    }
}
