//! Password hashing and JWT issuance/verification - `SPEC_FULL.md` section
//! 1.1 "Ambient stack", HTTP surface.

use crate::error::ApiError;
use crate::state::AppState;
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// JWT claims: the distilled spec's `{user_id, exp}` shape, named `sub` per
/// JWT convention.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
}

const TOKEN_TTL_SECONDS: i64 = 60 * 60 * 24 * 7;

/// Hashes a plaintext password with argon2, returning a PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|error| ApiError::Internal(format!("password hashing failed: {error}")))
}

/// Verifies a plaintext password against a stored PHC hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

/// Issues a signed JWT carrying `user_id` as the `sub` claim.
pub fn issue_token(user_id: Uuid, secret: &str) -> Result<String, ApiError> {
    let expiry = chrono::Utc::now() + chrono::Duration::seconds(TOKEN_TTL_SECONDS);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: usize::try_from(expiry.timestamp()).unwrap_or(usize::MAX),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|error| ApiError::Internal(format!("token issuance failed: {error}")))
}

fn verify_token(token: &str, secret: &str) -> Result<Uuid, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|_| ApiError::Unauthorized)?;
    Uuid::from_str(&data.claims.sub).map_err(|_| ApiError::Unauthorized)
}

/// Extractor populated by [`AuthLayer`]-equivalent logic: every authenticated
/// route takes this as a handler argument, and axum rejects the request with
/// [`ApiError::Unauthorized`] before the handler body runs if the bearer
/// token is missing or invalid.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    /// The authenticated user's id, taken from the JWT `sub` claim.
    pub user_id: Uuid,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;
        let token = header.strip_prefix("Bearer ").ok_or(ApiError::Unauthorized)?;
        let user_id = verify_token(token, &state.jwt_secret)?;
        Ok(AuthUser { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trips_through_hash_and_verify() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn token_round_trips_to_the_same_user_id() {
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, "test-secret").unwrap();
        assert_eq!(verify_token(&token, "test-secret").unwrap(), user_id);
    }

    #[test]
    fn token_signed_with_a_different_secret_is_rejected() {
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, "test-secret").unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }
}
