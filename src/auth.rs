use std::collections::HashMap;
use std::sync::Mutex;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::AppState;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Tokens are stored hashed so the session map never holds raw bearer values.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Bearer tokens issued at login, kept in memory for the process lifetime
/// (sessions do not survive a restart, matching the rest of the store).
#[derive(Default)]
pub struct SessionStore {
    tokens: Mutex<HashMap<String, String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, user_id: &str) -> String {
        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = URL_SAFE_NO_PAD.encode(raw);
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.insert(hash_token(&token), user_id.to_string());
        }
        token
    }

    pub fn verify(&self, token: &str) -> Option<String> {
        self.tokens.lock().ok()?.get(&hash_token(token)).cloned()
    }

    pub fn revoke_user(&self, user_id: &str) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.retain(|_, uid| uid != user_id);
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Guard for upload/capture/delete routes. Skipped entirely in dev mode.
pub async fn require_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.config.dev_mode {
        return Ok(next.run(request).await);
    }

    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;
    state
        .sessions
        .verify(token)
        .ok_or_else(|| AppError::Unauthorized("invalid token".to_string()))?;

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn password_roundtrip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password(&hash, "hunter2"));
        assert!(!verify_password(&hash, "hunter3"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("not-a-phc-string", "hunter2"));
    }

    #[test]
    fn session_issue_verify_revoke() {
        let sessions = SessionStore::new();
        let token = sessions.issue("USER-1");
        assert_eq!(sessions.verify(&token).as_deref(), Some("USER-1"));
        assert!(sessions.verify("bogus").is_none());

        sessions.revoke_user("USER-1");
        assert!(sessions.verify(&token).is_none());
    }

    #[test]
    fn tokens_have_no_ttl_only_revocation() {
        let sessions = SessionStore::new();
        let token = sessions.issue("USER-1");
        // Repeated verification never consumes or ages a token.
        assert_eq!(sessions.verify(&token).as_deref(), Some("USER-1"));
        assert_eq!(sessions.verify(&token).as_deref(), Some("USER-1"));
    }

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
