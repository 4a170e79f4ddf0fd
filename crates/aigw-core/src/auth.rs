use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// Caller identity attached to a request after authentication.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub user_id: i64,
    pub organization_id: Option<i64>,
}

#[derive(Debug)]
pub struct AuthError {
    pub status: StatusCode,
    pub body: Bytes,
}

impl AuthError {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

pub trait AuthProvider: Send + Sync {
    #[allow(clippy::result_large_err)]
    fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError>;
}

/// Salted key hash as stored in the users table. The plaintext key never
/// touches storage or the snapshot.
pub fn hash_api_key(api_key: &str, salt: &str) -> String {
    blake3::hash(format!("{api_key}{salt}").as_bytes())
        .to_hex()
        .to_string()
}

#[derive(Debug, Clone, Copy)]
pub struct AuthUserEntry {
    pub user_id: i64,
    pub organization_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct AuthSnapshot {
    pub users_by_key_hash: HashMap<String, AuthUserEntry>,
}

impl AuthSnapshot {
    pub fn insert(&mut self, key_hash: String, user_id: i64, organization_id: Option<i64>) {
        self.users_by_key_hash.insert(
            key_hash,
            AuthUserEntry {
                user_id,
                organization_id,
            },
        );
    }
}

/// In-memory credential lookup. The snapshot is loaded from storage at
/// bootstrap and swapped wholesale when a user is added; request-path reads
/// never hit the database.
#[derive(Debug)]
pub struct MemoryAuth {
    salt: String,
    snapshot: ArcSwap<AuthSnapshot>,
}

impl MemoryAuth {
    pub fn new(salt: impl Into<String>, snapshot: AuthSnapshot) -> Self {
        Self {
            salt: salt.into(),
            snapshot: ArcSwap::from_pointee(snapshot),
        }
    }

    pub fn replace_snapshot(&self, snapshot: AuthSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }

    pub fn add_user(&self, key_hash: String, user_id: i64, organization_id: Option<i64>) {
        let mut next = AuthSnapshot::clone(&self.snapshot.load());
        next.insert(key_hash, user_id, organization_id);
        self.replace_snapshot(next);
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }
}

impl AuthProvider for MemoryAuth {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        let api_key = extract_api_key(headers)
            .ok_or_else(|| AuthError::new(StatusCode::UNAUTHORIZED, "missing api key"))?;

        let hash = hash_api_key(&api_key, &self.salt);
        let snapshot = self.snapshot.load();
        let entry = snapshot
            .users_by_key_hash
            .get(hash.as_str())
            .ok_or_else(|| AuthError::new(StatusCode::UNAUTHORIZED, "invalid api key"))?;

        Ok(AuthContext {
            user_id: entry.user_id,
            organization_id: entry.organization_id,
        })
    }
}

fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = header_value(headers, "x-api-key") {
        return Some(value);
    }

    let auth = header_value(headers, "authorization")?;
    let auth = auth.trim();
    if let Some(token) = auth.strip_prefix("Bearer ") {
        return Some(token.trim().to_string());
    }
    if let Some(token) = auth.strip_prefix("bearer ") {
        return Some(token.trim().to_string());
    }
    None
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_with_key(key: &str) -> MemoryAuth {
        let mut snapshot = AuthSnapshot::default();
        snapshot.insert(hash_api_key(key, "salt"), 7, Some(3));
        MemoryAuth::new("salt", snapshot)
    }

    #[test]
    fn accepts_bearer_token() {
        let auth = auth_with_key("sk-demo");
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer sk-demo".parse().unwrap());
        let ctx = auth.authenticate(&headers).unwrap();
        assert_eq!(ctx.user_id, 7);
        assert_eq!(ctx.organization_id, Some(3));
    }

    #[test]
    fn accepts_x_api_key_header() {
        let auth = auth_with_key("sk-demo");
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "sk-demo".parse().unwrap());
        assert!(auth.authenticate(&headers).is_ok());
    }

    #[test]
    fn rejects_unknown_key() {
        let auth = auth_with_key("sk-demo");
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer sk-other".parse().unwrap());
        let err = auth.authenticate(&headers).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn rejects_missing_credentials() {
        let auth = auth_with_key("sk-demo");
        let err = auth.authenticate(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn added_user_is_visible_without_restart() {
        let auth = auth_with_key("sk-demo");
        auth.add_user(hash_api_key("sk-new", "salt"), 8, None);
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "sk-new".parse().unwrap());
        assert_eq!(auth.authenticate(&headers).unwrap().user_id, 8);
    }
}
