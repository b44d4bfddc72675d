//! Bearer-token authentication.
//!
//! Identity itself lives outside this service: an [`AuthSource`] turns the
//! token on a request into the current user, or nothing. [`TokenDirectory`]
//! is the in-process source, loaded from a JSON users file.

use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use dashmap::DashMap;
use serde::Deserialize;
use tracing::{info, warn};
use ulid::Ulid;

use crate::http::error::AppError;
use crate::model::User;

#[async_trait]
pub trait AuthSource: Send + Sync {
    /// The user a token belongs to, or `None` for unknown tokens.
    async fn current_user(&self, token: &str) -> Option<User>;
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    token: String,
    id: Ulid,
    name: String,
    email: String,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Default)]
pub struct TokenDirectory {
    users: DashMap<String, User>,
}

impl TokenDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: impl Into<String>, user: User) {
        self.users.insert(token.into(), user);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Parse a JSON array of `{token, id, name, email, image?}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<UserEntry> = serde_json::from_str(json)?;
        let dir = Self::new();
        for e in entries {
            dir.insert(
                e.token,
                User {
                    id: e.id,
                    name: e.name,
                    email: e.email,
                    image: e.image,
                },
            );
        }
        Ok(dir)
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let dir = Self::from_json(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        info!("loaded {} users from {}", dir.len(), path.display());
        Ok(dir)
    }
}

#[async_trait]
impl AuthSource for TokenDirectory {
    async fn current_user(&self, token: &str) -> Option<User> {
        self.users.get(token).map(|e| e.value().clone())
    }
}

/// `Authorization: Bearer <token>`; the scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

async fn resolve(parts: &Parts, auth: &dyn AuthSource) -> Option<User> {
    let token = bearer_token(&parts.headers)?;
    auth.current_user(token).await
}

/// Extractor for endpoints that require a signed-in user.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<dyn AuthSource>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<dyn AuthSource>::from_ref(state);
        match resolve(parts, auth.as_ref()).await {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                metrics::counter!(crate::observability::AUTH_FAILURES_TOTAL).increment(1);
                warn!("unauthenticated request to {}", parts.uri.path());
                Err(AppError::unauthorized())
            }
        }
    }
}

/// Extractor for public endpoints that personalise output when signed in.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl<S> FromRequestParts<S> for MaybeUser
where
    Arc<dyn AuthSource>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<dyn AuthSource>::from_ref(state);
        Ok(MaybeUser(resolve(parts, auth.as_ref()).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer   xyz"));
        assert_eq!(bearer_token(&headers), Some("xyz"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn directory_from_json() {
        let id = Ulid::new();
        let json = format!(
            r#"[{{"token":"t-1","id":"{id}","name":"Ana","email":"ana@example.com"}},
                {{"token":"t-2","id":"{}","name":"Bo","email":"bo@example.com","image":"https://img.example/bo.png"}}]"#,
            Ulid::new()
        );
        let dir = TokenDirectory::from_json(&json).unwrap();
        assert_eq!(dir.len(), 2);
        let user = dir.current_user("t-1").await.unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.image, None);
        assert!(dir.current_user("nope").await.is_none());
    }

    #[test]
    fn directory_rejects_bad_json() {
        assert!(TokenDirectory::from_json(r#"[{"token":"t"}]"#).is_err());
    }
}
