use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, warn};
use uuid::Uuid;

pub const CSRF_TOKEN_KEY: &str = "csrf_token";
const CSRF_TOKEN_TTL_SECS: i64 = 86400;

/// CSRF token kept in the server-side session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfToken {
    pub value: String,
    pub created_at: i64,
}

impl CsrfToken {
    pub fn new() -> Self {
        Self {
            value: Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() - self.created_at > CSRF_TOKEN_TTL_SECS
    }
}

impl Default for CsrfToken {
    fn default() -> Self {
        Self::new()
    }
}

fn prefix(value: &str) -> &str {
    value.get(..8).unwrap_or(value)
}

/// Generate a new CSRF token and store it in the session
pub async fn generate_csrf_token(
    session: &Session,
) -> Result<String, tower_sessions::session::Error> {
    let token = CsrfToken::new();
    let value = token.value.clone();

    session.insert(CSRF_TOKEN_KEY, token).await?;

    debug!("Generated new CSRF token: {}", prefix(&value));
    Ok(value)
}

pub async fn get_or_create_csrf_token(
    session: &Session,
) -> Result<String, tower_sessions::session::Error> {
    let token: Option<CsrfToken> = session.get(CSRF_TOKEN_KEY).await?;

    match token {
        Some(existing_token) if !existing_token.is_expired() => Ok(existing_token.value),
        _ => generate_csrf_token(session).await,
    }
}

/// Token for a form about to be rendered; never fails the request.
pub async fn form_token(session: &Session) -> String {
    get_or_create_csrf_token(session)
        .await
        .unwrap_or_else(|e| {
            warn!("Failed to load CSRF token: {}", e);
            String::from("error")
        })
}

/// Validate the token posted with a form and rotate it on success
pub async fn validate_csrf_form_field(
    session: &Session,
    form_token: &str,
) -> Result<(), StatusCode> {
    let stored_token: Option<CsrfToken> = session.get(CSRF_TOKEN_KEY).await.map_err(|e| {
        warn!("Failed to get CSRF token from session: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let stored_token = match stored_token {
        Some(token) if token.is_expired() => {
            warn!("CSRF token expired during form validation");
            return Err(StatusCode::FORBIDDEN);
        }
        Some(token) => token,
        None => {
            warn!("No CSRF token in session for form validation");
            return Err(StatusCode::FORBIDDEN);
        }
    };

    if form_token != stored_token.value {
        warn!(
            "CSRF form token mismatch: expected {}, got {}",
            prefix(&stored_token.value),
            prefix(form_token)
        );
        return Err(StatusCode::FORBIDDEN);
    }

    debug!("CSRF form token validated, rotating");
    let _ = generate_csrf_token(session).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_sessions::MemoryStore;

    fn session() -> Session {
        let store = std::sync::Arc::new(MemoryStore::default());
        Session::new(None, store, None)
    }

    #[tokio::test]
    async fn test_csrf_token_generation() {
        let session = session();

        let token1 = generate_csrf_token(&session).await.unwrap();
        let token2 = generate_csrf_token(&session).await.unwrap();
        assert!(!token1.is_empty());
        assert_ne!(token1, token2, "Tokens should be unique");
    }

    #[tokio::test]
    async fn test_csrf_token_expiry() {
        let token = CsrfToken {
            value: "test".to_string(),
            created_at: chrono::Utc::now().timestamp() - 100000,
        };
        assert!(token.is_expired());
        assert!(!CsrfToken::new().is_expired());
    }

    #[tokio::test]
    async fn test_get_or_create_csrf_token() {
        let session = session();

        let token1 = get_or_create_csrf_token(&session).await.unwrap();
        let token2 = get_or_create_csrf_token(&session).await.unwrap();
        assert_eq!(token1, token2);

        let _ = generate_csrf_token(&session).await.unwrap();
        let token3 = get_or_create_csrf_token(&session).await.unwrap();
        assert_ne!(token1, token3);
    }

    #[tokio::test]
    async fn test_validate_rotates_and_rejects_replay() {
        let session = session();
        let token = form_token(&session).await;

        assert!(validate_csrf_form_field(&session, &token).await.is_ok());
        assert_eq!(
            validate_csrf_form_field(&session, &token).await,
            Err(StatusCode::FORBIDDEN)
        );
    }

    #[tokio::test]
    async fn test_short_token_is_rejected_without_panicking() {
        let session = session();
        let _ = form_token(&session).await;
        assert_eq!(
            validate_csrf_form_field(&session, "abc").await,
            Err(StatusCode::FORBIDDEN)
        );
    }
}
