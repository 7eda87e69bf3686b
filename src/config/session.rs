use std::env;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha512};
use time::Duration;
use tower_sessions::{
    cookie::{Key, SameSite},
    service::SignedCookie,
    Expiry, SessionManagerLayer, SessionStore,
};
use tracing::warn;

use super::{current_environment, ConfigError};

/// Signed server-side session layer holding the CSRF token and OAuth state.
pub type SessionLayer<S> = SessionManagerLayer<S, SignedCookie>;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub expiry: Duration,
    pub name: String,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        if current_environment() == "production" {
            SessionConfig {
                secure: true,
                http_only: true,
                // Lax so the session survives the redirect back from Google.
                same_site: SameSite::Lax,
                expiry: Duration::hours(2),
                name: "__Host-session".to_string(),
            }
        } else {
            SessionConfig {
                secure: false,
                http_only: true,
                same_site: SameSite::Lax,
                expiry: Duration::days(7),
                name: "session".to_string(),
            }
        }
    }

    pub fn create_layer<S: SessionStore + Clone>(&self, store: S) -> SessionLayer<S> {
        let key = load_session_key();

        SessionManagerLayer::new(store)
            .with_secure(self.secure)
            .with_http_only(self.http_only)
            .with_same_site(self.same_site)
            .with_name(self.name.clone())
            .with_expiry(Expiry::OnInactivity(self.expiry))
            .with_signed(key)
    }
}

/// Refuse to start a production deployment with weak settings.
pub fn validate_production_config() -> Result<(), ConfigError> {
    if current_environment() != "production" {
        return Ok(());
    }

    if !env_flag_enabled("FORCE_HTTPS") {
        return Err(ConfigError::Insecure(
            "Production environment requires HTTPS. Set FORCE_HTTPS=true".to_string(),
        ));
    }

    let secret = env::var("SESSION_SECRET").map_err(|_| ConfigError::Missing("SESSION_SECRET"))?;
    if decode_secret_bytes(&secret).len() < 64 {
        return Err(ConfigError::Insecure(
            "SESSION_SECRET must be at least 64 bytes in production".to_string(),
        ));
    }
    if looks_like_placeholder(&secret) {
        return Err(ConfigError::Insecure(
            "SESSION_SECRET appears to be a default value".to_string(),
        ));
    }

    let secret_key = env::var("SECRET_KEY").map_err(|_| ConfigError::Missing("SECRET_KEY"))?;
    if secret_key.len() < 32 || looks_like_placeholder(&secret_key) {
        return Err(ConfigError::Insecure(
            "SECRET_KEY must be a random value of at least 32 characters".to_string(),
        ));
    }

    Ok(())
}

fn looks_like_placeholder(secret: &str) -> bool {
    let lowered = secret.to_ascii_lowercase();
    lowered.contains("example") || lowered.contains("changeme") || lowered.contains("default")
}

fn env_flag_enabled(key: &str) -> bool {
    env::var(key)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(false)
}

fn load_session_key() -> Key {
    match env::var("SESSION_SECRET") {
        Ok(secret) if !secret.is_empty() => key_from_secret_bytes(&decode_secret_bytes(&secret)),
        _ => {
            warn!("SESSION_SECRET not set; generating ephemeral key (development only)");
            Key::generate()
        }
    }
}

fn decode_secret_bytes(secret: &str) -> Vec<u8> {
    STANDARD
        .decode(secret.as_bytes())
        .unwrap_or_else(|_| secret.as_bytes().to_vec())
}

fn key_from_secret_bytes(bytes: &[u8]) -> Key {
    if bytes.len() >= 64 {
        Key::from(&bytes[..64])
    } else {
        let digest = Sha512::digest(bytes);
        Key::from(digest.as_slice())
    }
}
