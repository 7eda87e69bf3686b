use std::{collections::HashMap, env};

use axum::{
    body::Body,
    http::{header, Request},
    routing::get,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use fieldwatch::{
    config::{session::validate_production_config, AppConfig, ConfigError, SessionConfig},
    test_utils::test_helpers,
};
use serial_test::serial;
use tower::ServiceExt;
use tower_sessions::{cookie::SameSite, Session};
use tower_sessions_sqlx_store::SqliteStore;

#[derive(Default)]
struct EnvGuard {
    original: HashMap<String, Option<String>>,
}

impl EnvGuard {
    fn set(&mut self, key: &str, value: impl Into<String>) {
        self.original
            .entry(key.to_string())
            .or_insert_with(|| env::var(key).ok());
        env::set_var(key, value.into());
    }

    fn remove(&mut self, key: &str) {
        self.original
            .entry(key.to_string())
            .or_insert_with(|| env::var(key).ok());
        env::remove_var(key);
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in self.original.drain() {
            match value {
                Some(v) => env::set_var(&key, v),
                None => env::remove_var(&key),
            }
        }
    }
}

fn strong_production_env(env_guard: &mut EnvGuard) {
    env_guard.set("ENVIRONMENT", "production");
    env_guard.set("FORCE_HTTPS", "true");
    env_guard.set("SESSION_SECRET", STANDARD.encode([42u8; 64]));
    env_guard.set("SECRET_KEY", "9f4c2b71e0d84a5db6a3c81f27e90d4c5b1a");
}

#[tokio::test]
#[serial]
async fn session_cookie_flags_are_secure_in_production() {
    let mut env_guard = EnvGuard::default();
    strong_production_env(&mut env_guard);

    validate_production_config().expect("strong settings to pass");

    let pool = test_helpers::create_test_db().await.unwrap();
    let session_store = SqliteStore::new(pool)
        .with_table_name("sessions_test")
        .expect("valid session table name for tests");
    session_store
        .migrate()
        .await
        .expect("session table migration to succeed");

    let session_layer = SessionConfig::from_env().create_layer(session_store);

    async fn set_session(session: Session) -> &'static str {
        session.insert("csrf", "token").await.unwrap();
        "ok"
    }

    let app = Router::new().route("/", get(set_session)).layer(session_layer);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .body(Body::empty())
                .expect("request to build"),
        )
        .await
        .expect("router to respond");

    let cookie_header = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie to be issued")
        .to_str()
        .expect("cookie header to be valid ASCII");

    let cookie = tower_sessions::cookie::Cookie::parse(cookie_header)
        .expect("cookie header to parse correctly");

    assert_eq!(cookie.name(), "__Host-session");
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.secure(), Some(true));
    // Lax keeps the session across the redirect back from Google
    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    assert_eq!(cookie.path().unwrap_or("/"), "/");
}

#[test]
#[serial]
fn development_skips_production_checks() {
    let mut env_guard = EnvGuard::default();
    env_guard.remove("ENVIRONMENT");
    env_guard.remove("FORCE_HTTPS");
    env_guard.remove("SESSION_SECRET");

    assert!(validate_production_config().is_ok());

    let config = SessionConfig::from_env();
    assert!(!config.secure);
    assert_eq!(config.name, "session");
}

#[test]
#[serial]
fn production_requires_https_flag() {
    let mut env_guard = EnvGuard::default();
    strong_production_env(&mut env_guard);
    env_guard.remove("FORCE_HTTPS");

    assert!(matches!(
        validate_production_config(),
        Err(ConfigError::Insecure(_))
    ));
}

#[test]
#[serial]
fn production_rejects_weak_secrets() {
    let mut env_guard = EnvGuard::default();
    strong_production_env(&mut env_guard);
    env_guard.set("SESSION_SECRET", "changeme");

    assert!(validate_production_config().is_err());

    strong_production_env(&mut env_guard);
    env_guard.set("SECRET_KEY", "short");
    assert!(validate_production_config().is_err());

    strong_production_env(&mut env_guard);
    env_guard.remove("SECRET_KEY");
    assert!(matches!(
        validate_production_config(),
        Err(ConfigError::Missing("SECRET_KEY"))
    ));
}

#[test]
#[serial]
fn app_config_reads_environment() {
    let mut env_guard = EnvGuard::default();
    env_guard.remove("ENVIRONMENT");
    env_guard.set("PORT", "9090");
    env_guard.set("BASE_URL", "https://field.example.org/");
    env_guard.set("EMAIL_TOKEN_EXPIRE_MINUTES", "45");
    env_guard.set("JWT_ALGORITHM", "hs512");
    env_guard.set("GOOGLE_CLIENT_ID", "client-1");
    env_guard.set("GOOGLE_CLIENT_SECRET", "shh");
    env_guard.remove("GOOGLE_REDIRECT_URI");
    env_guard.remove("GOOGLE_TOKEN_URL");

    let config = AppConfig::from_env().unwrap();
    assert_eq!(config.port, 9090);
    assert_eq!(config.base_url, "https://field.example.org");
    assert_eq!(config.email_token_ttl, chrono::Duration::minutes(45));
    assert_eq!(config.jwt_algorithm, jsonwebtoken::Algorithm::HS512);

    let google = config.google.unwrap();
    assert_eq!(
        google.redirect_uri,
        "https://field.example.org/auth/google/callback"
    );
    assert_eq!(google.token_url, "https://oauth2.googleapis.com/token");

    env_guard.set("PORT", "not-a-port");
    assert!(matches!(
        AppConfig::from_env(),
        Err(ConfigError::Invalid { key: "PORT", .. })
    ));
}

#[test]
#[serial]
fn out_of_range_token_lifetimes_are_config_errors() {
    let mut env_guard = EnvGuard::default();
    env_guard.remove("ENVIRONMENT");
    env_guard.remove("PORT");

    env_guard.set("EMAIL_TOKEN_EXPIRE_MINUTES", i64::MAX.to_string());
    assert!(matches!(
        AppConfig::from_env(),
        Err(ConfigError::Invalid {
            key: "EMAIL_TOKEN_EXPIRE_MINUTES",
            ..
        })
    ));

    env_guard.set("EMAIL_TOKEN_EXPIRE_MINUTES", "30");
    env_guard.set("ACCESS_TOKEN_EXPIRE_MINUTES", "0");
    assert!(matches!(
        AppConfig::from_env(),
        Err(ConfigError::Invalid {
            key: "ACCESS_TOKEN_EXPIRE_MINUTES",
            ..
        })
    ));

    env_guard.set("ACCESS_TOKEN_EXPIRE_MINUTES", "90");
    let config = AppConfig::from_env().unwrap();
    assert_eq!(config.access_token_ttl, chrono::Duration::minutes(90));
}
