use std::{env, path::PathBuf, str::FromStr};

use jsonwebtoken::Algorithm;
use rand::Rng;
use tracing::warn;

use super::{current_environment, ConfigError};

pub const DEFAULT_GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Credentials and endpoints for Google sign-in.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub environment: String,
    pub secret_key: String,
    pub jwt_algorithm: Algorithm,
    pub access_token_ttl: chrono::Duration,
    pub email_token_ttl: chrono::Duration,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub image_target_size: u32,
    pub job_workers: usize,
    pub google: Option<GoogleConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            environment: "development".to_string(),
            secret_key: ephemeral_secret(),
            jwt_algorithm: Algorithm::HS256,
            access_token_ttl: chrono::Duration::minutes(60),
            email_token_ttl: chrono::Duration::minutes(30),
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 10 * 1024 * 1024,
            image_target_size: 1024,
            job_workers: 2,
            google: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let environment = current_environment();

        let secret_key = match env::var("SECRET_KEY") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if environment == "production" => {
                return Err(ConfigError::Missing("SECRET_KEY"));
            }
            _ => {
                warn!("SECRET_KEY not set; generating ephemeral key (development only)");
                defaults.secret_key
            }
        };

        let jwt_algorithm = match env::var("JWT_ALGORITHM") {
            Ok(value) => parse_hmac_algorithm(&value)?,
            Err(_) => defaults.jwt_algorithm,
        };

        let base_url = env_or("BASE_URL", &defaults.base_url)
            .trim_end_matches('/')
            .to_string();

        let google = match (env::var("GOOGLE_CLIENT_ID"), env::var("GOOGLE_CLIENT_SECRET")) {
            (Ok(client_id), Ok(client_secret))
                if !client_id.is_empty() && !client_secret.is_empty() =>
            {
                Some(GoogleConfig {
                    client_id,
                    client_secret,
                    redirect_uri: env::var("GOOGLE_REDIRECT_URI")
                        .unwrap_or_else(|_| format!("{base_url}/auth/google/callback")),
                    auth_url: env_or("GOOGLE_AUTH_URL", DEFAULT_GOOGLE_AUTH_URL),
                    token_url: env_or("GOOGLE_TOKEN_URL", DEFAULT_GOOGLE_TOKEN_URL),
                    userinfo_url: env_or("GOOGLE_USERINFO_URL", DEFAULT_GOOGLE_USERINFO_URL),
                })
            }
            _ => None,
        };

        let job_workers: usize = parse_env("JOB_WORKERS", defaults.job_workers)?;

        Ok(Self {
            host: env_or("HOST", &defaults.host),
            port: parse_env("PORT", defaults.port)?,
            base_url,
            environment,
            secret_key,
            jwt_algorithm,
            access_token_ttl: parse_minutes(
                "ACCESS_TOKEN_EXPIRE_MINUTES",
                defaults.access_token_ttl,
            )?,
            email_token_ttl: parse_minutes(
                "EMAIL_TOKEN_EXPIRE_MINUTES",
                defaults.email_token_ttl,
            )?,
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            image_target_size: parse_env("IMAGE_TARGET_SIZE", defaults.image_target_size)?,
            job_workers: job_workers.max(1),
            google,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn google_enabled(&self) -> bool {
        self.google.is_some()
    }
}

pub fn parse_hmac_algorithm(value: &str) -> Result<Algorithm, ConfigError> {
    match value.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        _ => Err(ConfigError::Invalid {
            key: "JWT_ALGORITHM",
            value: value.to_string(),
        }),
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|_| ConfigError::Invalid { key, value })
        }
        _ => Ok(default),
    }
}

/// A positive number of minutes that fits in a `chrono::Duration`.
fn parse_minutes(
    key: &'static str,
    default: chrono::Duration,
) -> Result<chrono::Duration, ConfigError> {
    let minutes: i64 = parse_env(key, default.num_minutes())?;
    chrono::Duration::try_minutes(minutes)
        .filter(|ttl| *ttl > chrono::Duration::zero())
        .ok_or_else(|| ConfigError::Invalid {
            key,
            value: minutes.to_string(),
        })
}

fn ephemeral_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
