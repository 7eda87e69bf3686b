use rand::Rng;
use serde::Deserialize;

use crate::config::GoogleConfig;
use crate::models::OAuthProfile;

pub const OAUTH_STATE_KEY: &str = "oauth_state";
const SCOPES: &str = "openid email profile";

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("Authorization was denied")]
    AccessDenied,
    #[error("Missing authorization code")]
    MissingCode,
    #[error("OAuth state mismatch")]
    StateMismatch,
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
    #[error("Profile request failed: {0}")]
    Profile(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Authorization-code client for Google sign-in.
pub struct GoogleOAuthClient {
    config: GoogleConfig,
    http: reqwest::Client,
}

impl GoogleOAuthClient {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn generate_state() -> String {
        let bytes: [u8; 24] = rand::thread_rng().gen();
        hex::encode(bytes)
    }

    pub fn authorization_url(&self, state: &str) -> String {
        let query = serde_urlencoded::to_string([
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", SCOPES),
            ("state", state),
            ("access_type", "online"),
            ("prompt", "select_account"),
        ])
        .unwrap_or_default();

        format!("{}?{}", self.config.auth_url, query)
    }

    /// Exchange an authorization code and fetch the signed-in user's profile.
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthProfile, OAuthError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::TokenExchange(format!("{}: {}", status, body)));
        }

        let token: TokenResponse = response.json().await?;

        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OAuthError::Profile(response.status().to_string()));
        }

        let profile: OAuthProfile = response.json().await?;
        tracing::debug!("Fetched Google profile for {}", profile.email);
        Ok(profile)
    }
}

/// Check the callback parameters before any network call.
pub fn validate_callback(
    error: Option<&str>,
    code: Option<&str>,
    returned_state: Option<&str>,
    expected_state: Option<&str>,
) -> Result<String, OAuthError> {
    if error.is_some() {
        return Err(OAuthError::AccessDenied);
    }
    let code = code
        .filter(|c| !c.is_empty())
        .ok_or(OAuthError::MissingCode)?;

    match (returned_state, expected_state) {
        (Some(returned), Some(expected)) if returned == expected => Ok(code.to_string()),
        _ => Err(OAuthError::StateMismatch),
    }
}
