//! Signed, time-limited tokens carrying a single subject.
//!
//! Tokens are HMAC-signed JWTs with `{sub, exp, iat, purpose}` claims. They
//! are stateless: there is no revocation list and a token may be used any
//! number of times until it expires.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Session,
    EmailVerification,
    PasswordRecovery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub purpose: TokenPurpose,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Failed to sign token: {0}")]
    Signing(String),
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
}

impl TokenService {
    pub fn new(secret: &str, algorithm: Algorithm) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
        }
    }

    /// Sign a token for `subject` that expires after `ttl`.
    ///
    /// A negative `ttl` produces a token that is already expired.
    pub fn issue(
        &self,
        subject: &str,
        purpose: TokenPurpose,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            purpose,
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Check signature, expiry and purpose and return the subject.
    pub fn verify(&self, token: &str, expected: TokenPurpose) -> Result<String, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        if data.claims.purpose != expected {
            tracing::warn!(
                "Token purpose mismatch: expected {:?}, got {:?}",
                expected,
                data.claims.purpose
            );
            return Err(TokenError::Invalid);
        }

        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("unit-test-secret", Algorithm::HS256)
    }

    #[test]
    fn test_issue_and_verify() {
        let service = service();
        let token = service
            .issue("a@b.com", TokenPurpose::Session, Duration::minutes(5))
            .unwrap();
        assert_eq!(
            service.verify(&token, TokenPurpose::Session),
            Ok("a@b.com".to_string())
        );
    }

    #[test]
    fn test_other_secret_is_invalid() {
        let token = service()
            .issue("a@b.com", TokenPurpose::Session, Duration::minutes(5))
            .unwrap();
        let other = TokenService::new("another-secret", Algorithm::HS256);
        assert_eq!(
            other.verify(&token, TokenPurpose::Session),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert_eq!(
            service().verify("not-a-token", TokenPurpose::Session),
            Err(TokenError::Invalid)
        );
    }
}
