//! Registration, login, verification and recovery flows.
//!
//! Tokens are minted by [`TokenService`]; mails are rendered here and handed
//! to the job queue so requests never wait on SMTP.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use crate::jobs::{Job, JobQueue};
use crate::models::{OAuthProfile, User};
use crate::services::auth_service::{AuthService, AuthServiceError, LoginRequest};
use crate::services::email_service::{
    password_setup_email, recovery_email, verification_email, EmailError,
};
use crate::services::token_service::{TokenError, TokenPurpose, TokenService};
use crate::services::user_service::{
    normalize_email, validate_email, validate_password, CreateUserRequest, UpdatePasswordRequest,
    UserService, UserServiceError,
};

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("{0}")]
    Validation(String),
    #[error("An account with this email already exists")]
    AlreadyExists,
    #[error("No account found for this email")]
    UnknownEmail,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("This account has been disabled")]
    AccountDisabled,
    #[error("Please verify your email address. A new link has been sent.")]
    NotVerified,
    #[error("The link has expired")]
    TokenExpired,
    #[error("The link is invalid")]
    TokenInvalid,
    #[error("Email error: {0}")]
    Email(#[from] EmailError),
    #[error("Token error: {0}")]
    Token(TokenError),
    #[error("User service error: {0}")]
    User(UserServiceError),
}

impl From<TokenError> for AccountError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AccountError::TokenExpired,
            TokenError::Invalid => AccountError::TokenInvalid,
            other => AccountError::Token(other),
        }
    }
}

impl From<UserServiceError> for AccountError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::PasswordMismatch => AccountError::PasswordMismatch,
            UserServiceError::EmailTaken => AccountError::AlreadyExists,
            UserServiceError::UserNotFound => AccountError::UnknownEmail,
            e @ (UserServiceError::InvalidEmail
            | UserServiceError::WeakPassword
            | UserServiceError::IncompleteAddress) => AccountError::Validation(e.to_string()),
            other => AccountError::User(other),
        }
    }
}

impl From<AuthServiceError> for AccountError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::InvalidCredentials | AuthServiceError::UserNotFound => {
                AccountError::InvalidCredentials
            }
            AuthServiceError::AccountDisabled => AccountError::AccountDisabled,
            AuthServiceError::EmailNotVerified => AccountError::NotVerified,
            AuthServiceError::RepositoryError(e) => AccountError::User(e.into()),
        }
    }
}

impl AccountError {
    /// True when the message is safe and useful to show on a form.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            AccountError::Email(_) | AccountError::Token(_) | AccountError::User(_)
        )
    }
}

pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// New account created; a verification link is on its way.
    VerificationSent,
    /// The address belongs to a Google-created account without a password.
    /// Nothing was changed; the owner was mailed a link to choose one.
    PasswordSetupSent,
}

pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

/// A signed-in user plus the session token for the `access_token` cookie.
#[derive(Debug)]
pub struct SessionGrant {
    pub user: User,
    pub token: String,
}

pub struct AccountService {
    user_service: Arc<UserService>,
    auth_service: Arc<AuthService>,
    tokens: Arc<TokenService>,
    jobs: JobQueue,
    base_url: String,
    access_token_ttl: Duration,
    email_token_ttl: Duration,
}

impl AccountService {
    pub fn new(
        user_service: Arc<UserService>,
        auth_service: Arc<AuthService>,
        tokens: Arc<TokenService>,
        jobs: JobQueue,
        base_url: impl Into<String>,
        access_token_ttl: Duration,
        email_token_ttl: Duration,
    ) -> Self {
        Self {
            user_service,
            auth_service,
            tokens,
            jobs,
            base_url: base_url.into(),
            access_token_ttl,
            email_token_ttl,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterOutcome, AccountError> {
        if request.password != request.confirm_password {
            return Err(AccountError::PasswordMismatch);
        }
        validate_password(&request.password)?;

        let email = normalize_email(&request.email);
        validate_email(&email)?;

        if let Some(existing) = self.user_service.find_user_by_email(&email).await? {
            if existing.has_password() {
                return Err(AccountError::AlreadyExists);
            }

            // Only the mailbox owner may set the first password
            let token = self.tokens.issue(
                &existing.email,
                TokenPurpose::PasswordRecovery,
                self.email_token_ttl,
            )?;
            let message = password_setup_email(
                &self.base_url,
                &existing.email,
                &existing.display_name(),
                &token,
                self.email_token_ttl.num_minutes(),
            )?;
            self.enqueue(Job::SendEmail(message));
            info!("Password setup link sent to OAuth account {}", existing.email);
            return Ok(RegisterOutcome::PasswordSetupSent);
        }

        let user = self
            .user_service
            .create_user(CreateUserRequest {
                email,
                password: request.password,
                password_confirm: None,
                first_name: request.first_name,
                last_name: request.last_name,
                email_verified: false,
            })
            .await?;

        info!("Registered new user {}", user.email);
        self.send_verification(&user)?;
        Ok(RegisterOutcome::VerificationSent)
    }

    /// Check credentials and mint a session token.
    ///
    /// An unverified account gets a fresh verification mail and
    /// [`AccountError::NotVerified`].
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionGrant, AccountError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        match self.auth_service.authenticate(request).await {
            Ok(user) => {
                let token = self.issue_session(&user)?;
                info!("User {} logged in", user.email);
                Ok(SessionGrant { user, token })
            }
            Err(AuthServiceError::EmailNotVerified) => {
                if let Some(user) = self.user_service.find_user_by_email(email).await? {
                    self.send_verification(&user)?;
                }
                warn!("Login refused for unverified account {}", email);
                Err(AccountError::NotVerified)
            }
            Err(e) => {
                warn!("Login failed for {}: {}", email, e);
                Err(e.into())
            }
        }
    }

    pub async fn verify_email(&self, token: &str) -> Result<User, AccountError> {
        let email = self.tokens.verify(token, TokenPurpose::EmailVerification)?;
        let user = self
            .user_service
            .find_user_by_email(&email)
            .await?
            .ok_or(AccountError::TokenInvalid)?;

        if !user.is_verified {
            self.user_service.verify_user_email(user.id).await?;
            info!("Email verified for {}", user.email);
        }

        Ok(user)
    }

    pub async fn resend_verification(&self, email: &str) -> Result<(), AccountError> {
        let user = self
            .user_service
            .find_user_by_email(email)
            .await?
            .ok_or(AccountError::UnknownEmail)?;
        self.send_verification(&user)
    }

    pub async fn request_password_recovery(&self, email: &str) -> Result<(), AccountError> {
        let user = self
            .user_service
            .find_user_by_email(email)
            .await?
            .ok_or(AccountError::UnknownEmail)?;

        let token = self.tokens.issue(
            &user.email,
            TokenPurpose::PasswordRecovery,
            self.email_token_ttl,
        )?;
        let message = recovery_email(
            &self.base_url,
            &user.email,
            &user.display_name(),
            &token,
            self.email_token_ttl.num_minutes(),
        )?;
        self.enqueue(Job::SendEmail(message));
        info!("Password recovery requested for {}", user.email);
        Ok(())
    }

    /// Validate a recovery link and return the address it was issued for.
    pub fn check_recovery_token(&self, token: &str) -> Result<String, AccountError> {
        Ok(self.tokens.verify(token, TokenPurpose::PasswordRecovery)?)
    }

    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<User, AccountError> {
        let email = self.check_recovery_token(&request.token)?;
        if request.password != request.confirm_password {
            return Err(AccountError::PasswordMismatch);
        }
        validate_password(&request.password)?;

        let user = self
            .user_service
            .find_user_by_email(&email)
            .await?
            .ok_or(AccountError::TokenInvalid)?;

        self.user_service
            .update_password(UpdatePasswordRequest {
                user_id: user.id,
                new_password: request.password,
                new_password_confirm: None,
            })
            .await?;
        // Following the mailed link proves ownership of the address
        self.user_service.verify_user_email(user.id).await?;

        info!("Password reset for {}", user.email);
        Ok(user)
    }

    /// Upsert the user behind a Google profile and open a session.
    pub async fn oauth_login(&self, profile: &OAuthProfile) -> Result<SessionGrant, AccountError> {
        let user = self.user_service.upsert_oauth_user(profile).await?;
        if !user.is_active {
            return Err(AccountError::AccountDisabled);
        }

        let token = self.issue_session(&user)?;
        info!("User {} logged in with Google", user.email);
        Ok(SessionGrant { user, token })
    }

    /// Resolve the `access_token` cookie to an active user.
    pub async fn current_user(&self, token: &str) -> Result<User, AccountError> {
        let email = self.tokens.verify(token, TokenPurpose::Session)?;
        match self.auth_service.get_active_user_by_email(&email).await {
            Ok(user) => Ok(user),
            Err(AuthServiceError::UserNotFound) => Err(AccountError::TokenInvalid),
            Err(e) => Err(e.into()),
        }
    }

    pub fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }

    fn issue_session(&self, user: &User) -> Result<String, AccountError> {
        Ok(self
            .tokens
            .issue(&user.email, TokenPurpose::Session, self.access_token_ttl)?)
    }

    fn send_verification(&self, user: &User) -> Result<(), AccountError> {
        let token = self.tokens.issue(
            &user.email,
            TokenPurpose::EmailVerification,
            self.email_token_ttl,
        )?;
        let message = verification_email(
            &self.base_url,
            &user.email,
            &user.display_name(),
            &token,
            self.email_token_ttl.num_minutes(),
        )?;
        self.enqueue(Job::SendEmail(message));
        Ok(())
    }

    fn enqueue(&self, job: Job) {
        crate::jobs::enqueue_or_warn(&self.jobs, job);
    }
}
