use crate::models::user::User;
use crate::repositories::user_repository::UserRepository;
use crate::services::user_service::{normalize_email, verify_password};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Account not verified")]
    EmailNotVerified,
    #[error("Account disabled")]
    AccountDisabled,
    #[error("User not found")]
    UserNotFound,
    #[error("Repository error: {0}")]
    RepositoryError(#[from] crate::repositories::user_repository::RepositoryError),
}

pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub struct AuthService {
    user_repository: Arc<dyn UserRepository>,
}

impl AuthService {
    pub fn new(user_repository: Arc<dyn UserRepository>) -> Self {
        Self { user_repository }
    }

    /// Check credentials. An unverified account is reported only after the
    /// password matched, so the caller may resend the verification mail.
    pub async fn authenticate(&self, request: LoginRequest) -> Result<User, AuthServiceError> {
        let user = self
            .user_repository
            .find_by_email(&normalize_email(&request.email))
            .await?
            .ok_or(AuthServiceError::InvalidCredentials)?;

        // Accounts created through Google have no password until they register one
        let Some(password_hash) = user.password_hash.as_deref() else {
            return Err(AuthServiceError::InvalidCredentials);
        };

        if !verify_password(&request.password, password_hash) {
            return Err(AuthServiceError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthServiceError::AccountDisabled);
        }

        if !user.is_verified {
            return Err(AuthServiceError::EmailNotVerified);
        }

        Ok(user)
    }

    pub async fn get_user_by_id(&self, user_id: i64) -> Result<User, AuthServiceError> {
        self.user_repository
            .find_by_id(user_id)
            .await?
            .ok_or(AuthServiceError::UserNotFound)
    }

    /// Resolve the user named by a session token's subject.
    pub async fn get_active_user_by_email(&self, email: &str) -> Result<User, AuthServiceError> {
        let user = self
            .user_repository
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AuthServiceError::UserNotFound)?;

        if !user.is_active {
            return Err(AuthServiceError::AccountDisabled);
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::user_repository::MockUserRepository;
    use crate::services::user_service::hash_password;
    use crate::test_utils::test_helpers::sample_user;

    fn user_with_password(password: &str) -> User {
        let mut user = sample_user(7, "test@example.com");
        user.password_hash = Some(hash_password(password).unwrap());
        user
    }

    #[tokio::test]
    async fn test_authenticate_invalid_email() {
        let mut mock_repo = MockUserRepository::new();

        mock_repo
            .expect_find_by_email()
            .withf(|email| email == "test@example.com")
            .times(1)
            .returning(|_| Ok(None));

        let service = AuthService::new(Arc::new(mock_repo));

        let request = LoginRequest {
            email: "Test@Example.com".to_string(),
            password: "password123".to_string(),
        };

        let result = service.authenticate(request).await;
        assert!(matches!(result, Err(AuthServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password() {
        let user = user_with_password("password123");
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));

        let service = AuthService::new(Arc::new(mock_repo));
        let result = service
            .authenticate(LoginRequest {
                email: "test@example.com".to_string(),
                password: "wrong-password".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AuthServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_authenticate_passwordless_account() {
        let mut user = sample_user(3, "oauth@example.com");
        user.password_hash = None;
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));

        let service = AuthService::new(Arc::new(mock_repo));
        let result = service
            .authenticate(LoginRequest {
                email: "oauth@example.com".to_string(),
                password: "anything-at-all".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AuthServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_authenticate_unverified_and_disabled() {
        let mut unverified = user_with_password("password123");
        unverified.is_verified = false;
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_find_by_email()
            .returning(move |_| Ok(Some(unverified.clone())));
        let service = AuthService::new(Arc::new(mock_repo));
        let result = service
            .authenticate(LoginRequest {
                email: "test@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AuthServiceError::EmailNotVerified)));

        let mut disabled = user_with_password("password123");
        disabled.is_active = false;
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_find_by_email()
            .returning(move |_| Ok(Some(disabled.clone())));
        let service = AuthService::new(Arc::new(mock_repo));
        let result = service
            .authenticate(LoginRequest {
                email: "test@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AuthServiceError::AccountDisabled)));
    }

    #[tokio::test]
    async fn test_get_user_by_id_not_found() {
        let mut mock_repo = MockUserRepository::new();

        mock_repo
            .expect_find_by_id()
            .withf(|id| *id == 1)
            .times(1)
            .returning(|_| Ok(None));

        let service = AuthService::new(Arc::new(mock_repo));

        let result = service.get_user_by_id(1).await;
        assert!(matches!(result, Err(AuthServiceError::UserNotFound)));
    }
}
