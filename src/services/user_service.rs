use crate::models::{Address, NewUser, OAuthProfile, Role, User};
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 64;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").unwrap()
});

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("All address fields are required")]
    IncompleteAddress,
    #[error("User not found")]
    UserNotFound,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Password hashing failed: {0}")]
    HashingError(String),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
}

pub struct UpdatePasswordRequest {
    pub user_id: i64,
    pub new_password: String,
    pub new_password_confirm: Option<String>,
}

pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, UserServiceError> {
        let email = normalize_email(&request.email);
        validate_email(&email)?;

        if let Some(ref confirm) = request.password_confirm {
            if request.password != *confirm {
                return Err(UserServiceError::PasswordMismatch);
            }
        }
        validate_password(&request.password)?;

        let password_hash = hash_password(&request.password)?;

        let new_user = NewUser {
            email,
            password_hash: Some(password_hash),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            is_verified: request.email_verified,
            photo: None,
        };

        match self.repository.create_user(&new_user).await {
            Ok(user) => Ok(user),
            Err(RepositoryError::AlreadyExists) => Err(UserServiceError::EmailTaken),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    /// Create or refresh the account behind a Google profile.
    pub async fn upsert_oauth_user(
        &self,
        profile: &OAuthProfile,
    ) -> Result<User, UserServiceError> {
        let email = normalize_email(&profile.email);
        validate_email(&email)?;

        if let Some(existing) = self.repository.find_by_email(&email).await? {
            return Ok(self.repository.update_from_oauth(existing.id, profile).await?);
        }

        let new_user = NewUser {
            email,
            password_hash: None,
            first_name: profile.given_name.clone(),
            last_name: profile.family_name.clone(),
            is_verified: profile.verified_email,
            photo: profile.picture.clone(),
        };

        match self.repository.create_user(&new_user).await {
            Ok(user) => Ok(user),
            Err(RepositoryError::AlreadyExists) => Err(UserServiceError::EmailTaken),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_email(&normalize_email(email)).await?)
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    pub async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<User>, UserServiceError> {
        Ok(self.repository.list_users(limit, offset).await?)
    }

    pub async fn count_users(&self) -> Result<i64, UserServiceError> {
        Ok(self.repository.count().await?)
    }

    pub async fn verify_user_email(&self, id: i64) -> Result<(), UserServiceError> {
        match self.repository.mark_verified(id).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn update_password(
        &self,
        request: UpdatePasswordRequest,
    ) -> Result<(), UserServiceError> {
        if let Some(ref confirm) = request.new_password_confirm {
            if request.new_password != *confirm {
                return Err(UserServiceError::PasswordMismatch);
            }
        }
        validate_password(&request.new_password)?;

        let password_hash = hash_password(&request.new_password)?;

        match self
            .repository
            .update_password(request.user_id, &password_hash)
            .await
        {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn set_role(&self, id: i64, role: Role) -> Result<(), UserServiceError> {
        match self.repository.set_role(id, role).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn set_active(&self, id: i64, active: bool) -> Result<(), UserServiceError> {
        match self.repository.set_active(id, active).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn update_photo(&self, id: i64, photo: &str) -> Result<(), UserServiceError> {
        match self.repository.update_photo(id, photo).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn find_address(&self, user_id: i64) -> Result<Option<Address>, UserServiceError> {
        Ok(self.repository.find_address(user_id).await?)
    }

    pub async fn save_address(
        &self,
        user_id: i64,
        street: &str,
        city: &str,
        country: &str,
    ) -> Result<Address, UserServiceError> {
        let (street, city, country) = (street.trim(), city.trim(), country.trim());
        if street.is_empty() || city.is_empty() || country.is_empty() {
            return Err(UserServiceError::IncompleteAddress);
        }

        Ok(self
            .repository
            .upsert_address(user_id, street, city, country)
            .await?)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), UserServiceError> {
    if email.is_empty() || email.len() > 255 || !EMAIL_RE.is_match(email) {
        return Err(UserServiceError::InvalidEmail);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), UserServiceError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(UserServiceError::WeakPassword);
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, UserServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserServiceError::HashingError(e.to_string()))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    if let Ok(parsed_hash) = PasswordHash::new(password_hash) {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    } else {
        false
    }
}
