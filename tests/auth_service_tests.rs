use fieldwatch::{
    repositories::user_repository::SqliteUserRepository,
    services::{
        auth_service::{AuthService, AuthServiceError, LoginRequest},
        user_service::{CreateUserRequest, UserService},
    },
    test_utils::test_helpers,
};
use std::sync::Arc;

fn create_request(email: &str, password: &str, verified: bool) -> CreateUserRequest {
    CreateUserRequest {
        email: email.to_string(),
        password: password.to_string(),
        password_confirm: None,
        first_name: "Auth".to_string(),
        last_name: "Tester".to_string(),
        email_verified: verified,
    }
}

fn login(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_authenticate_success() {
    // Create isolated test database
    let pool = test_helpers::create_test_db().await.unwrap();
    let repository = Arc::new(SqliteUserRepository::new(pool));
    let user_service = UserService::new(repository.clone());
    let auth_service = AuthService::new(repository);

    let created_user = user_service
        .create_user(create_request("auth@example.com", "correctpassword", true))
        .await
        .unwrap();

    // Email lookup ignores case and surrounding whitespace
    let authenticated_user = auth_service
        .authenticate(login("  AUTH@example.com ", "correctpassword"))
        .await
        .unwrap();
    assert_eq!(authenticated_user.id, created_user.id);
    assert_eq!(authenticated_user.email, "auth@example.com");
}

#[tokio::test]
async fn test_authenticate_wrong_password() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let repository = Arc::new(SqliteUserRepository::new(pool));
    let user_service = UserService::new(repository.clone());
    let auth_service = AuthService::new(repository);

    user_service
        .create_user(create_request("wrongpass@example.com", "correctpassword", true))
        .await
        .unwrap();

    let result = auth_service
        .authenticate(login("wrongpass@example.com", "wrongpassword"))
        .await;
    assert!(matches!(
        result.unwrap_err(),
        AuthServiceError::InvalidCredentials
    ));
}

#[tokio::test]
async fn test_authenticate_nonexistent_user() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let repository = Arc::new(SqliteUserRepository::new(pool));
    let auth_service = AuthService::new(repository);

    let result = auth_service
        .authenticate(login("nonexistent@example.com", "anypassword"))
        .await;
    assert!(matches!(
        result.unwrap_err(),
        AuthServiceError::InvalidCredentials
    ));
}

#[tokio::test]
async fn test_unverified_reported_only_after_password_matches() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let repository = Arc::new(SqliteUserRepository::new(pool));
    let user_service = UserService::new(repository.clone());
    let auth_service = AuthService::new(repository);

    user_service
        .create_user(create_request("pending@example.com", "password123", false))
        .await
        .unwrap();

    let result = auth_service
        .authenticate(login("pending@example.com", "not-the-password"))
        .await;
    assert!(matches!(
        result.unwrap_err(),
        AuthServiceError::InvalidCredentials
    ));

    let result = auth_service
        .authenticate(login("pending@example.com", "password123"))
        .await;
    assert!(matches!(
        result.unwrap_err(),
        AuthServiceError::EmailNotVerified
    ));
}

#[tokio::test]
async fn test_disabled_account_is_refused() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let repository = Arc::new(SqliteUserRepository::new(pool));
    let user_service = UserService::new(repository.clone());
    let auth_service = AuthService::new(repository);

    // Disabled wins over unverified
    let user = user_service
        .create_user(create_request("disabled@example.com", "password123", false))
        .await
        .unwrap();
    user_service.set_active(user.id, false).await.unwrap();

    let result = auth_service
        .authenticate(login("disabled@example.com", "password123"))
        .await;
    assert!(matches!(
        result.unwrap_err(),
        AuthServiceError::AccountDisabled
    ));

    assert!(matches!(
        auth_service
            .get_active_user_by_email("disabled@example.com")
            .await,
        Err(AuthServiceError::AccountDisabled)
    ));
}

#[tokio::test]
async fn test_get_user_by_id() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let repository = Arc::new(SqliteUserRepository::new(pool));
    let user_service = UserService::new(repository.clone());
    let auth_service = AuthService::new(repository);

    let created_user = user_service
        .create_user(create_request("byid@example.com", "password123", false))
        .await
        .unwrap();

    let found_user = auth_service.get_user_by_id(created_user.id).await.unwrap();
    assert_eq!(found_user.id, created_user.id);
    assert_eq!(found_user.email, "byid@example.com");
    assert_eq!(found_user.display_name(), "Auth Tester");
}

#[tokio::test]
async fn test_get_user_by_id_not_found() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let repository = Arc::new(SqliteUserRepository::new(pool));
    let auth_service = AuthService::new(repository);

    let result = auth_service.get_user_by_id(9999).await;
    assert!(matches!(result.unwrap_err(), AuthServiceError::UserNotFound));
}
