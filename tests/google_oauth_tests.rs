use fieldwatch::{
    config::GoogleConfig,
    services::oauth_service::{GoogleOAuthClient, OAuthError},
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> GoogleOAuthClient {
    GoogleOAuthClient::new(GoogleConfig {
        client_id: "client-1".to_string(),
        client_secret: "client-secret".to_string(),
        redirect_uri: "http://localhost:8080/auth/google/callback".to_string(),
        auth_url: format!("{}/o/oauth2/auth", server.uri()),
        token_url: format!("{}/token", server.uri()),
        userinfo_url: format!("{}/userinfo", server.uri()),
    })
}

#[tokio::test]
async fn test_exchange_code_fetches_profile() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=auth-code-1"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-123",
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "1234567890",
            "email": "field.agent@example.com",
            "verified_email": true,
            "given_name": "Field",
            "family_name": "Agent",
            "picture": "https://example.com/a.jpg"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let profile = client_for(&mock_server)
        .exchange_code("auth-code-1")
        .await
        .unwrap();

    assert_eq!(profile.email, "field.agent@example.com");
    assert_eq!(profile.given_name, "Field");
    assert_eq!(profile.family_name, "Agent");
    assert_eq!(profile.picture.as_deref(), Some("https://example.com/a.jpg"));
    assert!(profile.verified_email);
}

#[tokio::test]
async fn test_profile_without_optional_fields() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "tok" })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "email": "bare@example.com" })),
        )
        .mount(&mock_server)
        .await;

    let profile = client_for(&mock_server).exchange_code("c").await.unwrap();
    assert_eq!(profile.email, "bare@example.com");
    assert_eq!(profile.given_name, "");
    assert!(profile.picture.is_none());
    assert!(!profile.verified_email);
}

#[tokio::test]
async fn test_rejected_code_is_token_exchange_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })),
        )
        .mount(&mock_server)
        .await;

    let err = client_for(&mock_server)
        .exchange_code("stale")
        .await
        .unwrap_err();

    match err {
        OAuthError::TokenExchange(message) => {
            assert!(message.contains("400"));
            assert!(message.contains("invalid_grant"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_userinfo_failure_is_profile_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "tok" })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let err = client_for(&mock_server).exchange_code("c").await.unwrap_err();
    assert!(matches!(err, OAuthError::Profile(_)));
}

#[test]
fn test_authorization_url_targets_configured_endpoint() {
    let client = GoogleOAuthClient::new(GoogleConfig {
        client_id: "client-1".to_string(),
        client_secret: "client-secret".to_string(),
        redirect_uri: "http://localhost:8080/auth/google/callback".to_string(),
        auth_url: "http://127.0.0.1:9/o/oauth2/auth".to_string(),
        token_url: "http://127.0.0.1:9/token".to_string(),
        userinfo_url: "http://127.0.0.1:9/userinfo".to_string(),
    });

    let url = client.authorization_url("state-xyz");
    assert!(url.starts_with("http://127.0.0.1:9/o/oauth2/auth?"));
    assert!(url.contains("state=state-xyz"));
    assert!(url.contains("scope=openid+email+profile"));
}
