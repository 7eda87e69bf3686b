use crate::auth::middleware::{clear_session_cookie, session_cookie};
use crate::middleware::csrf::{form_token, validate_csrf_form_field};
use crate::services::{
    account_service::{AccountError, RegisterOutcome, RegisterRequest, ResetPasswordRequest},
    oauth_service::{validate_callback, OAuthError, OAUTH_STATE_KEY},
    GoogleOAuthClient,
};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Form, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tower_sessions::Session;

const CSRF_ERROR: &str = "Invalid security token. Please refresh the page and try again.";
const GENERIC_ERROR: &str = "Something went wrong. Please try again.";

#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
struct LoginTemplate {
    error: Option<String>,
    notice: Option<String>,
    email: String,
    csrf_token: String,
    google_enabled: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
struct RegisterTemplate {
    error: Option<String>,
    first_name: String,
    last_name: String,
    email: String,
    csrf_token: String,
    google_enabled: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
struct ForgotPasswordTemplate {
    error: Option<String>,
    csrf_token: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_password.html")]
struct ResetPasswordTemplate {
    error: Option<String>,
    token: String,
    csrf_token: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/token_expired.html")]
struct TokenExpiredTemplate {
    message: String,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    first_name: String,
    last_name: String,
    email: String,
    password: String,
    confirm_password: String,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct EmailForm {
    email: String,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordForm {
    token: String,
    password: String,
    confirm_password: String,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct LoginQuery {
    notice: Option<String>,
}

#[derive(Deserialize)]
pub struct GoogleCallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Message shown above the login form after a redirect.
pub fn notice_message(code: &str) -> Option<&'static str> {
    match code {
        "sent" => Some("Check your email for a verification link."),
        "setup" => Some("Check your email for a link to set a password for this account."),
        "verified" => Some("Your email has been verified. You can now log in."),
        "recovery" => Some("Check your email for a password recovery link."),
        "changed" => Some("Your password has been changed. You can now log in."),
        _ => None,
    }
}

fn form_message(err: &AccountError) -> String {
    if err.is_user_facing() {
        err.to_string()
    } else {
        tracing::error!("Account flow failed: {}", err);
        GENERIC_ERROR.to_string()
    }
}

fn login_redirect(notice: &str) -> Response {
    Redirect::to(&format!("/auth/login?notice={notice}")).into_response()
}

async fn login_error(state: &AppState, session: &Session, msg: String, email: String) -> Response {
    LoginTemplate {
        error: Some(msg),
        notice: None,
        email,
        csrf_token: form_token(session).await,
        google_enabled: state.config.google_enabled(),
    }
    .into_response()
}

async fn forgot_password_error(session: &Session, msg: &str, status: StatusCode) -> Response {
    let template = ForgotPasswordTemplate {
        error: Some(msg.to_string()),
        csrf_token: form_token(session).await,
    };
    (status, template).into_response()
}

async fn token_expired_page(session: &Session, msg: &str, status: StatusCode) -> Response {
    let template = TokenExpiredTemplate {
        message: msg.to_string(),
        csrf_token: form_token(session).await,
    };
    (status, template).into_response()
}

fn signed_in(state: &AppState, jar: CookieJar, token: String) -> Response {
    let cookie = session_cookie(
        token,
        state.account_service.access_token_ttl(),
        state.config.is_production(),
    );
    (jar.add(cookie), Redirect::to("/")).into_response()
}

pub async fn login_page(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<LoginQuery>,
) -> Response {
    LoginTemplate {
        error: None,
        notice: query
            .notice
            .as_deref()
            .and_then(notice_message)
            .map(str::to_string),
        email: String::new(),
        csrf_token: form_token(&session).await,
        google_enabled: state.config.google_enabled(),
    }
    .into_response()
}

pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return login_error(&state, &session, CSRF_ERROR.to_string(), form.email).await;
    }

    match state
        .account_service
        .login(&form.email, &form.password)
        .await
    {
        Ok(grant) => {
            tracing::info!("User {} logged in", grant.user.id);
            signed_in(&state, jar, grant.token)
        }
        Err(err) => {
            tracing::warn!("Login rejected: {}", err);
            login_error(&state, &session, form_message(&err), form.email).await
        }
    }
}

pub async fn register_page(State(state): State<AppState>, session: Session) -> Response {
    RegisterTemplate {
        error: None,
        first_name: String::new(),
        last_name: String::new(),
        email: String::new(),
        csrf_token: form_token(&session).await,
        google_enabled: state.config.google_enabled(),
    }
    .into_response()
}

pub async fn register_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Response {
    let error = if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        CSRF_ERROR.to_string()
    } else {
        let request = RegisterRequest {
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            email: form.email.clone(),
            password: form.password,
            confirm_password: form.confirm_password,
        };
        match state.account_service.register(request).await {
            Ok(RegisterOutcome::VerificationSent) => return login_redirect("sent"),
            Ok(RegisterOutcome::PasswordSetupSent) => return login_redirect("setup"),
            Err(err) => {
                tracing::warn!("Registration rejected: {}", err);
                form_message(&err)
            }
        }
    };

    RegisterTemplate {
        error: Some(error),
        first_name: form.first_name,
        last_name: form.last_name,
        email: form.email,
        csrf_token: form_token(&session).await,
        google_enabled: state.config.google_enabled(),
    }
    .into_response()
}

pub async fn logout_handler(jar: CookieJar, session: Session) -> Response {
    if let Err(e) = session.flush().await {
        tracing::warn!("Failed to flush session on logout: {}", e);
    }
    (clear_session_cookie(jar), Redirect::to("/auth/login")).into_response()
}

pub async fn verify_email_handler(
    State(state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
) -> Response {
    match state.account_service.verify_email(&token).await {
        Ok(user) => {
            tracing::info!("User {} verified their email", user.id);
            login_redirect("verified")
        }
        Err(AccountError::TokenExpired) => {
            token_expired_page(
                &session,
                "Your verification link has expired. Enter your email to receive a new one.",
                StatusCode::OK,
            )
            .await
        }
        Err(AccountError::TokenInvalid) => {
            token_expired_page(
                &session,
                "This verification link is invalid.",
                StatusCode::BAD_REQUEST,
            )
            .await
        }
        Err(err) => {
            token_expired_page(&session, &form_message(&err), StatusCode::BAD_REQUEST).await
        }
    }
}

pub async fn resend_verification_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<EmailForm>,
) -> Response {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return token_expired_page(&session, CSRF_ERROR, StatusCode::FORBIDDEN).await;
    }

    match state.account_service.resend_verification(&form.email).await {
        Ok(()) => login_redirect("sent"),
        Err(err) => token_expired_page(&session, &form_message(&err), StatusCode::OK).await,
    }
}

pub async fn forgot_password_page(session: Session) -> Response {
    ForgotPasswordTemplate {
        error: None,
        csrf_token: form_token(&session).await,
    }
    .into_response()
}

pub async fn forgot_password_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<EmailForm>,
) -> Response {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return forgot_password_error(&session, CSRF_ERROR, StatusCode::FORBIDDEN).await;
    }

    match state
        .account_service
        .request_password_recovery(&form.email)
        .await
    {
        Ok(()) => login_redirect("recovery"),
        Err(err) => forgot_password_error(&session, &form_message(&err), StatusCode::OK).await,
    }
}

pub async fn recovery_page(
    State(state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
) -> Response {
    match state.account_service.check_recovery_token(&token) {
        Ok(_) => ResetPasswordTemplate {
            error: None,
            token,
            csrf_token: form_token(&session).await,
        }
        .into_response(),
        Err(AccountError::TokenExpired) => {
            forgot_password_error(
                &session,
                "Your recovery link has expired. Request a new one below.",
                StatusCode::OK,
            )
            .await
        }
        Err(_) => {
            forgot_password_error(
                &session,
                "This recovery link is invalid.",
                StatusCode::BAD_REQUEST,
            )
            .await
        }
    }
}

pub async fn password_reset_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ResetPasswordForm>,
) -> Response {
    let error = if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        CSRF_ERROR.to_string()
    } else {
        let request = ResetPasswordRequest {
            token: form.token.clone(),
            password: form.password,
            confirm_password: form.confirm_password,
        };
        match state.account_service.reset_password(request).await {
            Ok(user) => {
                tracing::info!("User {} reset their password", user.id);
                return login_redirect("changed");
            }
            Err(AccountError::TokenExpired) => {
                return forgot_password_error(
                    &session,
                    "Your recovery link has expired. Request a new one below.",
                    StatusCode::OK,
                )
                .await;
            }
            Err(AccountError::TokenInvalid) => {
                return forgot_password_error(
                    &session,
                    "This recovery link is invalid.",
                    StatusCode::BAD_REQUEST,
                )
                .await;
            }
            Err(err) => form_message(&err),
        }
    };

    ResetPasswordTemplate {
        error: Some(error),
        token: form.token,
        csrf_token: form_token(&session).await,
    }
    .into_response()
}

fn google_client(state: &AppState) -> Option<&GoogleOAuthClient> {
    state.oauth_client.as_deref()
}

pub async fn google_login(State(state): State<AppState>, session: Session) -> Response {
    let Some(client) = google_client(&state) else {
        return Redirect::to("/auth/login").into_response();
    };

    let oauth_state = GoogleOAuthClient::generate_state();
    if let Err(e) = session.insert(OAUTH_STATE_KEY, &oauth_state).await {
        tracing::error!("Failed to store OAuth state: {}", e);
        return login_error(&state, &session, GENERIC_ERROR.to_string(), String::new()).await;
    }

    Redirect::to(&client.authorization_url(&oauth_state)).into_response()
}

pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    session: Session,
    Query(query): Query<GoogleCallbackQuery>,
) -> Response {
    let Some(client) = google_client(&state) else {
        return Redirect::to("/auth/login").into_response();
    };

    let expected: Option<String> = session.remove(OAUTH_STATE_KEY).await.unwrap_or_else(|e| {
        tracing::warn!("Failed to read OAuth state: {}", e);
        None
    });

    let code = match validate_callback(
        query.error.as_deref(),
        query.code.as_deref(),
        query.state.as_deref(),
        expected.as_deref(),
    ) {
        Ok(code) => code,
        Err(OAuthError::AccessDenied) | Err(OAuthError::MissingCode) => {
            return Redirect::to("/auth/login").into_response();
        }
        Err(err) => {
            tracing::warn!("Rejected Google callback: {}", err);
            return login_error(
                &state,
                &session,
                "Google sign-in failed. Please try again.".to_string(),
                String::new(),
            )
            .await;
        }
    };

    let profile = match client.exchange_code(&code).await {
        Ok(profile) => profile,
        Err(err) => {
            tracing::error!("Google sign-in failed: {}", err);
            return login_error(
                &state,
                &session,
                "Google sign-in failed. Please try again.".to_string(),
                String::new(),
            )
            .await;
        }
    };

    match state.account_service.oauth_login(&profile).await {
        Ok(grant) => {
            tracing::info!("User {} signed in with Google", grant.user.id);
            signed_in(&state, jar, grant.token)
        }
        Err(err) => login_error(&state, &session, form_message(&err), profile.email).await,
    }
}
