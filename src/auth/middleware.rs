use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::error::AppError;
use crate::models::User;
use crate::services::AccountError;
use crate::AppState;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const LOGIN_PATH: &str = "/auth/login";

/// The signed-in user, inserted into request extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

pub fn session_cookie(token: String, ttl: chrono::Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(ttl.num_seconds()))
        .build()
}

pub fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"))
}

/// `Ok(None)` when there is no cookie or its credentials are no longer
/// valid; `Err` when the user could not be looked up at all.
async fn resolve_user(state: &AppState, jar: &CookieJar) -> Result<Option<User>, AccountError> {
    let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) else {
        return Ok(None);
    };
    match state.account_service.current_user(cookie.value()).await {
        Ok(user) => Ok(Some(user)),
        Err(
            e @ (AccountError::TokenInvalid
            | AccountError::TokenExpired
            | AccountError::AccountDisabled),
        ) => {
            tracing::debug!("Rejected access token: {}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve_user(&state, &jar).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        Ok(None) if jar.get(ACCESS_TOKEN_COOKIE).is_some() => {
            (clear_session_cookie(jar), Redirect::to(LOGIN_PATH)).into_response()
        }
        Ok(None) => Redirect::to(LOGIN_PATH).into_response(),
        // The cookie may still be good; keep it
        Err(e) => AppError::Internal(e.into()).into_response(),
    }
}

pub async fn redirect_if_authenticated(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    match resolve_user(&state, &jar).await {
        Ok(Some(_)) => Redirect::to("/").into_response(),
        Ok(None) => next.run(request).await,
        Err(e) => AppError::Internal(e.into()).into_response(),
    }
}
