use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::SessionStore;

use crate::auth::{handlers as auth_handlers, middleware as auth_middleware};
use crate::config::SessionLayer;
use crate::handlers;
use crate::middleware::add_security_headers;
use crate::AppState;

/// Upper bound on files in one report submission, used to size the body limit.
pub const MAX_FILES_PER_REQUEST: usize = 10;
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router<S>(state: AppState, session_layer: SessionLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    let body_limit = state
        .config
        .max_upload_bytes
        .saturating_mul(MAX_FILES_PER_REQUEST)
        .saturating_add(FORM_OVERHEAD_BYTES);

    let protected_routes = Router::new()
        .route("/", get(handlers::dashboard_handler))
        .route("/profile", get(handlers::profile_page))
        .route("/profile/photo", post(handlers::upload_photo_handler))
        .route("/profile/address", post(handlers::update_address_handler))
        .route("/team", get(handlers::team_handler))
        .route("/reports", get(handlers::reports_handler))
        .route("/reports/summary.pdf", get(handlers::summary_pdf_handler))
        .route(
            "/report",
            get(handlers::report_page).post(handlers::create_report_handler),
        )
        .route("/map", get(handlers::map_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::require_auth,
        ));

    // Signed-in users skip the login and register forms
    let guest_routes = Router::new()
        .route(
            "/auth/login",
            get(auth_handlers::login_page).post(auth_handlers::login_handler),
        )
        .route(
            "/auth/register",
            get(auth_handlers::register_page).post(auth_handlers::register_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::redirect_if_authenticated,
        ));

    let auth_routes = Router::new()
        .route(
            "/auth/logout",
            get(auth_handlers::logout_handler).post(auth_handlers::logout_handler),
        )
        .route(
            "/auth/verify/{token}",
            get(auth_handlers::verify_email_handler),
        )
        .route(
            "/auth/resend",
            post(auth_handlers::resend_verification_handler),
        )
        .route(
            "/auth/forgot_password",
            get(auth_handlers::forgot_password_page).post(auth_handlers::forgot_password_handler),
        )
        .route("/auth/recovery/{token}", get(auth_handlers::recovery_page))
        .route(
            "/auth/password_reset",
            post(auth_handlers::password_reset_handler),
        )
        .route("/auth/google", get(auth_handlers::google_login))
        .route("/auth/google/callback", get(auth_handlers::google_callback));

    Router::new()
        .merge(protected_routes)
        .merge(guest_routes)
        .merge(auth_routes)
        .nest_service("/static", ServeDir::new("static"))
        .nest_service("/uploads", ServeDir::new(state.config.upload_dir.clone()))
        .layer(session_layer)
        .layer(middleware::from_fn(add_security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
