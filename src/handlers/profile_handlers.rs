use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::handlers::UploadForm;
use crate::jobs::{enqueue_or_warn, Job};
use crate::middleware::csrf::{form_token, validate_csrf_form_field};
use crate::models::{Address, AddressForm, Report, User};
use crate::services::upload_service::UploadError;
use crate::services::user_service::UserServiceError;
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Form, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use serde::Deserialize;
use tower_sessions::Session;

#[derive(Template, WebTemplate)]
#[template(path = "profile.html")]
struct ProfileTemplate {
    current_user: User,
    address: Option<Address>,
    report_count: i64,
    error: Option<String>,
    notice: Option<String>,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct ProfileQuery {
    notice: Option<String>,
}

fn profile_notice(code: &str) -> Option<&'static str> {
    match code {
        "photo" => Some("Your photo has been updated."),
        "address" => Some("Your address has been saved."),
        _ => None,
    }
}

async fn render_profile(
    state: &AppState,
    user: User,
    session: &Session,
    error: Option<String>,
    notice: Option<String>,
    status: StatusCode,
) -> Result<Response, AppError> {
    let address = state
        .user_service
        .find_address(user.id)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    let report_count = Report::count_by_user(&state.pool, user.id).await?;

    let template = ProfileTemplate {
        current_user: user,
        address,
        report_count,
        error,
        notice,
        csrf_token: form_token(session).await,
    };
    Ok((status, template).into_response())
}

/// GET /profile
pub async fn profile_page(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
    Query(query): Query<ProfileQuery>,
) -> Result<Response, AppError> {
    let notice = query
        .notice
        .as_deref()
        .and_then(profile_notice)
        .map(str::to_string);
    render_profile(&state, user, &session, None, notice, StatusCode::OK).await
}

/// POST /profile/photo - replace the profile photo
pub async fn upload_photo_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = UploadForm::read(multipart, "file").await?;

    if validate_csrf_form_field(&session, form.field("csrf_token"))
        .await
        .is_err()
    {
        return Err(AppError::Forbidden);
    }

    let Some(file) = form.files.first() else {
        let msg = UploadError::NoFiles.to_string();
        return render_profile(&state, user, &session, Some(msg), None, StatusCode::BAD_REQUEST)
            .await;
    };

    let stored = match state.upload_service.store_one(file).await {
        Ok(stored) => stored,
        Err(UploadError::Io(e)) => return Err(AppError::Internal(e.into())),
        Err(err) => {
            tracing::warn!("Rejected photo from user {}: {}", user.id, err);
            return render_profile(
                &state,
                user,
                &session,
                Some(err.to_string()),
                None,
                StatusCode::BAD_REQUEST,
            )
            .await;
        }
    };

    state
        .user_service
        .update_photo(user.id, &stored.url)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    enqueue_or_warn(&state.jobs, Job::NormalizeImage { path: stored.path });

    tracing::info!("User {} updated their photo", user.id);
    Ok(Redirect::to("/profile?notice=photo").into_response())
}

/// POST /profile/address - create or replace the address
pub async fn update_address_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
    Form(form): Form<AddressForm>,
) -> Result<Response, AppError> {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return Err(AppError::Forbidden);
    }

    match state
        .user_service
        .save_address(user.id, &form.street, &form.city, &form.country)
        .await
    {
        Ok(_) => Ok(Redirect::to("/profile?notice=address").into_response()),
        Err(UserServiceError::IncompleteAddress) => {
            let msg = UserServiceError::IncompleteAddress.to_string();
            render_profile(&state, user, &session, Some(msg), None, StatusCode::BAD_REQUEST).await
        }
        Err(e) => Err(AppError::Internal(e.into())),
    }
}
