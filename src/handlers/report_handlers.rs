use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::handlers::{script_json, PageLinks, UploadForm};
use crate::middleware::csrf::{form_token, validate_csrf_form_field};
use crate::models::{Report, ReportDetail, User, KNOWN_TITLES};
use crate::pagination::{PageParams, PageRequest, Paginate};
use crate::services::pdf_service::SUMMARY_FILENAME;
use crate::services::report_service::{ReportError, ReportInput};
use crate::services::upload_service::UploadError;
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use serde::Deserialize;
use tower_sessions::Session;

const RECENT_HOURS: i64 = 24;

#[derive(Template, WebTemplate)]
#[template(path = "reports.html")]
struct ReportsTemplate {
    current_user: User,
    reports: Vec<ReportDetail>,
    total: i64,
    pager: PageLinks,
}

#[derive(Template, WebTemplate)]
#[template(path = "report.html")]
struct ReportTemplate {
    current_user: User,
    error: Option<String>,
    csrf_token: String,
    title: String,
    latitude: String,
    longitude: String,
    titles: Vec<&'static str>,
    locations_json: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "map.html")]
struct MapTemplate {
    current_user: User,
    start_date: String,
    end_date: String,
    types: Vec<String>,
    location_count: usize,
    locations_json: String,
}

#[derive(Deserialize)]
pub struct MapQuery {
    start_date: Option<String>,
    end_date: Option<String>,
}

/// Values echoed back into the report form after a rejected submission.
#[derive(Default)]
struct ReportFormValues {
    title: String,
    latitude: String,
    longitude: String,
}

/// GET /reports - paginated report table
pub async fn reports_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let request = PageRequest::from_params(&params)?;
    let mut page = state.report_service.reports_page(&request).await?;
    let pager = PageLinks::new("/reports", &request, Report::DEFAULT_SORT, &page);

    Ok(ReportsTemplate {
        current_user: user,
        reports: std::mem::take(&mut page.items),
        total: page.total,
        pager,
    })
}

async fn render_report_form(
    state: &AppState,
    user: User,
    session: &Session,
    error: Option<String>,
    values: ReportFormValues,
    status: StatusCode,
) -> Result<Response, AppError> {
    let locations = state.report_service.recent_locations(RECENT_HOURS).await?;

    let template = ReportTemplate {
        current_user: user,
        error,
        csrf_token: form_token(session).await,
        title: values.title,
        latitude: values.latitude,
        longitude: values.longitude,
        titles: KNOWN_TITLES.to_vec(),
        locations_json: script_json(&locations)?,
    };
    Ok((status, template).into_response())
}

/// GET /report - creation form with the last day's locations
pub async fn report_page(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
) -> Result<Response, AppError> {
    render_report_form(
        &state,
        user,
        &session,
        None,
        ReportFormValues::default(),
        StatusCode::OK,
    )
    .await
}

fn parse_coordinate(value: &str, name: &str) -> Result<f64, String> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("{name} must be a number"))
}

/// POST /report - multipart form with `title`, `latitude`, `longitude` and `files`
pub async fn create_report_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = UploadForm::read(multipart, "files").await?;

    if validate_csrf_form_field(&session, form.field("csrf_token"))
        .await
        .is_err()
    {
        return Err(AppError::Forbidden);
    }

    let values = ReportFormValues {
        title: form.field("title").to_string(),
        latitude: form.field("latitude").to_string(),
        longitude: form.field("longitude").to_string(),
    };

    let coordinates = parse_coordinate(&values.latitude, "Latitude").and_then(|lat| {
        parse_coordinate(&values.longitude, "Longitude").map(|lon| (lat, lon))
    });
    let (latitude, longitude) = match coordinates {
        Ok(pair) => pair,
        Err(msg) => {
            return render_report_form(
                &state,
                user,
                &session,
                Some(msg),
                values,
                StatusCode::BAD_REQUEST,
            )
            .await;
        }
    };

    let input = ReportInput {
        title: values.title.clone(),
        latitude,
        longitude,
    };

    match state
        .report_service
        .create_report(user.id, input, form.files)
        .await
    {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(err @ ReportError::Database(_)) | Err(err @ ReportError::Upload(UploadError::Io(_))) => {
            Err(err.into())
        }
        Err(err) => {
            tracing::warn!("Rejected report from user {}: {}", user.id, err);
            render_report_form(
                &state,
                user,
                &session,
                Some(err.to_string()),
                values,
                StatusCode::BAD_REQUEST,
            )
            .await
        }
    }
}

/// GET /map - report locations, optionally bounded by date
pub async fn map_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<MapQuery>,
) -> Result<impl IntoResponse, AppError> {
    let view = state
        .report_service
        .map_view(query.start_date.as_deref(), query.end_date.as_deref())
        .await?;

    Ok(MapTemplate {
        current_user: user,
        start_date: query.start_date.unwrap_or_default(),
        end_date: query.end_date.unwrap_or_default(),
        location_count: view.locations.len(),
        locations_json: script_json(&view.locations)?,
        types: view.types,
    })
}

/// GET /reports/summary.pdf - reports of the last 24 hours
pub async fn summary_pdf_handler(State(state): State<AppState>) -> Result<Response, AppError> {
    let bytes = state.pdf_service.summary_pdf().await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename={SUMMARY_FILENAME}"),
            ),
        ],
        bytes,
    )
        .into_response())
}
