use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::handlers::script_json;
use crate::models::{ReportDetail, User};
use crate::services::dashboard_service::{DashboardStats, TitleCount};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse, Extension};

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
struct DashboardTemplate {
    current_user: User,
    stats: DashboardStats,
    by_title: Vec<TitleCount>,
    latest: Vec<ReportDetail>,
    pie_json: String,
    trend_json: String,
}

/// GET / - counts, charts and the latest reports
pub async fn dashboard_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let data = state.dashboard_service.load().await?;

    let pie_json = script_json(&data.by_title)?;
    let trend_json = script_json(&data.trend)?;

    Ok(DashboardTemplate {
        current_user: user,
        stats: data.stats,
        by_title: data.by_title,
        latest: data.latest,
        pie_json,
        trend_json,
    })
}
