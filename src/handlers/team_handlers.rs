use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::handlers::PageLinks;
use crate::models::{PublicUser, TeamMember, User};
use crate::pagination::{PageParams, PageRequest, Paginate};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension,
};

#[derive(Template, WebTemplate)]
#[template(path = "team.html")]
struct TeamTemplate {
    current_user: User,
    members: Vec<TeamMember>,
    total: i64,
    pager: PageLinks,
}

/// GET /team - paginated member list
pub async fn team_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let request = PageRequest::from_params(&params)?;
    let mut page = state.team_service.members_page(&request).await?;
    let pager = PageLinks::new("/team", &request, PublicUser::DEFAULT_SORT, &page);

    Ok(TeamTemplate {
        current_user: user,
        members: std::mem::take(&mut page.items),
        total: page.total,
        pager,
    })
}
