pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod repositories;
pub mod routes;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use std::sync::Arc;

use config::AppConfig;
use jobs::{JobContext, JobQueue, JobRunner};
use repositories::SqliteUserRepository;
use services::{
    AccountService, AuthService, DashboardService, EmailService, GoogleOAuthClient, PdfService,
    ReportService, TeamService, TokenService, UploadService, UserService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: sqlx::SqlitePool,
    pub user_service: Arc<UserService>,
    pub auth_service: Arc<AuthService>,
    pub account_service: Arc<AccountService>,
    pub token_service: Arc<TokenService>,
    pub report_service: Arc<ReportService>,
    pub team_service: Arc<TeamService>,
    pub upload_service: Arc<UploadService>,
    pub dashboard_service: Arc<DashboardService>,
    pub pdf_service: Arc<PdfService>,
    pub oauth_client: Option<Arc<GoogleOAuthClient>>,
    pub jobs: JobQueue,
}

impl AppState {
    /// Wire every service and start the job workers.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(
        config: AppConfig,
        pool: sqlx::SqlitePool,
        email_service: Arc<dyn EmailService>,
    ) -> (Self, JobRunner) {
        let (jobs, runner) = jobs::start(
            JobContext {
                email_service,
                image_target_size: config.image_target_size,
            },
            config.job_workers,
        );

        let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
        let user_service = Arc::new(UserService::new(user_repository.clone()));
        let auth_service = Arc::new(AuthService::new(user_repository));
        let token_service = Arc::new(TokenService::new(
            &config.secret_key,
            config.jwt_algorithm,
        ));
        let account_service = Arc::new(AccountService::new(
            user_service.clone(),
            auth_service.clone(),
            token_service.clone(),
            jobs.clone(),
            config.base_url.clone(),
            config.access_token_ttl,
            config.email_token_ttl,
        ));
        let upload_service = Arc::new(UploadService::new(
            config.upload_dir.clone(),
            config.max_upload_bytes,
        ));
        let report_service = Arc::new(ReportService::new(
            pool.clone(),
            upload_service.clone(),
            jobs.clone(),
        ));
        let oauth_client = config
            .google
            .clone()
            .map(|google| Arc::new(GoogleOAuthClient::new(google)));

        let state = AppState {
            team_service: Arc::new(TeamService::new(pool.clone())),
            dashboard_service: Arc::new(DashboardService::new(pool.clone())),
            pdf_service: Arc::new(PdfService::new(pool.clone())),
            config: Arc::new(config),
            pool,
            user_service,
            auth_service,
            account_service,
            token_service,
            report_service,
            upload_service,
            oauth_client,
            jobs,
        };

        (state, runner)
    }
}
