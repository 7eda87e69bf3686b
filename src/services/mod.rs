pub mod account_service;
pub mod auth_service;
pub mod dashboard_service;
pub mod email_service;
pub mod oauth_service;
pub mod pdf_service;
pub mod report_service;
pub mod team_service;
pub mod token_service;
pub mod upload_service;
pub mod user_service;

pub use account_service::{AccountError, AccountService};
pub use auth_service::AuthService;
pub use dashboard_service::DashboardService;
pub use email_service::{create_email_service, EmailMessage, EmailService};
pub use oauth_service::GoogleOAuthClient;
pub use pdf_service::PdfService;
pub use report_service::ReportService;
pub use team_service::TeamService;
pub use token_service::{TokenPurpose, TokenService};
pub use upload_service::UploadService;
pub use user_service::UserService;
