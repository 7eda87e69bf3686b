use askama::Template;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::env;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Failed to build email message: {0}")]
    MessageBuild(String),
    #[error("Failed to send email: {0}")]
    SendFailed(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// A rendered HTML message ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

#[derive(Template)]
#[template(path = "email/verification.html")]
struct VerificationEmailTemplate<'a> {
    name: &'a str,
    link: &'a str,
    expire_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/recovery.html")]
struct RecoveryEmailTemplate<'a> {
    name: &'a str,
    link: &'a str,
    expire_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/password_setup.html")]
struct PasswordSetupEmailTemplate<'a> {
    name: &'a str,
    link: &'a str,
    expire_minutes: i64,
}

pub fn verification_email(
    base_url: &str,
    recipient: &str,
    name: &str,
    token: &str,
    expire_minutes: i64,
) -> Result<EmailMessage, EmailError> {
    let link = format!("{}/auth/verify/{}", base_url, token);
    let html_body = VerificationEmailTemplate {
        name,
        link: &link,
        expire_minutes,
    }
    .render()
    .map_err(|e| EmailError::MessageBuild(e.to_string()))?;

    Ok(EmailMessage {
        recipients: vec![recipient.to_string()],
        subject: "Verify your Fieldwatch account".to_string(),
        html_body,
    })
}

pub fn recovery_email(
    base_url: &str,
    recipient: &str,
    name: &str,
    token: &str,
    expire_minutes: i64,
) -> Result<EmailMessage, EmailError> {
    let link = format!("{}/auth/recovery/{}", base_url, token);
    let html_body = RecoveryEmailTemplate {
        name,
        link: &link,
        expire_minutes,
    }
    .render()
    .map_err(|e| EmailError::MessageBuild(e.to_string()))?;

    Ok(EmailMessage {
        recipients: vec![recipient.to_string()],
        subject: "Reset your Fieldwatch password".to_string(),
        html_body,
    })
}

/// Invitation to choose a first password for a Google-created account.
/// The link goes through the recovery form so only the mailbox owner sets it.
pub fn password_setup_email(
    base_url: &str,
    recipient: &str,
    name: &str,
    token: &str,
    expire_minutes: i64,
) -> Result<EmailMessage, EmailError> {
    let link = format!("{}/auth/recovery/{}", base_url, token);
    let html_body = PasswordSetupEmailTemplate {
        name,
        link: &link,
        expire_minutes,
    }
    .render()
    .map_err(|e| EmailError::MessageBuild(e.to_string()))?;

    Ok(EmailMessage {
        recipients: vec![recipient.to_string()],
        subject: "Set a password for your Fieldwatch account".to_string(),
        html_body,
    })
}

/// Logs messages instead of delivering them.
#[derive(Default)]
pub struct ConsoleEmailService;

impl ConsoleEmailService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailService for ConsoleEmailService {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        tracing::info!("[CONSOLE EMAIL] To: {}", message.recipients.join(", "));
        tracing::info!("   Subject: {}", message.subject);
        tracing::debug!("   Body: {}", message.html_body);
        Ok(())
    }
}

pub struct SmtpEmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailService {
    pub fn new() -> Result<Self, EmailError> {
        let smtp_host = env::var("SMTP_HOST")
            .map_err(|_| EmailError::ConfigError("SMTP_HOST not set".to_string()))?;
        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .map_err(|_| EmailError::ConfigError("Invalid SMTP_PORT".to_string()))?;
        let smtp_username = env::var("SMTP_USERNAME")
            .map_err(|_| EmailError::ConfigError("SMTP_USERNAME not set".to_string()))?;
        let smtp_password = env::var("SMTP_PASSWORD")
            .map_err(|_| EmailError::ConfigError("SMTP_PASSWORD not set".to_string()))?;
        let from_email = env::var("SMTP_FROM_EMAIL")
            .map_err(|_| EmailError::ConfigError("SMTP_FROM_EMAIL not set".to_string()))?;
        let from_name = env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Fieldwatch".to_string());

        let encryption = env::var("SMTP_ENCRYPTION").unwrap_or_else(|_| "starttls".to_string());

        let credentials = Credentials::new(smtp_username, smtp_password);

        let mailer = match encryption.to_lowercase().as_str() {
            "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp_host)
                .map_err(|e| EmailError::ConfigError(format!("SMTP relay error: {}", e)))?
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            "starttls" => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp_host)
                .map_err(|e| EmailError::ConfigError(format!("SMTP starttls error: {}", e)))?
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            "none" => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp_host)
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            _ => {
                return Err(EmailError::ConfigError(format!(
                    "Invalid SMTP_ENCRYPTION value: {}. Use 'tls', 'starttls', or 'none'",
                    encryption
                )))
            }
        };

        let from = format!("{} <{}>", from_name, from_email)
            .parse()
            .map_err(|e| EmailError::ConfigError(format!("Invalid from address: {}", e)))?;

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl EmailService for SmtpEmailService {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        if message.recipients.is_empty() {
            return Err(EmailError::MessageBuild("No recipients".to_string()));
        }

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML);

        for recipient in &message.recipients {
            builder = builder.to(recipient
                .parse()
                .map_err(|e| EmailError::MessageBuild(format!("Invalid to address: {}", e)))?);
        }

        let email = builder
            .body(message.html_body.clone())
            .map_err(|e| EmailError::MessageBuild(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        Ok(())
    }
}

pub fn create_email_service() -> Box<dyn EmailService> {
    if env::var("SMTP_HOST").is_ok() {
        match SmtpEmailService::new() {
            Ok(service) => {
                tracing::info!("Using SMTP email service");
                Box::new(service)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize SMTP email service: {}. Falling back to console service",
                    e
                );
                Box::new(ConsoleEmailService::new())
            }
        }
    } else {
        tracing::info!(
            "SMTP not configured. Using console email service (emails will be logged)"
        );
        Box::new(ConsoleEmailService::new())
    }
}
