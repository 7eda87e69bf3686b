pub mod test_helpers {
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use tempfile::NamedTempFile;

    use crate::config::AppConfig;
    use crate::jobs::JobRunner;
    use crate::models::{Role, User};
    use crate::services::email_service::{EmailError, EmailMessage, EmailService};
    use crate::AppState;

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Create a temporary file-based SQLite database for testing
    /// Useful when several connections must see the same data
    pub async fn create_test_db_file() -> Result<(SqlitePool, NamedTempFile), sqlx::Error> {
        let temp_file = NamedTempFile::new().map_err(sqlx::Error::Io)?;
        let db_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?;
        let database_url = format!("sqlite://{}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok((pool, temp_file))
    }

    /// Insert a test user with hashed password
    pub async fn insert_test_user(
        pool: &SqlitePool,
        email: &str,
        password: &str,
        verified: bool,
    ) -> Result<i64, sqlx::Error> {
        use argon2::{
            password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
            Argon2,
        };

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                sqlx::Error::Configuration(format!("Password hashing failed: {}", e).into())
            })?
            .to_string();

        let result = sqlx::query(
            "INSERT INTO users (email, password_hash, first_name, last_name, \
             first_name_folded, last_name_folded, is_verified) \
             VALUES (?, ?, 'Test', 'User', 'test', 'user', ?)",
        )
        .bind(email)
        .bind(password_hash)
        .bind(verified)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Insert a report with no images, created `hours_ago` hours in the past
    pub async fn insert_test_report(
        pool: &SqlitePool,
        user_id: i64,
        title: &str,
        hours_ago: i64,
    ) -> Result<i64, sqlx::Error> {
        let created = Utc::now().naive_utc() - chrono::Duration::hours(hours_ago);
        let result = sqlx::query(
            "INSERT INTO reports (title, title_folded, latitude, longitude, user_id, created_at, updated_at) \
             VALUES (?, ?, 33.27, 35.2, ?, ?, ?)",
        )
        .bind(title)
        .bind(crate::pagination::fold_case(title))
        .bind(user_id)
        .bind(created)
        .bind(created)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// A user value for mocked repositories
    pub fn sample_user(id: i64, email: &str) -> User {
        let now = Utc::now().naive_utc();
        User {
            id,
            email: email.to_string(),
            password_hash: None,
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            role: Role::User,
            is_verified: true,
            is_active: true,
            photo: "/static/img/user.svg".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Mailer that keeps every message in memory
    #[derive(Default)]
    pub struct RecordingEmailService {
        messages: Mutex<Vec<EmailMessage>>,
    }

    impl RecordingEmailService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn messages(&self) -> Vec<EmailMessage> {
            self.messages
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        }

        /// Poll until at least `count` messages arrived or two seconds passed
        pub async fn wait_for_count(&self, count: usize) -> Vec<EmailMessage> {
            for _ in 0..200 {
                let messages = self.messages();
                if messages.len() >= count {
                    return messages;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            self.messages()
        }
    }

    #[async_trait]
    impl EmailService for RecordingEmailService {
        async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
            self.messages
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(message.clone());
            Ok(())
        }
    }

    /// Extract the token from the first link with the given path prefix,
    /// e.g. `/auth/verify/`
    pub fn token_from_message(message: &EmailMessage, prefix: &str) -> Option<String> {
        let start = message.html_body.find(prefix)? + prefix.len();
        let token: String = message.html_body[start..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            .collect();
        (!token.is_empty()).then_some(token)
    }

    pub fn test_config(upload_dir: &Path) -> AppConfig {
        AppConfig {
            secret_key: "test-secret-key-with-enough-length-for-hmac".to_string(),
            upload_dir: upload_dir.to_path_buf(),
            image_target_size: 64,
            job_workers: 1,
            ..AppConfig::default()
        }
    }

    /// Fully wired state over a recording mailer
    pub fn test_state(
        pool: SqlitePool,
        config: AppConfig,
    ) -> (AppState, Arc<RecordingEmailService>, JobRunner) {
        let mailer = Arc::new(RecordingEmailService::new());
        let (state, runner) = AppState::build(config, pool, mailer.clone());
        (state, mailer, runner)
    }
}
