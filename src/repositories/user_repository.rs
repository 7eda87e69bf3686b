use crate::models::user::USER_COLUMNS;
use crate::models::{Address, NewUser, OAuthProfile, Role, User};
use crate::pagination::fold_case;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("User not found")]
    NotFound,
    #[error("User already exists")]
    AlreadyExists,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, new_user: &NewUser) -> RepositoryResult<User>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>>;
    async fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()>;
    async fn mark_verified(&self, id: i64) -> RepositoryResult<()>;
    async fn update_from_oauth(&self, id: i64, profile: &OAuthProfile) -> RepositoryResult<User>;
    async fn update_photo(&self, id: i64, photo: &str) -> RepositoryResult<()>;
    async fn set_role(&self, id: i64, role: Role) -> RepositoryResult<()>;
    async fn set_active(&self, id: i64, active: bool) -> RepositoryResult<()>;
    async fn find_address(&self, user_id: i64) -> RepositoryResult<Option<Address>>;
    async fn upsert_address(
        &self,
        user_id: i64,
        street: &str,
        city: &str,
        country: &str,
    ) -> RepositoryResult<Address>;
    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<User>>;
    async fn count(&self) -> RepositoryResult<i64>;
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn expect_row(result: sqlx::sqlite::SqliteQueryResult) -> RepositoryResult<()> {
        if result.rows_affected() == 0 {
            Err(RepositoryError::NotFound)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_user(&self, new_user: &NewUser) -> RepositoryResult<User> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, first_name_folded,
                               last_name_folded, is_verified, photo, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, COALESCE(?, '/static/img/user.svg'), ?, ?)
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(fold_case(&new_user.first_name))
        .bind(fold_case(&new_user.last_name))
        .bind(new_user.is_verified)
        .bind(&new_user.photo)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(res) => {
                let id = res.last_insert_rowid();
                self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
            }
            Err(e) => {
                if e.to_string().contains("UNIQUE") {
                    Err(RepositoryError::AlreadyExists)
                } else {
                    Err(RepositoryError::Database(e))
                }
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now().naive_utc())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Self::expect_row(result)
    }

    async fn mark_verified(&self, id: i64) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE users SET is_verified = TRUE, updated_at = ? WHERE id = ?")
            .bind(Utc::now().naive_utc())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Self::expect_row(result)
    }

    async fn update_from_oauth(&self, id: i64, profile: &OAuthProfile) -> RepositoryResult<User> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET first_name = ?, last_name = ?, first_name_folded = ?, last_name_folded = ?,
                photo = COALESCE(?, photo), is_verified = (is_verified OR ?), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&profile.given_name)
        .bind(&profile.family_name)
        .bind(fold_case(&profile.given_name))
        .bind(fold_case(&profile.family_name))
        .bind(&profile.picture)
        .bind(profile.verified_email)
        .bind(Utc::now().naive_utc())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Self::expect_row(result)?;
        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn update_photo(&self, id: i64, photo: &str) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE users SET photo = ?, updated_at = ? WHERE id = ?")
            .bind(photo)
            .bind(Utc::now().naive_utc())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Self::expect_row(result)
    }

    async fn set_role(&self, id: i64, role: Role) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role)
            .bind(Utc::now().naive_utc())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Self::expect_row(result)
    }

    async fn set_active(&self, id: i64, active: bool) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(Utc::now().naive_utc())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Self::expect_row(result)
    }

    async fn find_address(&self, user_id: i64) -> RepositoryResult<Option<Address>> {
        let address = sqlx::query_as::<_, Address>(
            "SELECT id, user_id, street, city, country FROM addresses WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(address)
    }

    async fn upsert_address(
        &self,
        user_id: i64,
        street: &str,
        city: &str,
        country: &str,
    ) -> RepositoryResult<Address> {
        let address = sqlx::query_as::<_, Address>(
            r#"
            INSERT INTO addresses (user_id, street, city, country)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                street = excluded.street,
                city = excluded.city,
                country = excluded.country
            RETURNING id, user_id, street, city, country
            "#,
        )
        .bind(user_id)
        .bind(street)
        .bind(city)
        .bind(country)
        .fetch_one(&self.pool)
        .await?;

        Ok(address)
    }

    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<User>> {
        let limit = limit.unwrap_or(100);
        let offset = offset.unwrap_or(0);

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn count(&self) -> RepositoryResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
