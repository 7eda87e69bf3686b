use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Address;
use crate::pagination::Paginate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Admin => "Admin",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_verified: bool,
    pub is_active: bool,
    pub photo: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.as_deref().is_some_and(|h| !h.is_empty())
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn created_display(&self) -> String {
        self.created_at.format("%Y-%m-%d").to_string()
    }
}

pub(crate) const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, \
     is_verified, is_active, photo, created_at, updated_at";

/// The user fields shown to other members; no credentials.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub photo: String,
    pub created_at: NaiveDateTime,
}

impl PublicUser {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }

    pub fn created_display(&self) -> String {
        self.created_at.format("%Y-%m-%d").to_string()
    }
}

impl Paginate for PublicUser {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static str = "id, email, first_name, last_name, role, photo, created_at";
    // Emails are stored already folded
    const SEARCHABLE: &'static [(&'static str, &'static str)] = &[
        ("email", "email"),
        ("first_name", "first_name_folded"),
        ("last_name", "last_name_folded"),
    ];
    const SORTABLE: &'static [&'static str] = &["created_at", "email", "first_name", "last_name"];
    const DEFAULT_SEARCH_FIELDS: &'static [&'static str] = &["email", "first_name", "last_name"];
    const DEFAULT_SORT: &'static str = "created_at";
}

/// Fields needed to insert a user row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub is_verified: bool,
    pub photo: Option<String>,
}

/// Profile returned by the Google userinfo endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OAuthProfile {
    pub email: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub verified_email: bool,
}

/// Author information attached to a report.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub photo: String,
}

impl UserSummary {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

/// A row of the team table.
#[derive(Debug, Clone, Serialize)]
pub struct TeamMember {
    pub user: PublicUser,
    pub address: Option<Address>,
    pub report_count: i64,
}
