//! Database models for users and profiles.

use crate::api::models::users::{ProfileUpdate, Role};
use crate::types::UserId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a user together with its profile
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
}

/// Database request for updating a user; `None` leaves a column unchanged
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: Option<bool>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
}

/// A user joined with its profile (profile columns default when the row is missing)
#[derive(Debug, Clone, FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdateDBRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

impl From<ProfileUpdate> for ProfileUpdateDBRequest {
    fn from(api: ProfileUpdate) -> Self {
        Self {
            full_name: api.full_name,
            phone: api.phone,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ProfileDBResponse {
    pub user_id: UserId,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub updated_at: DateTime<Utc>,
}
