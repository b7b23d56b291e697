//! Database models for notifications and the activity log.

use crate::types::{ActivityLogId, NotificationId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct NotificationCreateDBRequest {
    pub user_id: UserId,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct NotificationDBResponse {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ActivityLogCreateDBRequest {
    pub user_id: Option<UserId>,
    pub action: String,
    pub details: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct ActivityLogDBResponse {
    pub id: ActivityLogId,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub action: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
}
