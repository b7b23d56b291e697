//! Database models for notices and notice categories.

use crate::api::models::notices::{NoticeCategoryCreate, NoticeCategoryUpdate, NoticeUpdate};
use crate::types::{NoticeCategoryId, NoticeId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct NoticeCategoryCreateDBRequest {
    pub name: String,
    pub description: Option<String>,
}

impl From<NoticeCategoryCreate> for NoticeCategoryCreateDBRequest {
    fn from(api: NoticeCategoryCreate) -> Self {
        Self {
            name: api.name.trim().to_string(),
            description: api.description,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoticeCategoryUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl From<NoticeCategoryUpdate> for NoticeCategoryUpdateDBRequest {
    fn from(api: NoticeCategoryUpdate) -> Self {
        Self {
            name: api.name.map(|n| n.trim().to_string()),
            description: api.description,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct NoticeCategoryDBResponse {
    pub id: NoticeCategoryId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NoticeCreateDBRequest {
    pub title: String,
    pub body: String,
    pub category_id: Option<NoticeCategoryId>,
    pub publish_date: Option<DateTime<Utc>>,
    pub created_by: UserId,
}

#[derive(Debug, Clone, Default)]
pub struct NoticeUpdateDBRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub category_id: Option<NoticeCategoryId>,
    pub publish_date: Option<DateTime<Utc>>,
}

impl From<NoticeUpdate> for NoticeUpdateDBRequest {
    fn from(api: NoticeUpdate) -> Self {
        Self {
            title: api.title,
            body: api.body,
            category_id: api.category_id,
            publish_date: api.publish_date,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct NoticeDBResponse {
    pub id: NoticeId,
    pub title: String,
    pub body: String,
    pub category_id: Option<NoticeCategoryId>,
    pub category_name: Option<String>,
    pub publish_date: DateTime<Utc>,
    pub created_by: Option<UserId>,
    pub created_by_username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
