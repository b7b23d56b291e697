//! API models for notices and notice categories.

use super::pagination::Pagination;
use crate::db::models::notices::{NoticeCategoryDBResponse, NoticeDBResponse};
use crate::types::{NoticeCategoryId, NoticeId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NoticeCategoryCreate {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NoticeCategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NoticeCategoryResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: NoticeCategoryId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NoticeCreate {
    pub title: String,
    pub body: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub category_id: Option<NoticeCategoryId>,
    /// Defaults to now; future dates schedule the notice
    pub publish_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NoticeUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub category_id: Option<NoticeCategoryId>,
    pub publish_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NoticeResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: NoticeId,
    pub title: String,
    pub body: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub category_id: Option<NoticeCategoryId>,
    pub category_name: Option<String>,
    pub publish_date: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub created_by: Option<UserId>,
    pub created_by_username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListNoticesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub category_id: Option<NoticeCategoryId>,

    /// Include notices whose publish date is in the future (admins only)
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<bool>)]
    pub include_scheduled: Option<bool>,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListNoticeCategoriesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

impl From<NoticeCategoryDBResponse> for NoticeCategoryResponse {
    fn from(db: NoticeCategoryDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            created_at: db.created_at,
        }
    }
}

impl From<NoticeDBResponse> for NoticeResponse {
    fn from(db: NoticeDBResponse) -> Self {
        Self {
            id: db.id,
            title: db.title,
            body: db.body,
            category_id: db.category_id,
            category_name: db.category_name,
            publish_date: db.publish_date,
            created_by: db.created_by,
            created_by_username: db.created_by_username,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
