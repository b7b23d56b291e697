//! API models for maintenance requests, their comments and attachments.

use super::pagination::Pagination;
use crate::db::models::maintenance::{AttachmentDBResponse, CommentDBResponse, MaintenanceRequestDBResponse};
use crate::types::{AttachmentId, CommentId, MaintenanceRequestId, UnitId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// PENDING -> IN_PROGRESS -> RESOLVED; staff and admins may set any value
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "maintenance_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaintenanceStatus {
    Pending,
    InProgress,
    Resolved,
}

impl MaintenanceStatus {
    pub fn label(self) -> &'static str {
        match self {
            MaintenanceStatus::Pending => "pending",
            MaintenanceStatus::InProgress => "in progress",
            MaintenanceStatus::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "maintenance_priority", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaintenancePriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaintenanceRequestCreate {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub unit_id: Option<UnitId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: Option<MaintenancePriority>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MaintenanceRequestUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<MaintenancePriority>,
    /// Staff and admins only
    pub status: Option<MaintenanceStatus>,
    /// Staff and admins only
    #[schema(value_type = Option<String>, format = "uuid")]
    pub assigned_to: Option<UserId>,
}

impl MaintenanceRequestUpdate {
    /// Whether the update touches fields reserved for staff
    pub fn touches_workflow(&self) -> bool {
        self.status.is_some() || self.assigned_to.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaintenanceRequestResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: MaintenanceRequestId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub unit_id: Option<UnitId>,
    pub unit_code: Option<String>,
    #[schema(value_type = String, format = "uuid")]
    pub reported_by: UserId,
    pub reported_by_username: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub assigned_to: Option<UserId>,
    pub assigned_to_username: Option<String>,
    pub title: String,
    pub description: String,
    pub status: MaintenanceStatus,
    pub priority: MaintenancePriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListMaintenanceRequestsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<MaintenanceStatus>,

    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub unit_id: Option<UnitId>,

    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub assigned_to: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentCreate {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CommentId,
    #[schema(value_type = String, format = "uuid")]
    pub request_id: MaintenanceRequestId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttachmentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AttachmentId,
    #[schema(value_type = String, format = "uuid")]
    pub request_id: MaintenanceRequestId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub uploaded_by: Option<UserId>,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// Multipart body of an attachment upload (documentation only)
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct AttachmentUpload {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

impl From<MaintenanceRequestDBResponse> for MaintenanceRequestResponse {
    fn from(db: MaintenanceRequestDBResponse) -> Self {
        Self {
            id: db.id,
            unit_id: db.unit_id,
            unit_code: db.unit_code,
            reported_by: db.reported_by,
            reported_by_username: db.reported_by_username,
            assigned_to: db.assigned_to,
            assigned_to_username: db.assigned_to_username,
            title: db.title,
            description: db.description,
            status: db.status,
            priority: db.priority,
            created_at: db.created_at,
            updated_at: db.updated_at,
            resolved_at: db.resolved_at,
        }
    }
}

impl From<CommentDBResponse> for CommentResponse {
    fn from(db: CommentDBResponse) -> Self {
        Self {
            id: db.id,
            request_id: db.request_id,
            user_id: db.user_id,
            username: db.username,
            body: db.body,
            created_at: db.created_at,
        }
    }
}

impl From<AttachmentDBResponse> for AttachmentResponse {
    fn from(db: AttachmentDBResponse) -> Self {
        Self {
            id: db.id,
            request_id: db.request_id,
            uploaded_by: db.uploaded_by,
            file_name: db.file_name,
            content_type: db.content_type,
            size_bytes: db.size_bytes,
            uploaded_at: db.uploaded_at,
        }
    }
}
