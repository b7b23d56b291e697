//! Database models for maintenance requests, comments and attachments.

use crate::api::models::maintenance::{MaintenancePriority, MaintenanceRequestUpdate, MaintenanceStatus};
use crate::types::{AttachmentId, CommentId, MaintenanceRequestId, UnitId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct MaintenanceRequestCreateDBRequest {
    pub unit_id: Option<UnitId>,
    pub reported_by: UserId,
    pub title: String,
    pub description: String,
    pub priority: MaintenancePriority,
    pub status: MaintenanceStatus,
}

#[derive(Debug, Clone, Default)]
pub struct MaintenanceRequestUpdateDBRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<MaintenancePriority>,
    pub status: Option<MaintenanceStatus>,
    pub assigned_to: Option<UserId>,
}

impl From<MaintenanceRequestUpdate> for MaintenanceRequestUpdateDBRequest {
    fn from(api: MaintenanceRequestUpdate) -> Self {
        Self {
            title: api.title,
            description: api.description,
            priority: api.priority,
            status: api.status,
            assigned_to: api.assigned_to,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MaintenanceRequestDBResponse {
    pub id: MaintenanceRequestId,
    pub unit_id: Option<UnitId>,
    pub unit_code: Option<String>,
    pub reported_by: UserId,
    pub reported_by_username: String,
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

#[derive(Debug, Clone)]
pub struct CommentCreateDBRequest {
    pub request_id: MaintenanceRequestId,
    pub user_id: UserId,
    pub body: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct CommentDBResponse {
    pub id: CommentId,
    pub request_id: MaintenanceRequestId,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AttachmentCreateDBRequest {
    pub request_id: MaintenanceRequestId,
    pub uploaded_by: UserId,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct AttachmentDBResponse {
    pub id: AttachmentId,
    pub request_id: MaintenanceRequestId,
    pub uploaded_by: Option<UserId>,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    pub uploaded_at: DateTime<Utc>,
}
