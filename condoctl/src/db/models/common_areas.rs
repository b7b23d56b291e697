//! Database models for common areas and reservations.

use crate::api::models::common_areas::{CommonAreaCreate, CommonAreaUpdate, ReservationStatus, ReservationUpdate};
use crate::types::{CommonAreaId, ReservationId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct CommonAreaCreateDBRequest {
    pub name: String,
    pub description: Option<String>,
    pub capacity: i32,
    pub is_active: bool,
}

impl From<CommonAreaCreate> for CommonAreaCreateDBRequest {
    fn from(api: CommonAreaCreate) -> Self {
        Self {
            name: api.name.trim().to_string(),
            description: api.description,
            capacity: api.capacity,
            is_active: api.is_active,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommonAreaUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub capacity: Option<i32>,
    pub is_active: Option<bool>,
}

impl From<CommonAreaUpdate> for CommonAreaUpdateDBRequest {
    fn from(api: CommonAreaUpdate) -> Self {
        Self {
            name: api.name.map(|n| n.trim().to_string()),
            description: api.description,
            capacity: api.capacity,
            is_active: api.is_active,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CommonAreaDBResponse {
    pub id: CommonAreaId,
    pub name: String,
    pub description: Option<String>,
    pub capacity: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ReservationCreateDBRequest {
    pub area_id: CommonAreaId,
    pub user_id: UserId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReservationUpdateDBRequest {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub status: Option<ReservationStatus>,
}

impl From<ReservationUpdate> for ReservationUpdateDBRequest {
    fn from(api: ReservationUpdate) -> Self {
        Self {
            start_time: api.start_time,
            end_time: api.end_time,
            notes: api.notes,
            status: api.status,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ReservationDBResponse {
    pub id: ReservationId,
    pub area_id: CommonAreaId,
    pub area_name: String,
    pub user_id: UserId,
    pub username: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: ReservationStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
