//! Database models for units.

use crate::api::models::units::{UnitCreate, UnitUpdate};
use crate::types::{UnitId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct UnitCreateDBRequest {
    pub code: String,
    pub tower: String,
    pub number: String,
    pub owner_id: Option<UserId>,
}

impl From<UnitCreate> for UnitCreateDBRequest {
    fn from(api: UnitCreate) -> Self {
        Self {
            code: api.code.trim().to_string(),
            tower: api.tower,
            number: api.number,
            owner_id: api.owner_id,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UnitUpdateDBRequest {
    pub code: Option<String>,
    pub tower: Option<String>,
    pub number: Option<String>,
    pub owner_id: Option<UserId>,
}

impl From<UnitUpdate> for UnitUpdateDBRequest {
    fn from(api: UnitUpdate) -> Self {
        Self {
            code: api.code.map(|c| c.trim().to_string()),
            tower: api.tower,
            number: api.number,
            owner_id: api.owner_id,
        }
    }
}

/// A unit joined with its owner's username and full name
#[derive(Debug, Clone, FromRow)]
pub struct UnitDBResponse {
    pub id: UnitId,
    pub code: String,
    pub tower: String,
    pub number: String,
    pub owner_id: Option<UserId>,
    pub owner_username: Option<String>,
    pub owner_full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
