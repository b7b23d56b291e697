//! API request/response models for units.

use super::households::{FamilyMemberResponse, PetResponse, VehicleResponse};
use super::pagination::Pagination;
use super::users::UserResponse;
use crate::db::models::units::UnitDBResponse;
use crate::types::{UnitId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnitCreate {
    pub code: String,
    #[serde(default)]
    pub tower: String,
    #[serde(default)]
    pub number: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UnitUpdate {
    pub code: Option<String>,
    pub tower: Option<String>,
    pub number: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnitResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UnitId,
    pub code: String,
    pub tower: String,
    pub number: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
    pub owner_username: Option<String>,
    pub owner_full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A unit together with its owner and the owner's household
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnitDetailResponse {
    #[serde(flatten)]
    pub unit: UnitResponse,
    pub owner: Option<UserResponse>,
    pub vehicles: Vec<VehicleResponse>,
    pub pets: Vec<PetResponse>,
    pub family_members: Vec<FamilyMemberResponse>,
}

/// Sort keys accepted by the unit list; a leading `-` reverses the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitOrdering {
    #[default]
    Code,
    Tower,
    Number,
    OwnerUsername,
}

impl UnitOrdering {
    /// Parse an `ordering` query value into a key and a descending flag
    pub fn parse(value: &str) -> Option<(Self, bool)> {
        let (descending, key) = match value.strip_prefix('-') {
            Some(key) => (true, key),
            None => (false, value),
        };
        let ordering = match key {
            "code" => UnitOrdering::Code,
            "tower" => UnitOrdering::Tower,
            "number" => UnitOrdering::Number,
            "owner_username" | "owner__username" => UnitOrdering::OwnerUsername,
            _ => return None,
        };
        Some((ordering, descending))
    }
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListUnitsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive match on code, tower, number, owner username or owner full name
    pub search: Option<String>,

    /// One of code, tower, number, owner_username; prefix with `-` for descending
    pub ordering: Option<String>,
}

impl From<UnitDBResponse> for UnitResponse {
    fn from(db: UnitDBResponse) -> Self {
        Self {
            id: db.id,
            code: db.code,
            tower: db.tower,
            number: db.number,
            owner_id: db.owner_id,
            owner_username: db.owner_username,
            owner_full_name: db.owner_full_name,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_parse() {
        assert_eq!(UnitOrdering::parse("code"), Some((UnitOrdering::Code, false)));
        assert_eq!(UnitOrdering::parse("-tower"), Some((UnitOrdering::Tower, true)));
        assert_eq!(UnitOrdering::parse("owner__username"), Some((UnitOrdering::OwnerUsername, false)));
        assert_eq!(UnitOrdering::parse("password"), None);
    }
}
