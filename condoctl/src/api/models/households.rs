//! API models for the household registries: vehicles, pets and family members.

use super::pagination::Pagination;
use crate::db::models::households::{FamilyMemberDBResponse, PetDBResponse, VehicleDBResponse};
use crate::types::{FamilyMemberId, PetId, UserId, VehicleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VehicleCreate {
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    pub plate: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct VehicleUpdate {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
    pub plate: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VehicleResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: VehicleId,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    pub plate: String,
    pub brand: String,
    pub model: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PetCreate {
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    pub name: String,
    #[serde(default)]
    pub species: String,
    #[serde(default)]
    pub breed: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PetUpdate {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
    pub name: Option<String>,
    pub species: Option<String>,
    pub breed: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PetResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PetId,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    pub name: String,
    pub species: String,
    pub breed: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FamilyMemberCreate {
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    pub full_name: String,
    #[serde(default)]
    pub relationship: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct FamilyMemberUpdate {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
    pub full_name: Option<String>,
    pub relationship: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FamilyMemberResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: FamilyMemberId,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    pub full_name: String,
    pub relationship: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters shared by the household registry list endpoints
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListHouseholdQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only records belonging to this user
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
}

impl From<VehicleDBResponse> for VehicleResponse {
    fn from(db: VehicleDBResponse) -> Self {
        Self {
            id: db.id,
            owner_id: db.owner_id,
            plate: db.plate,
            brand: db.brand,
            model: db.model,
            color: db.color,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<PetDBResponse> for PetResponse {
    fn from(db: PetDBResponse) -> Self {
        Self {
            id: db.id,
            owner_id: db.owner_id,
            name: db.name,
            species: db.species,
            breed: db.breed,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<FamilyMemberDBResponse> for FamilyMemberResponse {
    fn from(db: FamilyMemberDBResponse) -> Self {
        Self {
            id: db.id,
            owner_id: db.owner_id,
            full_name: db.full_name,
            relationship: db.relationship,
            phone: db.phone,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
