//! Database models for vehicles, pets and family members.

use crate::api::models::households::{FamilyMemberCreate, FamilyMemberUpdate, PetCreate, PetUpdate, VehicleCreate, VehicleUpdate};
use crate::types::{FamilyMemberId, PetId, UserId, VehicleId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct VehicleCreateDBRequest {
    pub owner_id: UserId,
    pub plate: String,
    pub brand: String,
    pub model: String,
    pub color: String,
}

impl From<VehicleCreate> for VehicleCreateDBRequest {
    fn from(api: VehicleCreate) -> Self {
        Self {
            owner_id: api.owner_id,
            plate: api.plate.trim().to_uppercase(),
            brand: api.brand,
            model: api.model,
            color: api.color,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VehicleUpdateDBRequest {
    pub owner_id: Option<UserId>,
    pub plate: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
}

impl From<VehicleUpdate> for VehicleUpdateDBRequest {
    fn from(api: VehicleUpdate) -> Self {
        Self {
            owner_id: api.owner_id,
            plate: api.plate.map(|p| p.trim().to_uppercase()),
            brand: api.brand,
            model: api.model,
            color: api.color,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct VehicleDBResponse {
    pub id: VehicleId,
    pub owner_id: UserId,
    pub plate: String,
    pub brand: String,
    pub model: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PetCreateDBRequest {
    pub owner_id: UserId,
    pub name: String,
    pub species: String,
    pub breed: String,
}

impl From<PetCreate> for PetCreateDBRequest {
    fn from(api: PetCreate) -> Self {
        Self {
            owner_id: api.owner_id,
            name: api.name,
            species: api.species,
            breed: api.breed,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PetUpdateDBRequest {
    pub owner_id: Option<UserId>,
    pub name: Option<String>,
    pub species: Option<String>,
    pub breed: Option<String>,
}

impl From<PetUpdate> for PetUpdateDBRequest {
    fn from(api: PetUpdate) -> Self {
        Self {
            owner_id: api.owner_id,
            name: api.name,
            species: api.species,
            breed: api.breed,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PetDBResponse {
    pub id: PetId,
    pub owner_id: UserId,
    pub name: String,
    pub species: String,
    pub breed: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FamilyMemberCreateDBRequest {
    pub owner_id: UserId,
    pub full_name: String,
    pub relationship: String,
    pub phone: Option<String>,
}

impl From<FamilyMemberCreate> for FamilyMemberCreateDBRequest {
    fn from(api: FamilyMemberCreate) -> Self {
        Self {
            owner_id: api.owner_id,
            full_name: api.full_name,
            relationship: api.relationship,
            phone: api.phone,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FamilyMemberUpdateDBRequest {
    pub owner_id: Option<UserId>,
    pub full_name: Option<String>,
    pub relationship: Option<String>,
    pub phone: Option<String>,
}

impl From<FamilyMemberUpdate> for FamilyMemberUpdateDBRequest {
    fn from(api: FamilyMemberUpdate) -> Self {
        Self {
            owner_id: api.owner_id,
            full_name: api.full_name,
            relationship: api.relationship,
            phone: api.phone,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct FamilyMemberDBResponse {
    pub id: FamilyMemberId,
    pub owner_id: UserId,
    pub full_name: String,
    pub relationship: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
