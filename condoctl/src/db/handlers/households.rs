//! Database repositories for the records attached to a resident's household:
//! vehicles, pets and family members.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::households::{
        FamilyMemberCreateDBRequest, FamilyMemberDBResponse, FamilyMemberUpdateDBRequest, PetCreateDBRequest, PetDBResponse,
        PetUpdateDBRequest, VehicleCreateDBRequest, VehicleDBResponse, VehicleUpdateDBRequest,
    },
};
use crate::types::{FamilyMemberId, PetId, UserId, VehicleId, abbrev_uuid};
use sqlx::{PgConnection, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

/// Filter shared by the household repositories
#[derive(Debug, Clone)]
pub struct HouseholdFilter {
    pub skip: i64,
    pub limit: i64,
    pub owner_id: Option<UserId>,
}

impl HouseholdFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit, owner_id: None }
    }

    pub fn with_owner(mut self, owner_id: UserId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }
}

async fn count_rows(db: &mut PgConnection, table: &str, filter: &HouseholdFilter) -> Result<i64> {
    let mut query = QueryBuilder::new(format!("SELECT COUNT(*) FROM {table} WHERE 1=1"));
    if let Some(owner_id) = filter.owner_id {
        query.push(" AND owner_id = ");
        query.push_bind(owner_id);
    }
    let count: i64 = query.build_query_scalar().fetch_one(db).await?;
    Ok(count)
}

const VEHICLE_COLUMNS: &str = "id, owner_id, plate, brand, model, color, created_at, updated_at";

pub struct Vehicles<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Vehicles<'c> {
    type CreateRequest = VehicleCreateDBRequest;
    type UpdateRequest = VehicleUpdateDBRequest;
    type Response = VehicleDBResponse;
    type Id = VehicleId;
    type Filter = HouseholdFilter;

    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let vehicle = sqlx::query_as::<_, VehicleDBResponse>(&format!(
            "INSERT INTO vehicles (owner_id, plate, brand, model, color) VALUES ($1, $2, $3, $4, $5) RETURNING {VEHICLE_COLUMNS}"
        ))
        .bind(request.owner_id)
        .bind(&request.plate)
        .bind(&request.brand)
        .bind(&request.model)
        .bind(&request.color)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(vehicle)
    }

    #[instrument(skip(self), fields(vehicle_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let vehicle = sqlx::query_as::<_, VehicleDBResponse>(&format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(vehicle)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let vehicles = sqlx::query_as::<_, VehicleDBResponse>(&format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(vehicles.into_iter().map(|v| (v.id, v)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE 1=1"));
        if let Some(owner_id) = filter.owner_id {
            query.push(" AND owner_id = ");
            query.push_bind(owner_id);
        }
        query.push(" ORDER BY plate LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let vehicles = query.build_query_as::<VehicleDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(vehicles)
    }

    #[instrument(skip(self), fields(vehicle_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM vehicles WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(vehicle_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let vehicle = sqlx::query_as::<_, VehicleDBResponse>(&format!(
            r#"
            UPDATE vehicles SET
                owner_id = COALESCE($2, owner_id),
                plate = COALESCE($3, plate),
                brand = COALESCE($4, brand),
                model = COALESCE($5, model),
                color = COALESCE($6, color),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {VEHICLE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.owner_id)
        .bind(&request.plate)
        .bind(&request.brand)
        .bind(&request.model)
        .bind(&request.color)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(vehicle)
    }
}

impl<'c> Vehicles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn count(&mut self, filter: &HouseholdFilter) -> Result<i64> {
        count_rows(&mut *self.db, "vehicles", filter).await
    }

    /// Every vehicle registered to one owner
    pub async fn list_by_owner(&mut self, owner_id: UserId) -> Result<Vec<VehicleDBResponse>> {
        let vehicles = sqlx::query_as::<_, VehicleDBResponse>(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE owner_id = $1 ORDER BY plate"
        ))
        .bind(owner_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(vehicles)
    }
}

const PET_COLUMNS: &str = "id, owner_id, name, species, breed, created_at, updated_at";

pub struct Pets<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Pets<'c> {
    type CreateRequest = PetCreateDBRequest;
    type UpdateRequest = PetUpdateDBRequest;
    type Response = PetDBResponse;
    type Id = PetId;
    type Filter = HouseholdFilter;

    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let pet = sqlx::query_as::<_, PetDBResponse>(&format!(
            "INSERT INTO pets (owner_id, name, species, breed) VALUES ($1, $2, $3, $4) RETURNING {PET_COLUMNS}"
        ))
        .bind(request.owner_id)
        .bind(&request.name)
        .bind(&request.species)
        .bind(&request.breed)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(pet)
    }

    #[instrument(skip(self), fields(pet_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let pet = sqlx::query_as::<_, PetDBResponse>(&format!("SELECT {PET_COLUMNS} FROM pets WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(pet)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let pets = sqlx::query_as::<_, PetDBResponse>(&format!("SELECT {PET_COLUMNS} FROM pets WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(pets.into_iter().map(|p| (p.id, p)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(format!("SELECT {PET_COLUMNS} FROM pets WHERE 1=1"));
        if let Some(owner_id) = filter.owner_id {
            query.push(" AND owner_id = ");
            query.push_bind(owner_id);
        }
        query.push(" ORDER BY name, created_at LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let pets = query.build_query_as::<PetDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(pets)
    }

    #[instrument(skip(self), fields(pet_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pets WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(pet_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let pet = sqlx::query_as::<_, PetDBResponse>(&format!(
            r#"
            UPDATE pets SET
                owner_id = COALESCE($2, owner_id),
                name = COALESCE($3, name),
                species = COALESCE($4, species),
                breed = COALESCE($5, breed),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PET_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.owner_id)
        .bind(&request.name)
        .bind(&request.species)
        .bind(&request.breed)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(pet)
    }
}

impl<'c> Pets<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn count(&mut self, filter: &HouseholdFilter) -> Result<i64> {
        count_rows(&mut *self.db, "pets", filter).await
    }

    pub async fn list_by_owner(&mut self, owner_id: UserId) -> Result<Vec<PetDBResponse>> {
        let pets = sqlx::query_as::<_, PetDBResponse>(&format!("SELECT {PET_COLUMNS} FROM pets WHERE owner_id = $1 ORDER BY name"))
            .bind(owner_id)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(pets)
    }
}

const FAMILY_MEMBER_COLUMNS: &str = "id, owner_id, full_name, relationship, phone, created_at, updated_at";

pub struct FamilyMembers<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for FamilyMembers<'c> {
    type CreateRequest = FamilyMemberCreateDBRequest;
    type UpdateRequest = FamilyMemberUpdateDBRequest;
    type Response = FamilyMemberDBResponse;
    type Id = FamilyMemberId;
    type Filter = HouseholdFilter;

    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let member = sqlx::query_as::<_, FamilyMemberDBResponse>(&format!(
            "INSERT INTO family_members (owner_id, full_name, relationship, phone) VALUES ($1, $2, $3, $4) RETURNING {FAMILY_MEMBER_COLUMNS}"
        ))
        .bind(request.owner_id)
        .bind(&request.full_name)
        .bind(&request.relationship)
        .bind(&request.phone)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(member)
    }

    #[instrument(skip(self), fields(family_member_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let member = sqlx::query_as::<_, FamilyMemberDBResponse>(&format!(
            "SELECT {FAMILY_MEMBER_COLUMNS} FROM family_members WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(member)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let members = sqlx::query_as::<_, FamilyMemberDBResponse>(&format!(
            "SELECT {FAMILY_MEMBER_COLUMNS} FROM family_members WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(members.into_iter().map(|m| (m.id, m)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(format!("SELECT {FAMILY_MEMBER_COLUMNS} FROM family_members WHERE 1=1"));
        if let Some(owner_id) = filter.owner_id {
            query.push(" AND owner_id = ");
            query.push_bind(owner_id);
        }
        query.push(" ORDER BY full_name, created_at LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let members = query.build_query_as::<FamilyMemberDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(members)
    }

    #[instrument(skip(self), fields(family_member_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM family_members WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(family_member_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let member = sqlx::query_as::<_, FamilyMemberDBResponse>(&format!(
            r#"
            UPDATE family_members SET
                owner_id = COALESCE($2, owner_id),
                full_name = COALESCE($3, full_name),
                relationship = COALESCE($4, relationship),
                phone = COALESCE($5, phone),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {FAMILY_MEMBER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.owner_id)
        .bind(&request.full_name)
        .bind(&request.relationship)
        .bind(&request.phone)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(member)
    }
}

impl<'c> FamilyMembers<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn count(&mut self, filter: &HouseholdFilter) -> Result<i64> {
        count_rows(&mut *self.db, "family_members", filter).await
    }

    pub async fn list_by_owner(&mut self, owner_id: UserId) -> Result<Vec<FamilyMemberDBResponse>> {
        let members = sqlx::query_as::<_, FamilyMemberDBResponse>(&format!(
            "SELECT {FAMILY_MEMBER_COLUMNS} FROM family_members WHERE owner_id = $1 ORDER BY full_name"
        ))
        .bind(owner_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(members)
    }
}
