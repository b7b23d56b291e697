//! Vehicles, pets and family members registered to residents. Administrators only.

use crate::{
    AppState,
    api::models::{
        households::{
            FamilyMemberCreate, FamilyMemberResponse, FamilyMemberUpdate, ListHouseholdQuery, PetCreate, PetResponse, PetUpdate,
            VehicleCreate, VehicleResponse, VehicleUpdate,
        },
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{FamilyMembers, Pets, Repository, Vehicles, households::HouseholdFilter},
        models::households::{
            FamilyMemberCreateDBRequest, FamilyMemberUpdateDBRequest, PetCreateDBRequest, PetUpdateDBRequest, VehicleCreateDBRequest,
            VehicleUpdateDBRequest,
        },
    },
    errors::{Error, Result},
    types::{FamilyMemberId, PetId, UserId, VehicleId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

/// A resident's vehicles, pets and family members
pub(crate) async fn load_household(
    conn: &mut PgConnection,
    owner_id: UserId,
) -> Result<(Vec<VehicleResponse>, Vec<PetResponse>, Vec<FamilyMemberResponse>)> {
    let vehicles = Vehicles::new(&mut *conn).list_by_owner(owner_id).await?;
    let pets = Pets::new(&mut *conn).list_by_owner(owner_id).await?;
    let family_members = FamilyMembers::new(&mut *conn).list_by_owner(owner_id).await?;
    Ok((
        vehicles.into_iter().map(VehicleResponse::from).collect(),
        pets.into_iter().map(PetResponse::from).collect(),
        family_members.into_iter().map(FamilyMemberResponse::from).collect(),
    ))
}

fn household_filter(query: &ListHouseholdQuery) -> HouseholdFilter {
    let (skip, limit) = query.pagination.params();
    let filter = HouseholdFilter::new(skip, limit);
    match query.owner_id {
        Some(owner_id) => filter.with_owner(owner_id),
        None => filter,
    }
}

fn not_found(resource: &str, id: uuid::Uuid) -> Error {
    Error::NotFound {
        resource: resource.to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/vehicles",
    tag = "households",
    summary = "List vehicles",
    params(ListHouseholdQuery),
    responses(
        (status = 200, description = "Paginated list of vehicles", body = PaginatedResponse<VehicleResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_vehicles(
    State(state): State<AppState>,
    Query(query): Query<ListHouseholdQuery>,
    _: RequiresPermission<resource::Vehicles, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<VehicleResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let filter = household_filter(&query);
    let mut repo = Vehicles::new(&mut conn);

    let total_count = repo.count(&filter).await?;
    let vehicles = repo.list(&filter).await?;
    let data = vehicles.into_iter().map(VehicleResponse::from).collect();

    Ok(Json(PaginatedResponse::new(data, total_count, filter.skip, filter.limit)))
}

#[utoipa::path(
    post,
    path = "/vehicles",
    tag = "households",
    summary = "Register vehicle",
    request_body = VehicleCreate,
    responses(
        (status = 201, description = "Vehicle registered", body = VehicleResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Plate already registered"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_vehicle(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Vehicles, operation::CreateAll>,
    Json(create): Json<VehicleCreate>,
) -> Result<(StatusCode, Json<VehicleResponse>)> {
    if create.plate.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Plate is required".to_string(),
        });
    }
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let vehicle = Vehicles::new(&mut conn).create(&VehicleCreateDBRequest::from(create)).await?;
    Ok((StatusCode::CREATED, Json(VehicleResponse::from(vehicle))))
}

#[utoipa::path(
    get,
    path = "/vehicles/{vehicle_id}",
    tag = "households",
    summary = "Get vehicle",
    params(("vehicle_id" = uuid::Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Vehicle", body = VehicleResponse),
        (status = 404, description = "Vehicle not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_vehicle(
    State(state): State<AppState>,
    Path(vehicle_id): Path<VehicleId>,
    _: RequiresPermission<resource::Vehicles, operation::ReadAll>,
) -> Result<Json<VehicleResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match Vehicles::new(&mut conn).get_by_id(vehicle_id).await? {
        Some(vehicle) => Ok(Json(VehicleResponse::from(vehicle))),
        None => Err(not_found("Vehicle", vehicle_id)),
    }
}

#[utoipa::path(
    patch,
    path = "/vehicles/{vehicle_id}",
    tag = "households",
    summary = "Update vehicle",
    request_body = VehicleUpdate,
    params(("vehicle_id" = uuid::Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Vehicle updated", body = VehicleResponse),
        (status = 404, description = "Vehicle not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_vehicle(
    State(state): State<AppState>,
    Path(vehicle_id): Path<VehicleId>,
    _: RequiresPermission<resource::Vehicles, operation::UpdateAll>,
    Json(update): Json<VehicleUpdate>,
) -> Result<Json<VehicleResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let vehicle = Vehicles::new(&mut conn)
        .update(vehicle_id, &VehicleUpdateDBRequest::from(update))
        .await
        .map_err(|e| match e {
            crate::db::errors::DbError::NotFound => not_found("Vehicle", vehicle_id),
            other => other.into(),
        })?;
    Ok(Json(VehicleResponse::from(vehicle)))
}

#[utoipa::path(
    delete,
    path = "/vehicles/{vehicle_id}",
    tag = "households",
    summary = "Delete vehicle",
    params(("vehicle_id" = uuid::Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 204, description = "Vehicle deleted"),
        (status = 404, description = "Vehicle not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_vehicle(
    State(state): State<AppState>,
    Path(vehicle_id): Path<VehicleId>,
    _: RequiresPermission<resource::Vehicles, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Vehicles::new(&mut conn).delete(vehicle_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Vehicle", vehicle_id))
    }
}

#[utoipa::path(
    get,
    path = "/pets",
    tag = "households",
    summary = "List pets",
    params(ListHouseholdQuery),
    responses(
        (status = 200, description = "Paginated list of pets", body = PaginatedResponse<PetResponse>),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_pets(
    State(state): State<AppState>,
    Query(query): Query<ListHouseholdQuery>,
    _: RequiresPermission<resource::Pets, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<PetResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let filter = household_filter(&query);
    let mut repo = Pets::new(&mut conn);

    let total_count = repo.count(&filter).await?;
    let data = repo.list(&filter).await?.into_iter().map(PetResponse::from).collect();

    Ok(Json(PaginatedResponse::new(data, total_count, filter.skip, filter.limit)))
}

#[utoipa::path(
    post,
    path = "/pets",
    tag = "households",
    summary = "Register pet",
    request_body = PetCreate,
    responses((status = 201, description = "Pet registered", body = PetResponse)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_pet(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Pets, operation::CreateAll>,
    Json(create): Json<PetCreate>,
) -> Result<(StatusCode, Json<PetResponse>)> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let pet = Pets::new(&mut conn).create(&PetCreateDBRequest::from(create)).await?;
    Ok((StatusCode::CREATED, Json(PetResponse::from(pet))))
}

#[utoipa::path(
    get,
    path = "/pets/{pet_id}",
    tag = "households",
    summary = "Get pet",
    params(("pet_id" = uuid::Uuid, Path, description = "Pet ID")),
    responses(
        (status = 200, description = "Pet", body = PetResponse),
        (status = 404, description = "Pet not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_pet(
    State(state): State<AppState>,
    Path(pet_id): Path<PetId>,
    _: RequiresPermission<resource::Pets, operation::ReadAll>,
) -> Result<Json<PetResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let pet = Pets::new(&mut conn).get_by_id(pet_id).await?.ok_or_else(|| not_found("Pet", pet_id))?;
    Ok(Json(PetResponse::from(pet)))
}

#[utoipa::path(
    patch,
    path = "/pets/{pet_id}",
    tag = "households",
    summary = "Update pet",
    request_body = PetUpdate,
    params(("pet_id" = uuid::Uuid, Path, description = "Pet ID")),
    responses(
        (status = 200, description = "Pet updated", body = PetResponse),
        (status = 404, description = "Pet not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_pet(
    State(state): State<AppState>,
    Path(pet_id): Path<PetId>,
    _: RequiresPermission<resource::Pets, operation::UpdateAll>,
    Json(update): Json<PetUpdate>,
) -> Result<Json<PetResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let pet = Pets::new(&mut conn)
        .update(pet_id, &PetUpdateDBRequest::from(update))
        .await
        .map_err(|e| match e {
            crate::db::errors::DbError::NotFound => not_found("Pet", pet_id),
            other => other.into(),
        })?;
    Ok(Json(PetResponse::from(pet)))
}

#[utoipa::path(
    delete,
    path = "/pets/{pet_id}",
    tag = "households",
    summary = "Delete pet",
    params(("pet_id" = uuid::Uuid, Path, description = "Pet ID")),
    responses(
        (status = 204, description = "Pet deleted"),
        (status = 404, description = "Pet not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_pet(
    State(state): State<AppState>,
    Path(pet_id): Path<PetId>,
    _: RequiresPermission<resource::Pets, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Pets::new(&mut conn).delete(pet_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Pet", pet_id))
    }
}

#[utoipa::path(
    get,
    path = "/family-members",
    tag = "households",
    summary = "List family members",
    params(ListHouseholdQuery),
    responses(
        (status = 200, description = "Paginated list of family members", body = PaginatedResponse<FamilyMemberResponse>),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_family_members(
    State(state): State<AppState>,
    Query(query): Query<ListHouseholdQuery>,
    _: RequiresPermission<resource::FamilyMembers, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<FamilyMemberResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let filter = household_filter(&query);
    let mut repo = FamilyMembers::new(&mut conn);

    let total_count = repo.count(&filter).await?;
    let data = repo.list(&filter).await?.into_iter().map(FamilyMemberResponse::from).collect();

    Ok(Json(PaginatedResponse::new(data, total_count, filter.skip, filter.limit)))
}

#[utoipa::path(
    post,
    path = "/family-members",
    tag = "households",
    summary = "Register family member",
    request_body = FamilyMemberCreate,
    responses((status = 201, description = "Family member registered", body = FamilyMemberResponse)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_family_member(
    State(state): State<AppState>,
    _: RequiresPermission<resource::FamilyMembers, operation::CreateAll>,
    Json(create): Json<FamilyMemberCreate>,
) -> Result<(StatusCode, Json<FamilyMemberResponse>)> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let member = FamilyMembers::new(&mut conn).create(&FamilyMemberCreateDBRequest::from(create)).await?;
    Ok((StatusCode::CREATED, Json(FamilyMemberResponse::from(member))))
}

#[utoipa::path(
    get,
    path = "/family-members/{member_id}",
    tag = "households",
    summary = "Get family member",
    params(("member_id" = uuid::Uuid, Path, description = "Family member ID")),
    responses(
        (status = 200, description = "Family member", body = FamilyMemberResponse),
        (status = 404, description = "Family member not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_family_member(
    State(state): State<AppState>,
    Path(member_id): Path<FamilyMemberId>,
    _: RequiresPermission<resource::FamilyMembers, operation::ReadAll>,
) -> Result<Json<FamilyMemberResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let member = FamilyMembers::new(&mut conn)
        .get_by_id(member_id)
        .await?
        .ok_or_else(|| not_found("Family member", member_id))?;
    Ok(Json(FamilyMemberResponse::from(member)))
}

#[utoipa::path(
    patch,
    path = "/family-members/{member_id}",
    tag = "households",
    summary = "Update family member",
    request_body = FamilyMemberUpdate,
    params(("member_id" = uuid::Uuid, Path, description = "Family member ID")),
    responses(
        (status = 200, description = "Family member updated", body = FamilyMemberResponse),
        (status = 404, description = "Family member not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_family_member(
    State(state): State<AppState>,
    Path(member_id): Path<FamilyMemberId>,
    _: RequiresPermission<resource::FamilyMembers, operation::UpdateAll>,
    Json(update): Json<FamilyMemberUpdate>,
) -> Result<Json<FamilyMemberResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let member = FamilyMembers::new(&mut conn)
        .update(member_id, &FamilyMemberUpdateDBRequest::from(update))
        .await
        .map_err(|e| match e {
            crate::db::errors::DbError::NotFound => not_found("Family member", member_id),
            other => other.into(),
        })?;
    Ok(Json(FamilyMemberResponse::from(member)))
}

#[utoipa::path(
    delete,
    path = "/family-members/{member_id}",
    tag = "households",
    summary = "Delete family member",
    params(("member_id" = uuid::Uuid, Path, description = "Family member ID")),
    responses(
        (status = 204, description = "Family member deleted"),
        (status = 404, description = "Family member not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_family_member(
    State(state): State<AppState>,
    Path(member_id): Path<FamilyMemberId>,
    _: RequiresPermission<resource::FamilyMembers, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if FamilyMembers::new(&mut conn).delete(member_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Family member", member_id))
    }
}
