use crate::{
    AppState,
    api::models::{
        common_areas::{CommonAreaCreate, CommonAreaResponse, CommonAreaUpdate, ListCommonAreasQuery},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        errors::DbError,
        handlers::{CommonAreas, Repository, common_areas::CommonAreaFilter},
        models::common_areas::{CommonAreaCreateDBRequest, CommonAreaUpdateDBRequest},
    },
    errors::{Error, Result},
    types::CommonAreaId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

fn area_not_found(area_id: CommonAreaId) -> Error {
    Error::NotFound {
        resource: "Common area".to_string(),
        id: area_id.to_string(),
    }
}

fn validate(name: Option<&str>, capacity: Option<i32>) -> Result<()> {
    if name.is_some_and(|n| n.trim().is_empty()) {
        return Err(Error::BadRequest {
            message: "Name is required".to_string(),
        });
    }
    if capacity.is_some_and(|c| c <= 0) {
        return Err(Error::BadRequest {
            message: "Capacity must be greater than zero".to_string(),
        });
    }
    Ok(())
}

/// Active areas ordered by name; admins may include inactive ones
#[utoipa::path(
    get,
    path = "/common-areas",
    tag = "common_areas",
    summary = "List common areas",
    params(ListCommonAreasQuery),
    responses((status = 200, description = "Paginated list of common areas", body = PaginatedResponse<CommonAreaResponse>)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_common_areas(
    State(state): State<AppState>,
    Query(query): Query<ListCommonAreasQuery>,
    current_user: RequiresPermission<resource::CommonAreas, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<CommonAreaResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = CommonAreaFilter::new(skip, limit);
    if query.include_inactive == Some(true) && current_user.is_admin() {
        filter = filter.including_inactive();
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = CommonAreas::new(&mut conn);
    let total_count = repo.count(&filter).await?;
    let data = repo.list(&filter).await?.into_iter().map(CommonAreaResponse::from).collect();

    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/common-areas/{area_id}",
    tag = "common_areas",
    summary = "Get common area",
    params(("area_id" = uuid::Uuid, Path, description = "Common area ID")),
    responses(
        (status = 200, description = "Common area", body = CommonAreaResponse),
        (status = 404, description = "Common area not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_common_area(
    State(state): State<AppState>,
    Path(area_id): Path<CommonAreaId>,
    current_user: RequiresPermission<resource::CommonAreas, operation::ReadAll>,
) -> Result<Json<CommonAreaResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match CommonAreas::new(&mut conn).get_by_id(area_id).await? {
        Some(area) if area.is_active || current_user.is_admin() => Ok(Json(CommonAreaResponse::from(area))),
        _ => Err(area_not_found(area_id)),
    }
}

#[utoipa::path(
    post,
    path = "/common-areas",
    tag = "common_areas",
    summary = "Create common area",
    request_body = CommonAreaCreate,
    responses(
        (status = 201, description = "Common area created", body = CommonAreaResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Name already exists"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_common_area(
    State(state): State<AppState>,
    _: RequiresPermission<resource::CommonAreas, operation::CreateAll>,
    Json(create): Json<CommonAreaCreate>,
) -> Result<(StatusCode, Json<CommonAreaResponse>)> {
    validate(Some(&create.name), Some(create.capacity))?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let area = CommonAreas::new(&mut conn).create(&CommonAreaCreateDBRequest::from(create)).await?;
    Ok((StatusCode::CREATED, Json(CommonAreaResponse::from(area))))
}

#[utoipa::path(
    patch,
    path = "/common-areas/{area_id}",
    tag = "common_areas",
    summary = "Update common area",
    request_body = CommonAreaUpdate,
    params(("area_id" = uuid::Uuid, Path, description = "Common area ID")),
    responses(
        (status = 200, description = "Common area updated", body = CommonAreaResponse),
        (status = 404, description = "Common area not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_common_area(
    State(state): State<AppState>,
    Path(area_id): Path<CommonAreaId>,
    _: RequiresPermission<resource::CommonAreas, operation::UpdateAll>,
    Json(update): Json<CommonAreaUpdate>,
) -> Result<Json<CommonAreaResponse>> {
    validate(update.name.as_deref(), update.capacity)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let area = CommonAreas::new(&mut conn)
        .update(area_id, &CommonAreaUpdateDBRequest::from(update))
        .await
        .map_err(|e| match e {
            DbError::NotFound => area_not_found(area_id),
            other => other.into(),
        })?;
    Ok(Json(CommonAreaResponse::from(area)))
}

#[utoipa::path(
    delete,
    path = "/common-areas/{area_id}",
    tag = "common_areas",
    summary = "Delete common area",
    params(("area_id" = uuid::Uuid, Path, description = "Common area ID")),
    responses(
        (status = 204, description = "Common area deleted"),
        (status = 404, description = "Common area not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_common_area(
    State(state): State<AppState>,
    Path(area_id): Path<CommonAreaId>,
    _: RequiresPermission<resource::CommonAreas, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if CommonAreas::new(&mut conn).delete(area_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(area_not_found(area_id))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{common_areas::CommonAreaResponse, pagination::PaginatedResponse, users::Role},
        test_utils::*,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_inactive_areas_hidden_from_residents(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let resident = create_test_user(&pool, Role::Resident).await;
        let (admin_name, admin_value) = add_auth_headers(&admin);

        for (area, capacity) in [("Pool", 20), ("Gym", 10)] {
            server
                .post("/api/v1/common-areas")
                .add_header(admin_name.clone(), admin_value.clone())
                .json(&json!({"name": area, "capacity": capacity}))
                .await
                .assert_status(StatusCode::CREATED);
        }
        let closed: CommonAreaResponse = server
            .post("/api/v1/common-areas")
            .add_header(admin_name.clone(), admin_value.clone())
            .json(&json!({"name": "Event Hall", "capacity": 50, "is_active": false}))
            .await
            .json();

        let (name, value) = add_auth_headers(&resident);
        let page: PaginatedResponse<CommonAreaResponse> = server
            .get("/api/v1/common-areas?include_inactive=true")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        let names: Vec<_> = page.data.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Gym", "Pool"]);
        server
            .get(&format!("/api/v1/common-areas/{}", closed.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let page: PaginatedResponse<CommonAreaResponse> = server
            .get("/api/v1/common-areas?include_inactive=true")
            .add_header(admin_name, admin_value)
            .await
            .json();
        assert_eq!(page.total_count, 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_common_area_validation_and_writes(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let staff = create_test_user(&pool, Role::Staff).await;
        let (name, value) = add_auth_headers(&admin);

        server
            .post("/api/v1/common-areas")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "Roof", "capacity": 0}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let area: CommonAreaResponse = server
            .post("/api/v1/common-areas")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "Roof", "capacity": 15}))
            .await
            .json();
        server
            .post("/api/v1/common-areas")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "Roof", "capacity": 15}))
            .await
            .assert_status(StatusCode::CONFLICT);

        let updated: CommonAreaResponse = server
            .patch(&format!("/api/v1/common-areas/{}", area.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"is_active": false}))
            .await
            .json();
        assert!(!updated.is_active);

        let (staff_name, staff_value) = add_auth_headers(&staff);
        server
            .delete(&format!("/api/v1/common-areas/{}", area.id))
            .add_header(staff_name, staff_value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .delete(&format!("/api/v1/common-areas/{}", area.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }
}
