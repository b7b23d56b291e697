use crate::{
    AppState,
    api::{
        handlers::households::load_household,
        models::{
            pagination::PaginatedResponse,
            units::{ListUnitsQuery, UnitCreate, UnitDetailResponse, UnitOrdering, UnitResponse, UnitUpdate},
            users::UserResponse,
        },
    },
    auth::permissions::{RequiresPermission, can_read_all_resources, can_read_own_resource, operation, resource},
    db::{
        errors::DbError,
        handlers::{Repository, Units, Users, units::UnitFilter},
        models::units::{UnitCreateDBRequest, UnitUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{Resource, UnitId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

fn unit_not_found(unit_id: UnitId) -> Error {
    Error::NotFound {
        resource: "Unit".to_string(),
        id: unit_id.to_string(),
    }
}

fn require_code(code: &str) -> Result<()> {
    if code.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Unit code is required".to_string(),
        });
    }
    Ok(())
}

/// List units. Non-admins only see the units they own.
#[utoipa::path(
    get,
    path = "/units",
    tag = "units",
    summary = "List units",
    params(ListUnitsQuery),
    responses(
        (status = 200, description = "Paginated list of units", body = PaginatedResponse<UnitResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_units(
    State(state): State<AppState>,
    Query(query): Query<ListUnitsQuery>,
    current_user: RequiresPermission<resource::Units, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<UnitResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = UnitFilter::new(skip, limit);

    if !can_read_all_resources(&current_user, Resource::Units) {
        filter = filter.with_owner(current_user.id);
    }
    if let Some(search) = query.search.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        filter = filter.with_search(search.to_string());
    }
    // Unknown sort keys fall back to the default order
    if let Some((ordering, descending)) = query.ordering.as_deref().and_then(UnitOrdering::parse) {
        filter = filter.with_ordering(ordering, descending);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Units::new(&mut conn);
    let total_count = repo.count(&filter).await?;
    let data = repo.list(&filter).await?.into_iter().map(UnitResponse::from).collect();

    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// Unit detail: the owner with their household registries
#[utoipa::path(
    get,
    path = "/units/{unit_id}",
    tag = "units",
    summary = "Get unit",
    params(("unit_id" = uuid::Uuid, Path, description = "Unit ID")),
    responses(
        (status = 200, description = "Unit detail", body = UnitDetailResponse),
        (status = 404, description = "Unit not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_unit(
    State(state): State<AppState>,
    Path(unit_id): Path<UnitId>,
    current_user: RequiresPermission<resource::Units, operation::ReadOwn>,
) -> Result<Json<UnitDetailResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let unit = Units::new(&mut conn).get_by_id(unit_id).await?.ok_or_else(|| unit_not_found(unit_id))?;

    let visible = match unit.owner_id {
        Some(owner_id) => can_read_own_resource(&current_user, Resource::Units, owner_id),
        None => can_read_all_resources(&current_user, Resource::Units),
    };
    if !visible {
        return Err(unit_not_found(unit_id));
    }

    let (owner, vehicles, pets, family_members) = match unit.owner_id {
        Some(owner_id) => {
            let owner = Users::new(&mut conn).get_by_id(owner_id).await?.map(UserResponse::from);
            let (vehicles, pets, family_members) = load_household(&mut conn, owner_id).await?;
            (owner, vehicles, pets, family_members)
        }
        None => (None, Vec::new(), Vec::new(), Vec::new()),
    };

    Ok(Json(UnitDetailResponse {
        unit: UnitResponse::from(unit),
        owner,
        vehicles,
        pets,
        family_members,
    }))
}

#[utoipa::path(
    post,
    path = "/units",
    tag = "units",
    summary = "Create unit",
    request_body = UnitCreate,
    responses(
        (status = 201, description = "Unit created", body = UnitResponse),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Unit code already exists"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_unit(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Units, operation::CreateAll>,
    Json(create): Json<UnitCreate>,
) -> Result<(StatusCode, Json<UnitResponse>)> {
    require_code(&create.code)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let unit = Units::new(&mut conn).create(&UnitCreateDBRequest::from(create)).await?;
    Ok((StatusCode::CREATED, Json(UnitResponse::from(unit))))
}

#[utoipa::path(
    patch,
    path = "/units/{unit_id}",
    tag = "units",
    summary = "Update unit",
    request_body = UnitUpdate,
    params(("unit_id" = uuid::Uuid, Path, description = "Unit ID")),
    responses(
        (status = 200, description = "Unit updated", body = UnitResponse),
        (status = 404, description = "Unit not found"),
        (status = 409, description = "Unit code already exists"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_unit(
    State(state): State<AppState>,
    Path(unit_id): Path<UnitId>,
    _: RequiresPermission<resource::Units, operation::UpdateAll>,
    Json(update): Json<UnitUpdate>,
) -> Result<Json<UnitResponse>> {
    if let Some(code) = &update.code {
        require_code(code)?;
    }
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let unit = Units::new(&mut conn)
        .update(unit_id, &UnitUpdateDBRequest::from(update))
        .await
        .map_err(|e| match e {
            DbError::NotFound => unit_not_found(unit_id),
            other => other.into(),
        })?;
    Ok(Json(UnitResponse::from(unit)))
}

#[utoipa::path(
    delete,
    path = "/units/{unit_id}",
    tag = "units",
    summary = "Delete unit",
    params(("unit_id" = uuid::Uuid, Path, description = "Unit ID")),
    responses(
        (status = 204, description = "Unit deleted"),
        (status = 404, description = "Unit not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_unit(
    State(state): State<AppState>,
    Path(unit_id): Path<UnitId>,
    _: RequiresPermission<resource::Units, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Units::new(&mut conn).delete(unit_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(unit_not_found(unit_id))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{
            pagination::PaginatedResponse,
            units::{UnitDetailResponse, UnitResponse},
            users::{Role, UserResponse},
        },
        test_utils::*,
    };
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;
    use sqlx::PgPool;

    async fn create_unit(server: &TestServer, admin: &UserResponse, code: &str, owner: Option<&UserResponse>) -> UnitResponse {
        let (name, value) = add_auth_headers(admin);
        let (tower, number) = code.split_once('-').unwrap_or((code, ""));
        let response = server
            .post("/api/v1/units")
            .add_header(name, value)
            .json(&json!({"code": code, "tower": tower, "number": number, "owner_id": owner.map(|o| o.id)}))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_non_admin_cannot_create_unit(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        for role in [Role::Resident, Role::Staff] {
            let user = create_test_user(&pool, role).await;
            let (name, value) = add_auth_headers(&user);
            server
                .post("/api/v1/units")
                .add_header(name, value)
                .json(&json!({"code": "TA-1-A", "owner_id": user.id}))
                .await
                .assert_status(StatusCode::FORBIDDEN);
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_code_conflicts(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        create_unit(&server, &admin, "TA-1-A", None).await;

        let (name, value) = add_auth_headers(&admin);
        server
            .post("/api/v1/units")
            .add_header(name.clone(), value.clone())
            .json(&json!({"code": "TA-1-A"}))
            .await
            .assert_status(StatusCode::CONFLICT);
        server
            .post("/api/v1/units")
            .add_header(name, value)
            .json(&json!({"code": "  "}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_residents_only_see_their_units(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let alice = create_test_user(&pool, Role::Resident).await;
        let bob = create_test_user(&pool, Role::Resident).await;

        let alice_unit = create_unit(&server, &admin, "TA-1-A", Some(&alice)).await;
        let bob_unit = create_unit(&server, &admin, "TB-2-B", Some(&bob)).await;

        let (name, value) = add_auth_headers(&alice);
        let page: PaginatedResponse<UnitResponse> = server.get("/api/v1/units").add_header(name.clone(), value.clone()).await.json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].id, alice_unit.id);
        assert_eq!(page.data[0].owner_username.as_deref(), Some(alice.username.as_str()));

        server
            .get(&format!("/api/v1/units/{}", bob_unit.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .get(&format!("/api/v1/units/{}", alice_unit.id))
            .add_header(name, value)
            .await
            .assert_status_ok();

        let (name, value) = add_auth_headers(&admin);
        let page: PaginatedResponse<UnitResponse> = server.get("/api/v1/units").add_header(name, value).await.json();
        assert_eq!(page.total_count, 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unit_detail_includes_owner_household(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let owner = create_test_user(&pool, Role::Resident).await;
        let unit = create_unit(&server, &admin, "TC-3-C", Some(&owner)).await;

        let (name, value) = add_auth_headers(&admin);
        server
            .post("/api/v1/family-members")
            .add_header(name.clone(), value.clone())
            .json(&json!({"owner_id": owner.id, "full_name": "Lucia"}))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.get(&format!("/api/v1/units/{}", unit.id)).add_header(name, value).await;
        response.assert_status_ok();
        let detail: UnitDetailResponse = response.json();
        assert_eq!(detail.unit.code, "TC-3-C");
        assert_eq!(detail.owner.map(|o| o.id), Some(owner.id));
        assert_eq!(detail.family_members.len(), 1);
        assert!(detail.vehicles.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_search_and_ordering(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        create_unit(&server, &admin, "TA-1-A", None).await;
        create_unit(&server, &admin, "TB-1-A", None).await;
        create_unit(&server, &admin, "TB-2-A", None).await;
        let (name, value) = add_auth_headers(&admin);

        let page: PaginatedResponse<UnitResponse> = server
            .get("/api/v1/units?ordering=-code")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        let codes: Vec<_> = page.data.iter().map(|u| u.code.as_str()).collect();
        assert_eq!(codes, vec!["TB-2-A", "TB-1-A", "TA-1-A"]);

        let page: PaginatedResponse<UnitResponse> = server
            .get("/api/v1/units?search=tb&ordering=bogus")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.data[0].code, "TB-1-A");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_and_delete_unit(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let owner = create_test_user(&pool, Role::Resident).await;
        let unit = create_unit(&server, &admin, "TA-9-D", None).await;
        let (name, value) = add_auth_headers(&admin);

        let response = server
            .patch(&format!("/api/v1/units/{}", unit.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"owner_id": owner.id}))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<UnitResponse>().owner_id, Some(owner.id));

        server
            .delete(&format!("/api/v1/units/{}", unit.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .delete(&format!("/api/v1/units/{}", unit.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
